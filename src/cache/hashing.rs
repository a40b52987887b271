//! URL addressing and content digests.

use reqwest::Url;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Buffer size for reading files during hashing (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Length of the URL hash prefix of cache file names.
pub const URL_HASH_LEN: usize = 8;

/// The cache address of a URL: the first 8 upper-case hex digits of the
/// SHA-1 of the URL string.
///
/// ```rust
/// use modcore::cache::url_hash;
///
/// let url = "https://example.com/mod.zip".parse().unwrap();
/// let hash = url_hash(&url);
/// assert_eq!(hash.len(), 8);
/// assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
/// ```
pub fn url_hash(url: &Url) -> String {
    let digest = Sha1::digest(url.as_str().as_bytes());
    let mut hash = hex::encode_upper(digest);
    hash.truncate(URL_HASH_LEN);
    hash
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `-`.
pub fn sanitize_description(description: &str) -> String {
    description
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Whether `name` looks like a cache entry: 8 upper-case hex digits, a dash,
/// and not a hash sidecar.
pub fn is_cache_file_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > URL_HASH_LEN
        && bytes[..URL_HASH_LEN]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(b))
        && bytes[URL_HASH_LEN] == b'-'
        && !is_sidecar_name(name)
}

pub(crate) fn is_sidecar_name(name: &str) -> bool {
    name.ends_with(".sha1") || name.ends_with(".sha256")
}

/// Path of the sidecar holding `path`'s digest of the given kind.
pub fn sidecar_path(path: &Path, kind: HashKind) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(kind.extension());
    PathBuf::from(name)
}

/// Digest algorithms the cache memoizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKind {
    Sha1,
    Sha256,
}

impl HashKind {
    pub fn extension(self) -> &'static str {
        match self {
            HashKind::Sha1 => "sha1",
            HashKind::Sha256 => "sha256",
        }
    }
}

/// Hash a file, reporting progress as a percentage of bytes read.
pub fn hash_file(path: &Path, kind: HashKind, progress: &mut dyn FnMut(u8)) -> io::Result<String> {
    match kind {
        HashKind::Sha1 => digest_file::<Sha1>(path, progress),
        HashKind::Sha256 => digest_file::<Sha256>(path, progress),
    }
}

fn digest_file<D: Digest>(path: &Path, progress: &mut dyn FnMut(u8)) -> io::Result<String> {
    let mut file = File::open(path)?;
    let total = file.metadata()?.len();
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut read = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        read += bytes_read as u64;
        if total > 0 {
            progress((read.saturating_mul(100) / total).min(100) as u8);
        }
    }
    progress(100);

    Ok(hex::encode_upper(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_hash_is_stable() {
        let url = Url::parse("https://github.com/KSP-RO/RP-1/releases/download/v1.0/RP-1.zip")
            .unwrap();
        assert_eq!(url_hash(&url), url_hash(&url.clone()));

        let other = Url::parse("https://github.com/KSP-RO/RP-1/releases/download/v1.1/RP-1.zip")
            .unwrap();
        assert_ne!(url_hash(&url), url_hash(&other));
    }

    #[test]
    fn test_url_hash_matches_sha1_prefix() {
        let url = Url::parse("https://example.com/a").unwrap();
        let full = hex::encode_upper(Sha1::digest(url.as_str().as_bytes()));
        assert_eq!(url_hash(&url), full[..8]);
    }

    #[test]
    fn test_sanitize_description() {
        assert_eq!(sanitize_description("Mod Name (v1.2).zip"), "Mod-Name--v1.2-.zip");
        assert_eq!(sanitize_description("ok_name-1.0.zip"), "ok_name-1.0.zip");
    }

    #[test]
    fn test_cache_file_names() {
        assert!(is_cache_file_name("0A1B2C3D-mod.zip"));
        assert!(is_cache_file_name("0A1B2C3D-"));
        assert!(!is_cache_file_name("0A1B2C3D-mod.zip.sha1"));
        assert!(!is_cache_file_name("0A1B2C3D-mod.zip.sha256"));
        assert!(!is_cache_file_name("0a1b2c3d-mod.zip"));
        assert!(!is_cache_file_name("0A1B2C3Dmod.zip"));
        assert!(!is_cache_file_name("readme.txt"));
    }

    #[test]
    fn test_hash_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        let mut last = 0;
        let sha1 = hash_file(&path, HashKind::Sha1, &mut |p| last = p).unwrap();
        assert_eq!(sha1, "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709");
        assert_eq!(last, 100);

        let sha256 = hash_file(&path, HashKind::Sha256, &mut |_| {}).unwrap();
        assert_eq!(
            sha256,
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn test_sidecar_path() {
        let path = Path::new("/cache/0A1B2C3D-mod.zip");
        assert_eq!(
            sidecar_path(path, HashKind::Sha1),
            PathBuf::from("/cache/0A1B2C3D-mod.zip.sha1")
        );
        assert_eq!(
            sidecar_path(path, HashKind::Sha256),
            PathBuf::from("/cache/0A1B2C3D-mod.zip.sha256")
        );
    }
}
