//! Tests for the content-addressed file cache.

use modcore::cache::{url_hash, FileCache, HashKind, IN_PROGRESS_DIR};
use modcore::registry::{InMemoryRegistry, Package};
use modcore::CompatibilityCriteria;

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

mod common;
use common::helpers::*;

const MOD_URL: &str = "https://spacedock.info/mod/1234/Astrogator/download/0.9.2";

fn stored_file(cache: &FileCache, dir: &Path, url_str: &str, content: &[u8]) -> std::path::PathBuf {
    let source = dir.join("incoming.bin");
    fs::write(&source, content).unwrap();
    cache
        .store(&url(url_str), &source, Some("Astrogator 0.9.2.zip"), true)
        .unwrap()
}

#[test]
fn test_store_names_file_by_url_hash() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();

    let path = stored_file(&cache, scratch.path(), MOD_URL, b"data");
    let name = path.file_name().unwrap().to_str().unwrap().to_string();

    assert!(name.starts_with(&format!("{}-", url_hash(&url(MOD_URL)))));
    assert!(!name.contains(' '));
    assert_eq!(path.parent().unwrap(), root.path());
    assert!(!scratch.path().join("incoming.bin").exists());
    assert_eq!(cache.get_cached_filename(&url(MOD_URL), None), Some(path.clone()));
    assert_eq!(fs::read(&path).unwrap(), b"data");
}

#[test]
fn test_store_without_move_keeps_source() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();
    let source = scratch.path().join("a.zip");
    fs::write(&source, b"data").unwrap();

    let stored = cache.store(&url(MOD_URL), &source, None, false).unwrap();
    assert!(source.exists());
    assert!(stored.file_name().unwrap().to_str().unwrap().ends_with("-0.9.2"));
}

#[test]
fn test_store_replaces_previous_entry() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();

    let first = stored_file(&cache, scratch.path(), MOD_URL, b"old");
    cache.file_sha1(&first, &mut |_| {}).unwrap();
    let first_sidecar = root.path().join(format!(
        "{}.sha1",
        first.file_name().unwrap().to_str().unwrap()
    ));
    assert!(first_sidecar.exists());
    fs::write(scratch.path().join("b.zip"), b"new").unwrap();
    let second = cache
        .store(&url(MOD_URL), &scratch.path().join("b.zip"), Some("other name"), true)
        .unwrap();

    assert_ne!(first, second);
    assert!(!first.exists());
    assert!(!first_sidecar.exists());
    assert_eq!(fs::read(&second).unwrap(), b"new");
    assert_eq!(cache.size_info(), (1, 3));
}

#[test]
fn test_freshness_against_remote_timestamp() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();
    let u = url(MOD_URL);
    let path = stored_file(&cache, scratch.path(), MOD_URL, b"data");

    assert_eq!(cache.get_cached_filename(&u, Some(UNIX_EPOCH)), Some(path.clone()));
    assert!(cache.is_maybe_cached_zip(&u, Some(UNIX_EPOCH)));

    let newer = SystemTime::now() + Duration::from_secs(3600);
    assert_eq!(cache.get_cached_filename(&u, None), Some(path.clone()));
    assert_eq!(cache.get_cached_filename(&u, Some(newer)), None);
    assert!(!path.exists());
    assert!(!cache.is_cached(&u));
}

#[test]
fn test_externally_deleted_file_is_forgotten() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();
    let path = stored_file(&cache, scratch.path(), MOD_URL, b"data");
    assert!(cache.is_cached(&url(MOD_URL)));

    fs::remove_file(&path).unwrap();
    assert!(!cache.is_cached(&url(MOD_URL)));
}

#[test]
fn test_get_cached_zip_purges_corrupt_archive() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();
    let source = scratch.path().join("mod.zip");
    write_zip(&source, &[("GameData/Astrogator/readme.txt", &b"orbital mechanics for all"[..])]);
    let stored = cache.store(&url(MOD_URL), &source, None, true).unwrap();

    assert_eq!(cache.get_cached_zip(&url(MOD_URL)).unwrap(), Some(stored.clone()));

    corrupt_entry(&stored, b"orbital mechanics for all");
    assert_eq!(cache.get_cached_zip(&url(MOD_URL)).unwrap(), None);
    assert!(!stored.exists());
    assert!(!cache.is_cached(&url(MOD_URL)));
}

#[test]
fn test_hash_is_memoized_in_sidecar() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let content = random_content(200_000);
    let path = {
        let cache = FileCache::new(root.path()).unwrap();
        let path = stored_file(&cache, scratch.path(), MOD_URL, &content);

        let mut last = 0;
        let sha1 = cache.file_sha1(&path, &mut |p| last = p).unwrap();
        assert_eq!(sha1, sha1_hex(&content));
        assert_eq!(last, 100);
        assert_eq!(cache.file_sha256(&path, &mut |_| {}).unwrap(), sha256_hex(&content));
        path
    };

    let sidecar = root.path().join(format!(
        "{}.{}",
        path.file_name().unwrap().to_str().unwrap(),
        HashKind::Sha1.extension()
    ));
    assert_eq!(fs::read_to_string(&sidecar).unwrap(), sha1_hex(&content));

    // A fresh cache trusts the sidecar over the content.
    fs::write(&sidecar, "deadbeef").unwrap();
    let cache = FileCache::new(root.path()).unwrap();
    assert_eq!(cache.file_sha1(&path, &mut |_| {}).unwrap(), "DEADBEEF");
}

#[test]
fn test_sidecars_do_not_count_as_entries() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();
    let path = stored_file(&cache, scratch.path(), MOD_URL, b"0123456789");
    cache.file_sha1(&path, &mut |_| {}).unwrap();

    assert_eq!(cache.size_info(), (1, 10));
}

#[test]
fn test_remove_deletes_sidecars() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();
    let path = stored_file(&cache, scratch.path(), MOD_URL, b"data");
    cache.file_sha256(&path, &mut |_| {}).unwrap();

    assert!(cache.remove(&url(MOD_URL)).unwrap());
    assert!(!cache.remove(&url(MOD_URL)).unwrap());
    let left: Vec<_> = fs::read_dir(root.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    assert!(left.is_empty());
}

#[test]
fn test_remove_all_includes_partials() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();
    let path = stored_file(&cache, scratch.path(), MOD_URL, b"data");
    cache.file_sha1(&path, &mut |_| {}).unwrap();
    let partial = cache.in_progress_path(&url("https://example.com/b.zip"), "b.zip");
    fs::write(&partial, b"part").unwrap();
    assert_eq!(partial.parent().unwrap(), root.path().join(IN_PROGRESS_DIR));

    assert_eq!(cache.remove_all().unwrap(), 3);
    assert_eq!(cache.size_info(), (0, 0));
    assert!(!partial.exists());
}

#[test]
fn test_legacy_dirs_are_searched_and_root_wins() {
    let root = create_temp_dir();
    let legacy = create_temp_dir();
    let hash = url_hash(&url(MOD_URL));
    fs::write(legacy.path().join(format!("{hash}-old.zip")), b"legacy").unwrap();

    let cache = FileCache::new(root.path()).unwrap().with_legacy_dirs(vec![legacy.path().to_path_buf()]);
    let found = cache.get_cached_filename(&url(MOD_URL), None).unwrap();
    assert_eq!(found.parent().unwrap(), legacy.path());

    fs::write(root.path().join(format!("{hash}-new.zip")), b"root").unwrap();
    cache.notify_changed();
    let found = cache.get_cached_filename(&url(MOD_URL), None).unwrap();
    assert_eq!(found.parent().unwrap(), root.path());
}

#[test]
fn test_move_from_migrates_and_drops_duplicates() {
    let root = create_temp_dir();
    let old = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();
    stored_file(&cache, scratch.path(), MOD_URL, b"kept");

    let other = url("https://github.com/KSP-RO/RP-1/releases/download/v1.0/RP-1.zip");
    let migrated = format!("{}-RP-1.zip", url_hash(&other));
    fs::write(old.path().join(&migrated), b"rp1").unwrap();
    fs::write(old.path().join(format!("{migrated}.sha1")), "ABCDEF").unwrap();
    let duplicate = format!("{}-Astrogator.zip", url_hash(&url(MOD_URL)));
    fs::write(old.path().join(&duplicate), b"dupe").unwrap();
    fs::write(old.path().join("notes.txt"), b"not a cache file").unwrap();

    let generation = cache.generation();
    assert_eq!(cache.move_from(old.path()).unwrap(), 1);
    assert!(cache.generation() > generation);

    assert!(root.path().join(&migrated).exists());
    assert!(root.path().join(format!("{migrated}.sha1")).exists());
    assert!(!old.path().join(&duplicate).exists());
    assert!(old.path().join("notes.txt").exists());
    assert!(cache.is_cached(&other));
    assert_eq!(fs::read(cache.get_cached_filename(&url(MOD_URL), None).unwrap()).unwrap(), b"kept");
    assert_eq!(cache.size_info(), (2, 7));
}

#[test]
fn test_enforce_size_limit_evicts_least_useful_first() {
    let root = create_temp_dir();
    let scratch = create_temp_dir();
    let cache = FileCache::new(root.path()).unwrap();

    let unknown_url = "https://example.com/orphan.zip";
    let incompatible_url = "https://example.com/old-game.zip";
    let compatible_url = "https://example.com/current.zip";
    let unknown = stored_file(&cache, scratch.path(), unknown_url, &[0u8; 100]);
    let incompatible = stored_file(&cache, scratch.path(), incompatible_url, &[1u8; 100]);
    let compatible = stored_file(&cache, scratch.path(), compatible_url, &[2u8; 100]);

    let mut registry = InMemoryRegistry::new();
    registry.add(Package::new("OldMod", "1.0").with_download(url(incompatible_url)));
    registry.add(Package::new("CurrentMod", "1.0").with_download(url(compatible_url)));

    let current = |p: &Package| p.identifier == "CurrentMod";
    let criteria: [&dyn CompatibilityCriteria; 1] = [&current];

    assert!(cache.enforce_size_limit(300, &registry, &criteria).unwrap().is_empty());

    let removed = cache.enforce_size_limit(250, &registry, &criteria).unwrap();
    assert_eq!(removed, vec![unknown.clone()]);

    let removed = cache.enforce_size_limit(100, &registry, &criteria).unwrap();
    assert_eq!(removed, vec![incompatible]);
    assert!(compatible.exists());
    assert_eq!(cache.size_info(), (1, 100));
}
