//! Mirror ordering by preferred host.

use reqwest::Url;
use std::cmp::Ordering;

/// Orders URLs by the position of their host in a preference list.
///
/// A `None` entry stands for every host not named in the list, so hosts
/// listed after it sort last. Without a `None` entry, unlisted hosts sort
/// after all listed ones. Sorting is stable.
///
/// ```rust
/// use modcore::utils::PreferredHostComparator;
/// use reqwest::Url;
///
/// let comparator = PreferredHostComparator::new([
///     Some("spacedock.info".to_string()),
///     None,
///     Some("archive.org".to_string()),
/// ]);
/// let mut urls: Vec<Url> = vec![
///     "https://archive.org/a.zip".parse().unwrap(),
///     "https://github.com/a.zip".parse().unwrap(),
///     "https://spacedock.info/a.zip".parse().unwrap(),
/// ];
/// comparator.sort(&mut urls);
/// let hosts: Vec<_> = urls.iter().filter_map(|u| u.host_str()).collect();
/// assert_eq!(hosts, vec!["spacedock.info", "github.com", "archive.org"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PreferredHostComparator {
    preferred: Vec<Option<String>>,
}

impl PreferredHostComparator {
    pub fn new(preferred: impl IntoIterator<Item = Option<String>>) -> Self {
        Self {
            preferred: preferred
                .into_iter()
                .map(|host| host.map(|h| h.to_ascii_lowercase()))
                .collect(),
        }
    }

    fn rank(&self, url: &Url) -> usize {
        let host = url.host_str().map(str::to_ascii_lowercase);
        if let Some(position) = self
            .preferred
            .iter()
            .position(|p| p.is_some() && *p == host)
        {
            return position;
        }
        self.preferred
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.preferred.len())
    }

    pub fn compare(&self, a: &Url, b: &Url) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }

    pub fn sort(&self, urls: &mut [Url]) {
        urls.sort_by(|a, b| self.compare(a, b));
    }
}
