//! Module version ordering.
//!
//! A version string is `[epoch:]version`. Epochs compare numerically first;
//! the remainder is compared chunk by chunk, alternating between runs of
//! non-digits (compared as strings, with `.` sorting after everything else)
//! and runs of digits (compared as numbers, so `1.10 > 1.9` and `1.01 == 1.1`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A totally ordered module version.
#[derive(Debug, Clone)]
pub struct ModuleVersion {
    epoch: u64,
    version: String,
    raw: String,
}

impl ModuleVersion {
    /// Parse a version string. Every string is a valid version.
    pub fn new(raw: &str) -> Self {
        let (epoch, version) = match raw.split_once(':') {
            Some((epoch, rest))
                if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) =>
            {
                (epoch.parse().unwrap_or(0), rest.to_string())
            }
            _ => (0, raw.to_string()),
        };
        Self {
            epoch,
            version,
            raw: raw.to_string(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The version without its epoch.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for ModuleVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ModuleVersion::new(s))
    }
}

impl From<&str> for ModuleVersion {
    fn from(s: &str) -> Self {
        ModuleVersion::new(s)
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for ModuleVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ModuleVersion {}

impl PartialOrd for ModuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_versions(&self.version, &other.version))
    }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (mut first, mut second) = (a, b);
    while !first.is_empty() && !second.is_empty() {
        let (text1, rest1) = split_run(first, |c| !c.is_ascii_digit());
        let (text2, rest2) = split_run(second, |c| !c.is_ascii_digit());
        let ord = compare_text(text1, text2);
        if ord != Ordering::Equal {
            return ord;
        }

        let (num1, rest1) = split_run(rest1, |c| c.is_ascii_digit());
        let (num2, rest2) = split_run(rest2, |c| c.is_ascii_digit());
        let ord = parse_number(num1).cmp(&parse_number(num2));
        if ord != Ordering::Equal {
            return ord;
        }

        first = rest1;
        second = rest2;
    }

    // Whichever runs out first is the smaller: 1.2 < 1.2.3
    match (first.is_empty(), second.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn split_run(s: &str, pred: impl Fn(char) -> bool) -> (&str, &str) {
    let end = s.find(|c: char| !pred(c)).unwrap_or(s.len());
    s.split_at(end)
}

fn parse_number(digits: &str) -> u128 {
    digits.parse().unwrap_or(0)
}

fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.chars().next(), b.chars().next()) {
        (Some(c1), Some(c2)) => match (c1 == '.', c2 == '.') {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => match (a.len() == 1, b.len() == 1) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => a.cmp(b),
            },
            (false, false) => a.cmp(b),
        },
        _ => a.cmp(b),
    }
}
