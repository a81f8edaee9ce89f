//! Per-executable patch tallies from `ppu_patch`, `spu_patch`, `ovl_patch`
//! and `prx_patch` entries such as `a1b2c3d4e5 (<- 3)`.

use once_cell::sync::Lazy;
use regex::Regex;

static PROGRAM_HASH_PATCH: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?<hash>\w+(-\d+)?)( \(<-\s*(?<patch_count>\d+)\))?")
        .map_err(|e| tracing::error!(error = %e, "patch hash pattern failed to compile"))
        .ok()
});

/// Hash to applied-patch count, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchCounts(Vec<(String, u32)>);

impl PatchCounts {
    fn insert(&mut self, hash: &str, count: u32) {
        match self.0.iter_mut().find(|(h, _)| h == hash) {
            Some(entry) => entry.1 = count,
            None => self.0.push((hash.to_string(), count)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(h, c)| (h.as_str(), *c))
    }

    /// Only the hashes that had at least one patch applied.
    pub fn applied(&self) -> PatchCounts {
        PatchCounts(self.0.iter().filter(|(_, c)| *c > 0).cloned().collect())
    }

    pub fn first_hash(&self) -> Option<&str> {
        self.0.first().map(|(h, _)| h.as_str())
    }

    pub fn count(&self, hash: &str) -> Option<u32> {
        self.0.iter().find(|(h, _)| h == hash).map(|(_, c)| *c)
    }

    pub fn contains_ignore_case(&self, hash: &str) -> bool {
        self.0.iter().any(|(h, _)| h.eq_ignore_ascii_case(hash))
    }

    /// `3/1/2`
    pub fn joined_counts(&self) -> String {
        self.0
            .iter()
            .map(|(_, c)| c.to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Parses every entry; a missing count reads as zero and a repeated hash
/// keeps its first position with the latest count.
pub fn parse_patches(entries: &[String]) -> PatchCounts {
    let mut counts = PatchCounts::default();
    let Some(re) = PROGRAM_HASH_PATCH.as_ref() else {
        return counts;
    };
    for entry in entries {
        let Some(caps) = re.captures(entry) else {
            continue;
        };
        let Some(hash) = caps.name("hash") else {
            continue;
        };
        let count = caps
            .name("patch_count")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        counts.insert(hash.as_str(), count);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn counts_and_order() {
        let counts = parse_patches(&entries(&[
            "29f5aaf0a4b1fa24cbc4a19d2ccbed2d51a7f3f2 (<- 3)",
            "a1b2c3d4e5f6",
            "5f0ec0e5b4e8e3b6c1d8c94df8f4c8c6b98c7a1e-12 (<- 1)",
        ]));
        assert_eq!(counts.first_hash(), Some("29f5aaf0a4b1fa24cbc4a19d2ccbed2d51a7f3f2"));
        assert_eq!(counts.count("a1b2c3d4e5f6"), Some(0));
        assert_eq!(
            counts.count("5f0ec0e5b4e8e3b6c1d8c94df8f4c8c6b98c7a1e-12"),
            Some(1)
        );
        assert_eq!(counts.applied().joined_counts(), "3/1");
    }

    #[test]
    fn repeated_hash_keeps_position() {
        let counts = parse_patches(&entries(&["aaa (<- 1)", "bbb (<- 2)", "aaa (<- 5)"]));
        assert_eq!(counts.joined_counts(), "5/2");
        assert!(counts.contains_ignore_case("AAA"));
    }

    #[test]
    fn empty_input() {
        assert!(parse_patches(&[]).is_empty());
    }
}
