//! Skip-bucket filter.

use std::collections::HashSet;

/// Buckets excluded from all export and live-notification processing.
#[derive(Debug, Clone, Default)]
pub struct BucketFilter {
    skipped: HashSet<String>,
}

impl BucketFilter {
    /// Build a filter from explicit bucket names, ignoring empties.
    #[must_use]
    pub fn new<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skipped: buckets
                .into_iter()
                .map(Into::into)
                .filter(|b| !b.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list as given on the command line.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim))
    }

    /// Whether `bucket` is excluded from replication.
    #[must_use]
    pub fn is_skipped(&self, bucket: &str) -> bool {
        self.skipped.contains(bucket)
    }

    /// Number of buckets being skipped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.skipped.len()
    }

    /// Whether the filter skips nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_comma_separated() {
        let filter = BucketFilter::parse("logs, tmp ,cache");
        assert!(filter.is_skipped("logs"));
        assert!(filter.is_skipped("tmp"));
        assert!(filter.is_skipped("cache"));
        assert!(!filter.is_skipped("photos"));
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn empty_list_skips_nothing() {
        let filter = BucketFilter::parse("");
        assert!(filter.is_empty());
        assert!(!filter.is_skipped("anything"));
    }
}
