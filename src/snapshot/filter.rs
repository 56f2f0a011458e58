//! Inclusion filter for tables and views.

use std::collections::HashSet;

/// Decides whether a named table or view takes part in capture and comparison.
///
/// An empty allow-list allows everything; the deny-list always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InclusionFilter {
    allow: HashSet<String>,
    deny: HashSet<String>,
}

impl InclusionFilter {
    pub fn new<A, D>(allow: A, deny: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            allow: allow.into_iter().map(Into::into).collect(),
            deny: deny.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter that lets every entity through
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_included(&self, name: &str) -> bool {
        (self.allow.is_empty() || self.allow.contains(name)) && !self.deny.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_lists_allow_all() {
        let filter = InclusionFilter::allow_all();
        assert!(filter.is_included("users"));
        assert!(filter.is_included(""));
    }

    #[test]
    fn test_deny_list_only() {
        let filter = InclusionFilter::new(Vec::<String>::new(), ["audit_log"]);
        assert!(filter.is_included("users"));
        assert!(filter.is_included("audit_log_archive"));
        assert!(!filter.is_included("audit_log"));
    }

    #[test]
    fn test_allow_list_restricts() {
        let filter = InclusionFilter::new(["users", "orders"], Vec::<String>::new());
        assert!(filter.is_included("users"));
        assert!(!filter.is_included("payments"));
    }

    #[test]
    fn test_deny_beats_allow() {
        let filter = InclusionFilter::new(["users"], ["users"]);
        assert!(!filter.is_included("users"));
    }
}
