//! Filesystem-safe names for sources, windows and panels
//!
//! Source names, window tags and panel titles are arbitrary user strings.
//! [`sanitize_component`] maps them onto a single safe path component and
//! [`StemAllocator`] applies the panel collision policy.

use std::collections::HashSet;

/// Characters rejected on at least one supported filesystem
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replacement for every rejected character
pub const REPLACEMENT: char = '_';

/// Turn an arbitrary string into one safe path component
///
/// - path separators, control characters and Windows-reserved characters
///   become `_`
/// - leading/trailing whitespace and dots are trimmed
/// - an empty result becomes `_`
///
/// The function is idempotent: `sanitize_component(sanitize_component(s))`
/// equals `sanitize_component(s)`.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if c.is_control() || RESERVED.contains(&c) {
                REPLACEMENT
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        REPLACEMENT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Check whether a string survives sanitisation unchanged
#[inline]
#[must_use]
pub fn is_safe_component(raw: &str) -> bool {
    sanitize_component(raw) == raw
}

/// Allocates collision-free file stems for the panels of one source
///
/// The first panel keeps its sanitised title. A later panel whose stem
/// collides case-insensitively with an allocated one gets `__{panel_id}`
/// appended (and a numeric suffix on top if even that collides).
#[derive(Debug, Default)]
pub struct StemAllocator {
    taken: HashSet<String>,
}

impl StemAllocator {
    /// Create an empty allocator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the stem for a panel
    pub fn allocate(&mut self, title: &str, panel_id: u64) -> String {
        let base = sanitize_component(title);
        if self.claim(&base) {
            return base;
        }

        let with_id = format!("{base}__{panel_id}");
        if self.claim(&with_id) {
            return with_id;
        }

        let mut n = 2usize;
        loop {
            let candidate = format!("{with_id}_{n}");
            if self.claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn claim(&mut self, stem: &str) -> bool {
        self.taken.insert(stem.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_names_are_untouched() {
        assert_eq!(sanitize_component("CPU usage"), "CPU usage");
        assert_eq!(sanitize_component("prod-eu_1"), "prod-eu_1");
        assert!(is_safe_component("Latency p99"));
    }

    #[test]
    fn separators_and_controls_are_replaced() {
        assert_eq!(sanitize_component("rx/tx"), "rx_tx");
        assert_eq!(sanitize_component("a\\b"), "a_b");
        assert_eq!(sanitize_component("line\nbreak"), "line_break");
        assert_eq!(sanitize_component("what? *now*"), "what_ _now_");
    }

    #[test]
    fn dot_names_cannot_escape() {
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("."), "_");
        assert_eq!(sanitize_component(""), "_");
        assert_eq!(sanitize_component("  .hidden. "), "hidden");
        assert_eq!(sanitize_component("../etc/passwd"), "_etc_passwd");
    }

    #[test]
    fn allocator_keeps_first_title() {
        let mut stems = StemAllocator::new();
        assert_eq!(stems.allocate("Requests", 1), "Requests");
        assert_eq!(stems.allocate("Errors", 2), "Errors");
    }

    #[test]
    fn allocator_disambiguates_collisions() {
        let mut stems = StemAllocator::new();
        assert_eq!(stems.allocate("Row", 3), "Row");
        assert_eq!(stems.allocate("Row", 7), "Row__7");
        assert_eq!(stems.allocate("row", 9), "row__9");
        assert_eq!(stems.allocate("a/b", 10), "a_b");
        assert_eq!(stems.allocate("a_b", 11), "a_b__11");
    }

    #[test]
    fn allocator_survives_suffix_collision() {
        let mut stems = StemAllocator::new();
        assert_eq!(stems.allocate("x__5", 1), "x__5");
        assert_eq!(stems.allocate("x", 2), "x");
        assert_eq!(stems.allocate("x", 5), "x__5_2");
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(raw in ".{0,40}") {
            let once = sanitize_component(&raw);
            prop_assert_eq!(sanitize_component(&once), once.clone());
        }

        #[test]
        fn sanitized_component_is_single_segment(raw in ".{0,40}") {
            let clean = sanitize_component(&raw);
            prop_assert!(!clean.is_empty());
            prop_assert!(!clean.contains('/'));
            prop_assert!(!clean.contains('\\'));
            prop_assert!(clean != "." && clean != "..");
            prop_assert!(!clean.chars().any(char::is_control));
        }
    }
}
