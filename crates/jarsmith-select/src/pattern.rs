//! Top-level type patterns and the merge-join that applies them.
//!
//! A pattern is either the binary name of a top-level class, which selects
//! `<name>.class` and every `<name>$...` nested class, or a prefix ending in
//! `*`, which selects every entry starting with the prefix.

use std::cmp::Ordering;

use crate::error::SelectError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypePattern {
    raw: String,
    /// The prefix for wildcards, `<name>.class` otherwise.
    key: String,
    /// `<name>$` for top-level patterns.
    nested_prefix: Option<String>,
}

impl TypePattern {
    pub fn parse(raw: &str) -> Result<Self, SelectError> {
        let invalid = || SelectError::InvalidPattern(raw.to_string());
        if raw.is_empty() {
            return Err(invalid());
        }
        match raw.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => Err(invalid()),
            Some(prefix) => Ok(Self {
                raw: raw.to_string(),
                key: prefix.to_string(),
                nested_prefix: None,
            }),
            None if raw.contains('*') => Err(invalid()),
            None => Ok(Self {
                raw: raw.to_string(),
                key: format!("{raw}.class"),
                nested_prefix: Some(format!("{raw}$")),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.nested_prefix.is_none()
    }

    /// Orders an entry name against this pattern. `Equal` means the entry
    /// matches; otherwise the entry is ordered against the comparison key.
    pub fn compare(&self, entry: &str) -> Ordering {
        match &self.nested_prefix {
            None if entry.starts_with(&self.key) => Ordering::Equal,
            Some(nested) if entry == self.key || entry.starts_with(nested.as_str()) => {
                Ordering::Equal
            }
            _ => entry.cmp(&self.key),
        }
    }

    pub fn matches(&self, entry: &str) -> bool {
        self.compare(entry) == Ordering::Equal
    }
}

/// A sorted, deduplicated pattern list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternList {
    patterns: Vec<TypePattern>,
}

impl PatternList {
    pub fn new<I, S>(patterns: I) -> Result<Self, SelectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = patterns
            .into_iter()
            .map(|raw| TypePattern::parse(raw.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        patterns.sort_by(|a, b| a.raw.cmp(&b.raw));
        patterns.dedup_by(|a, b| a.raw == b.raw);
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypePattern> {
        self.patterns.iter()
    }

    /// Selects the candidates matched by any pattern with one forward pass
    /// over both sorted sequences.
    ///
    /// `candidates` must be sorted ascending. Every pattern has to match at
    /// least one candidate; otherwise the unmatched patterns are reported.
    pub fn select<S: AsRef<str>>(&self, candidates: &[S]) -> Result<Vec<String>, SelectError> {
        debug_assert!(candidates
            .windows(2)
            .all(|w| w[0].as_ref() <= w[1].as_ref()));
        if self.patterns.is_empty() {
            return Ok(Vec::new());
        }

        let mut selected = Vec::new();
        let mut matched = vec![false; self.patterns.len()];
        let (mut i, mut j) = (0usize, 0usize);
        while i < candidates.len() && j < self.patterns.len() {
            let candidate = candidates[i].as_ref();
            match self.patterns[j].compare(candidate) {
                Ordering::Less => i += 1,
                Ordering::Equal => {
                    selected.push(candidate.to_string());
                    matched[j] = true;
                    i += 1;
                }
                Ordering::Greater => j += 1,
            }
        }

        let unmatched: Vec<String> = self
            .patterns
            .iter()
            .zip(&matched)
            .filter(|(_, matched)| !**matched)
            .map(|(pattern, _)| pattern.raw.clone())
            .collect();
        if !unmatched.is_empty() {
            return Err(SelectError::UnmatchedPatterns {
                patterns: unmatched,
            });
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pattern(raw: &str) -> TypePattern {
        TypePattern::parse(raw).unwrap()
    }

    #[test]
    fn top_level_pattern_matches_class_and_nested_classes() {
        let p = pattern("a/b/A");
        assert!(p.matches("a/b/A.class"));
        assert!(p.matches("a/b/A$B.class"));
        assert!(p.matches("a/b/A$B$C.class"));
        assert!(!p.matches("a/b/AB.class"));
        assert!(!p.matches("a/b/A"));
    }

    #[test]
    fn wildcard_pattern_is_a_plain_prefix() {
        let p = pattern("a/b/*");
        assert!(p.is_wildcard());
        assert!(p.matches("a/b/A.class"));
        assert!(p.matches("a/b/AB.class"));
        assert!(p.matches("a/b/c/D.class"));
        assert!(!p.matches("a/c/D.class"));
    }

    #[test]
    fn rejects_malformed_patterns() {
        for raw in ["", "a/*/B", "a/**"] {
            assert!(matches!(
                TypePattern::parse(raw),
                Err(SelectError::InvalidPattern(_))
            ));
        }
    }

    #[test]
    fn selects_comprehensive_scenario() {
        let patterns = PatternList::new(["a/b/c/D", "a/b/A*"]).unwrap();
        let mut candidates = vec![
            "a/b/A.class",
            "a/b/A$B.class",
            "a/b/A$B$C.class",
            "a/b/AB.class",
            "a/b/c/D.class",
            "a/b/c/D$E.class",
            "a/b/c/D$E$F.class",
            "a/b/c/DE.class",
        ];
        candidates.sort_unstable();

        let mut selected = patterns.select(&candidates).unwrap();
        selected.sort_unstable();
        let mut expected = vec![
            "a/b/A.class",
            "a/b/A$B.class",
            "a/b/A$B$C.class",
            "a/b/AB.class",
            "a/b/c/D.class",
            "a/b/c/D$E.class",
            "a/b/c/D$E$F.class",
        ];
        expected.sort_unstable();
        assert_eq!(selected, expected);
    }

    #[test]
    fn empty_inputs_select_nothing() {
        let none: [&str; 0] = [];
        let empty = PatternList::new(none).unwrap();
        assert!(empty.select(&none).unwrap().is_empty());
        assert!(empty.select(&["a/B.class"]).unwrap().is_empty());
    }

    #[test]
    fn every_pattern_must_match() {
        let patterns = PatternList::new(["a/B", "a/Missing", "z/*"]).unwrap();
        let err = patterns.select(&["a/B.class", "a/C.class"]).unwrap_err();
        match err {
            SelectError::UnmatchedPatterns { patterns } => {
                assert_eq!(patterns, vec!["a/Missing", "z/*"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The last pattern gets no exemption either.
        let patterns = PatternList::new(["a/B", "a/C"]).unwrap();
        assert!(patterns.select(&["a/B.class"]).is_err());

        // Patterns given against an empty archive are unmatched.
        let patterns = PatternList::new(["a/B"]).unwrap();
        let none: [&str; 0] = [];
        assert!(patterns.select(&none).is_err());
    }

    #[test]
    fn duplicate_patterns_collapse() {
        let patterns = PatternList::new(["a/B", "a/B", "a/*"]).unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(
            patterns.iter().map(TypePattern::as_str).collect::<Vec<_>>(),
            vec!["a/*", "a/B"]
        );
    }
}
