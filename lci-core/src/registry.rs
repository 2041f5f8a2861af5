use std::collections::HashMap;

use crate::error::{LciCoreError, Result};

/// Registry of the human-readable activity/flow labels backing both axes of
/// the technosphere matrix. Label index `i` is simultaneously row `i` and
/// column `i` of the matrix.
///
/// Resolution is by case-sensitive substring matching: a label matches when it
/// contains every `contains` pattern and none of the `excludes` patterns.
/// Pattern order is irrelevant. Resolution is stable for the lifetime of the
/// registry.
#[derive(Debug, Clone)]
pub struct ActivityRegistry {
    labels: Vec<String>,
    position: HashMap<String, usize>,
}

impl ActivityRegistry {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        let mut position = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if position.insert(label.clone(), i).is_some() {
                return Err(LciCoreError::DuplicateLabel(label.clone()));
            }
        }
        Ok(Self { labels, position })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Exact-label lookup. Fails loudly when the label is absent.
    pub fn index_of(&self, label: &str) -> Result<usize> {
        self.position
            .get(label)
            .copied()
            .ok_or_else(|| LciCoreError::NoMatchingLabel {
                contains: vec![label.to_string()],
                excludes: vec![],
            })
    }

    /// Returns every label index matching all `contains` patterns and none of
    /// the `excludes` patterns. A zero-match result is an error, never an
    /// empty set: a silent no-match would leave the inventory physically
    /// incomplete with no diagnostic trail.
    pub fn find_indices(&self, contains: &[&str], excludes: &[&str]) -> Result<Vec<usize>> {
        let matches: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| {
                contains.iter().all(|p| label.contains(p))
                    && !excludes.iter().any(|p| label.contains(p))
            })
            .map(|(i, _)| i)
            .collect();
        if matches.is_empty() {
            return Err(LciCoreError::NoMatchingLabel {
                contains: contains.iter().map(|s| s.to_string()).collect(),
                excludes: excludes.iter().map(|s| s.to_string()).collect(),
            });
        }
        log::trace!(
            "Resolved contains={:?}, excludes={:?} to {} label(s)",
            contains,
            excludes,
            matches.len()
        );
        Ok(matches)
    }

    /// Like [`find_indices`](Self::find_indices), but requires exactly one
    /// match.
    pub fn find_index(&self, contains: &[&str], excludes: &[&str]) -> Result<usize> {
        let matches = self.find_indices(contains, excludes)?;
        if matches.len() != 1 {
            return Err(LciCoreError::AmbiguousLabel {
                contains: contains.iter().map(|s| s.to_string()).collect(),
                excludes: excludes.iter().map(|s| s.to_string()).collect(),
                found: matches.len(),
            });
        }
        Ok(matches[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ActivityRegistry {
        ActivityRegistry::new(vec![
            "maintenance, bus".to_string(),
            "Bus, 13m-city, ICEV-d, 2020".to_string(),
            "Bus, 13m-city, BEV-depot, 2020".to_string(),
            "transport, bus, 13m-city, ICEV-d, 2020".to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let result = ActivityRegistry::new(vec!["a".to_string(), "a".to_string()]);
        assert!(matches!(result, Err(LciCoreError::DuplicateLabel(_))));
    }

    #[test]
    fn test_find_indices_contains_and_excludes() {
        let registry = registry();
        // "Bus, " is case-sensitive and does not match "transport, bus, ".
        let buses = registry.find_indices(&["Bus, "], &[]).unwrap();
        assert_eq!(buses, vec![1, 2]);

        let icev = registry.find_indices(&["Bus, "], &["BEV"]).unwrap();
        assert_eq!(icev, vec![1]);

        // Multi-pattern matching is an AND, order irrelevant.
        let depot = registry
            .find_indices(&["BEV-depot", "Bus, "], &[])
            .unwrap();
        assert_eq!(depot, vec![2]);
    }

    #[test]
    fn test_zero_matches_fail_loudly() {
        let registry = registry();
        let result = registry.find_indices(&["Truck, "], &[]);
        assert!(matches!(result, Err(LciCoreError::NoMatchingLabel { .. })));
    }

    #[test]
    fn test_find_index_requires_single_match() {
        let registry = registry();
        assert_eq!(registry.find_index(&["maintenance, bus"], &[]).unwrap(), 0);
        let result = registry.find_index(&["Bus, "], &[]);
        assert!(matches!(
            result,
            Err(LciCoreError::AmbiguousLabel { found: 2, .. })
        ));
    }

    #[test]
    fn test_index_of_exact() {
        let registry = registry();
        assert_eq!(
            registry.index_of("transport, bus, 13m-city, ICEV-d, 2020").unwrap(),
            3
        );
        assert!(registry.index_of("missing").is_err());
    }
}
