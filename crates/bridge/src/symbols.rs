use std::collections::{HashMap, HashSet};

use crate::error::SymbolTableError;

/// One-to-one map from source instrument identifiers (broker naming) to the
/// normalized symbols published downstream.
///
/// Built once at startup from entries of the form `EURUSD` (identity) or
/// `EURUSD.r=EURUSD` (explicit mapping). Broker suffixes vary, so source names
/// are only required to be non-empty, free of whitespace and free of `=`.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    map: HashMap<String, String>,
}

impl SymbolTable {
    /// Parse and validate a set of entries. Duplicates on either side of the
    /// mapping are rejected so every published symbol has exactly one source.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, SymbolTableError> {
        let mut map = HashMap::new();
        let mut normalized_seen = HashSet::new();

        for entry in entries {
            let entry = entry.as_ref().trim();
            let (source, normalized) = match entry.split_once('=') {
                Some((source, normalized)) => (source.trim(), normalized.trim()),
                None => (entry, entry),
            };

            if !valid_name(source) || !valid_name(normalized) {
                return Err(SymbolTableError::Malformed(entry.to_string()));
            }
            if map.contains_key(source) {
                return Err(SymbolTableError::DuplicateSource(source.to_string()));
            }
            if !normalized_seen.insert(normalized.to_string()) {
                return Err(SymbolTableError::DuplicateNormalized(normalized.to_string()));
            }
            map.insert(source.to_string(), normalized.to_string());
        }

        if map.is_empty() {
            return Err(SymbolTableError::Empty);
        }
        Ok(Self { map })
    }

    /// Normalized symbol for a source instrument, if the table knows it.
    pub fn normalize(&self, source: &str) -> Option<&str> {
        self.map.get(source).map(String::as_str)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.map.contains_key(source)
    }

    /// Source instrument identifiers, sorted for stable iteration.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.map.keys().cloned().collect();
        sources.sort();
        sources
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['=', ' ', '\t'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_entry() {
        let table = SymbolTable::parse(&["EURUSD"]).unwrap();
        assert_eq!(table.normalize("EURUSD"), Some("EURUSD"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn mapped_entry() {
        let table = SymbolTable::parse(&["EURUSD.r=EURUSD", "GBPUSD"]).unwrap();
        assert_eq!(table.normalize("EURUSD.r"), Some("EURUSD"));
        assert_eq!(table.normalize("EURUSD"), None);
        assert_eq!(table.normalize("GBPUSD"), Some("GBPUSD"));
    }

    #[test]
    fn contains_checks_source_side() {
        let table = SymbolTable::parse(&["EURUSD.r=EURUSD"]).unwrap();
        assert!(table.contains("EURUSD.r"));
        assert!(!table.contains("EURUSD"));
    }

    #[test]
    fn entries_are_trimmed() {
        let table = SymbolTable::parse(&[" EURUSD ", " GBPUSD.m = GBPUSD "]).unwrap();
        assert_eq!(table.normalize("EURUSD"), Some("EURUSD"));
        assert_eq!(table.normalize("GBPUSD.m"), Some("GBPUSD"));
    }

    #[test]
    fn empty_set_rejected() {
        assert_eq!(
            SymbolTable::parse::<&str>(&[]).unwrap_err(),
            SymbolTableError::Empty
        );
    }

    #[test]
    fn malformed_entries_rejected() {
        for entry in ["", "=EURUSD", "EURUSD=", "A=B=C", "EUR USD"] {
            assert!(
                matches!(
                    SymbolTable::parse(&[entry]),
                    Err(SymbolTableError::Malformed(_))
                ),
                "entry {entry:?} should be malformed"
            );
        }
    }

    #[test]
    fn duplicate_source_rejected() {
        assert_eq!(
            SymbolTable::parse(&["EURUSD", "EURUSD=EURX"]).unwrap_err(),
            SymbolTableError::DuplicateSource("EURUSD".into())
        );
    }

    #[test]
    fn duplicate_normalized_rejected() {
        assert_eq!(
            SymbolTable::parse(&["EURUSD.a=EURUSD", "EURUSD.b=EURUSD"]).unwrap_err(),
            SymbolTableError::DuplicateNormalized("EURUSD".into())
        );
    }

    #[test]
    fn sources_are_sorted() {
        let table = SymbolTable::parse(&["USDJPY", "EURUSD", "GBPUSD"]).unwrap();
        assert_eq!(table.sources(), vec!["EURUSD", "GBPUSD", "USDJPY"]);
    }
}
