//! Column lookup against the header row

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::HeaderMatch;
use crate::error::CleanError;
use crate::model::Column;

/// Requested column name → 0-based header position.
///
/// Keys keep the order in which the caller requested them. A map only exists
/// when every requested name was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndexMap {
    indices: IndexMap<String, usize>,
}

impl ColumnIndexMap {
    /// Scan the header once and resolve every requested name.
    ///
    /// When a header name repeats, the first occurrence wins. All missing
    /// names are reported together.
    pub fn locate(
        columns: &[Column],
        targets: &[String],
        mode: HeaderMatch,
    ) -> Result<Self, CleanError> {
        let mut header: FxHashMap<String, usize> = FxHashMap::default();
        for column in columns {
            header
                .entry(normalize(&column.name, mode))
                .or_insert(column.index);
        }

        let mut indices = IndexMap::with_capacity(targets.len());
        let mut missing: Vec<String> = Vec::new();

        for target in targets {
            if indices.contains_key(target) || missing.contains(target) {
                continue;
            }
            match header.get(&normalize(target, mode)) {
                Some(&idx) => {
                    indices.insert(target.clone(), idx);
                }
                None => missing.push(target.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(CleanError::ColumnsNotFound(missing));
        }

        debug!(?indices, "located target columns");
        Ok(Self { indices })
    }

    /// Column positions in request order
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.values().copied()
    }

    /// Position of a requested column
    pub fn get(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// Requested names in request order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

fn normalize(name: &str, mode: HeaderMatch) -> String {
    match mode {
        HeaderMatch::Exact => name.to_string(),
        HeaderMatch::Normalized => name.trim().to_lowercase(),
    }
}
