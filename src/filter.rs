//! Blank-row detection and removal

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::locate::ColumnIndexMap;
use crate::model::{CellValue, Row, Table};

/// Decides whether a single cell counts as blank.
///
/// Null, empty, whitespace-only, and NaN cells are always blank. Extra
/// missing-value tokens match the raw cell text exactly.
#[derive(Debug, Clone, Default)]
pub struct BlankPredicate {
    na_values: FxHashSet<String>,
}

impl BlankPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat these exact strings as blank too
    pub fn with_na_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.na_values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_blank(&self, cell: &CellValue) -> bool {
        match cell {
            CellValue::Null => true,
            CellValue::String(s) => s.trim().is_empty() || self.na_values.contains(&**s),
            CellValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// True when any located column of the row is blank.
    ///
    /// Stops at the first blank cell. A row shorter than the header is blank
    /// in its missing columns.
    pub fn row_has_blank(&self, row: &Row, columns: &ColumnIndexMap) -> bool {
        columns
            .positions()
            .any(|idx| row.get(idx).map_or(true, |cell| self.is_blank(cell)))
    }
}

/// Source row numbers marked for removal.
///
/// Built completely before anything is mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDeletionSet {
    rows: BTreeSet<usize>,
}

impl RowDeletionSet {
    pub fn insert(&mut self, source_line: usize) {
        self.rows.insert(source_line);
    }

    pub fn contains(&self, source_line: usize) -> bool {
        self.rows.contains(&source_line)
    }

    /// Highest row first, so each deletion leaves pending rows in place
    pub fn descending(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().rev().copied()
    }

    /// Lowest row first
    pub fn ascending(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<usize> for RowDeletionSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Counts from a filtering pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub rows_scanned: usize,
    pub rows_removed: usize,
    pub rows_kept: usize,
}

/// Identify every data row with a blank cell in a located column
pub fn find_blank_rows(
    table: &Table,
    columns: &ColumnIndexMap,
    predicate: &BlankPredicate,
) -> RowDeletionSet {
    table
        .rows
        .iter()
        .filter(|row| predicate.row_has_blank(row, columns))
        .map(|row| row.source_line)
        .collect()
}

/// Build a new table holding only the rows without blank target cells
pub fn filter_table(
    table: &Table,
    columns: &ColumnIndexMap,
    predicate: &BlankPredicate,
) -> (Table, FilterStats) {
    let kept: Vec<Row> = table
        .rows
        .iter()
        .filter(|row| !predicate.row_has_blank(row, columns))
        .cloned()
        .collect();

    let stats = FilterStats {
        rows_scanned: table.row_count(),
        rows_removed: table.row_count() - kept.len(),
        rows_kept: kept.len(),
    };

    (table.with_rows(kept), stats)
}
