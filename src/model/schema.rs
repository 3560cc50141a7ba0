//! Column metadata

/// Column metadata taken from the header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name exactly as it appears in the header
    pub name: String,
    /// Column index (0-based position)
    pub index: usize,
}

impl Column {
    /// Create a new column with name and index
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Build columns from a list of header names
    pub fn from_names<I, S>(names: I) -> Vec<Column>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column::new(name, i))
            .collect()
    }
}
