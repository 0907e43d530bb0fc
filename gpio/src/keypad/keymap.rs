use thiserror::Error;

/// The reserved key code meaning "no key".
pub const NO_KEY: u8 = 0;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum KeymapError {
    #[error("keymap has no keys")]
    Empty,
    #[error("row {row} has {actual} keys, expected {expected}")]
    Ragged { row: usize, expected: usize, actual: usize },
    #[error("key at row {row}, column {col} uses the reserved code 0")]
    ReservedKey { row: usize, col: usize },
    #[error("row {row} is not ASCII")]
    NotAscii { row: usize },
}

/// Maps keypad matrix positions to the byte reported for them.
///
/// Indexed `[row][col]`. Every entry is a non-zero byte, see [NO_KEY].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Keymap {
    rows: usize,
    cols: usize,
    keys: Vec<u8>,
}

impl Keymap {
    /// Creates a keymap from a table of rows.
    ///
    /// # Errors
    /// - [KeymapError::Empty] if there are no rows or the rows are empty.
    /// - [KeymapError::Ragged] if the rows have different lengths.
    /// - [KeymapError::ReservedKey] if any entry is [NO_KEY].
    pub fn new(table: Vec<Vec<u8>>) -> Result<Self, KeymapError> {
        let rows = table.len();
        let cols = table.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return Err(KeymapError::Empty);
        }

        let mut keys = Vec::with_capacity(rows * cols);
        for (row, entries) in table.into_iter().enumerate() {
            if entries.len() != cols {
                return Err(KeymapError::Ragged { row, expected: cols, actual: entries.len() });
            }
            if let Some(col) = entries.iter().position(|&key| key == NO_KEY) {
                return Err(KeymapError::ReservedKey { row, col });
            }
            keys.extend(entries);
        }

        Ok(Keymap { rows, cols, keys })
    }

    pub fn from_rows<const R: usize, const C: usize>(table: &[[u8; C]; R]) -> Result<Self, KeymapError> {
        Self::new(table.iter().map(|row| row.to_vec()).collect())
    }

    /// Creates a keymap from one ASCII string per row, e.g. `["123", "456"]`.
    pub fn from_strs<S: AsRef<str>>(table: &[S]) -> Result<Self, KeymapError> {
        let mut rows = Vec::with_capacity(table.len());
        for (row, s) in table.iter().enumerate() {
            let s = s.as_ref();
            if !s.is_ascii() {
                return Err(KeymapError::NotAscii { row });
            }
            rows.push(s.as_bytes().to_vec());
        }
        Self::new(rows)
    }

    /// The usual 4x4 membrane keypad layout.
    pub fn telephone_4x4() -> Self {
        Keymap {
            rows: 4,
            cols: 4,
            keys: b"123A456B789C*0#D".to_vec(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Gets the key at the given position, if it is within the keymap.
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        if row < self.rows && col < self.cols {
            Some(self.keys[row * self.cols + col])
        } else {
            None
        }
    }

    /// Finds the first `(row, col)` position mapped to the key.
    pub fn position(&self, key: u8) -> Option<(usize, usize)> {
        self.keys
            .iter()
            .position(|&k| k == key)
            .map(|i| (i / self.cols, i % self.cols))
    }
}
