//! Word-stream state persistence.
//!
//! Every stateful component writes its fields as a fixed sequence of `u32`
//! words and reads them back in the identical order.

use thiserror::Error;

/// Stable snapshot wire-version identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u32)]
pub enum SnapshotVersion {
    /// Initial word layout.
    V1 = 1,
}

impl SnapshotVersion {
    /// Converts a wire value to a known snapshot version.
    #[must_use]
    pub const fn from_u32(version: u32) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            _ => None,
        }
    }
}

/// Failures while restoring a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SnapshotError {
    /// Stream ended before every field was read.
    #[error("snapshot truncated at word {position}")]
    Truncated {
        /// Index of the missing word.
        position: usize,
    },
    /// Version word names no known layout.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    /// A field holds a value the component cannot accept.
    #[error("snapshot field `{field}` holds invalid value {value:#x}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u32,
    },
    /// Words remain after the last field.
    #[error("{0} unexpected trailing snapshot words")]
    TrailingWords(usize),
}

/// Append-only sink for snapshot words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateWriter {
    words: Vec<u32>,
}

impl StateWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Appends one word.
    pub fn write(&mut self, word: u32) {
        self.words.push(word);
    }

    /// Appends a slice of words in order.
    pub fn write_all(&mut self, words: &[u32]) {
        self.words.extend_from_slice(words);
    }

    /// Appends a 64-bit value as low word then high word.
    pub fn write_u64(&mut self, value: u64) {
        self.write(value as u32);
        self.write((value >> 32) as u32);
    }

    /// Appends a boolean as `0` or `1`.
    pub fn write_bool(&mut self, value: bool) {
        self.write(u32::from(value));
    }

    /// Returns the words written so far.
    #[must_use]
    pub fn as_words(&self) -> &[u32] {
        &self.words
    }

    /// Consumes the writer and returns its words.
    #[must_use]
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }
}

/// Cursor over a snapshot word stream.
#[derive(Debug, Clone)]
pub struct StateReader<'a> {
    words: &'a [u32],
    position: usize,
}

impl<'a> StateReader<'a> {
    /// Starts reading at the first word.
    #[must_use]
    pub const fn new(words: &'a [u32]) -> Self {
        Self { words, position: 0 }
    }

    /// Reads the next word.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Truncated`] when the stream is exhausted.
    pub fn read(&mut self) -> Result<u32, SnapshotError> {
        let word = self
            .words
            .get(self.position)
            .copied()
            .ok_or(SnapshotError::Truncated {
                position: self.position,
            })?;
        self.position += 1;
        Ok(word)
    }

    /// Fills `out` from consecutive words.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Truncated`] when the stream is exhausted.
    pub fn read_into(&mut self, out: &mut [u32]) -> Result<(), SnapshotError> {
        for slot in out {
            *slot = self.read()?;
        }
        Ok(())
    }

    /// Reads a 64-bit value written by [`StateWriter::write_u64`].
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Truncated`] when the stream is exhausted.
    pub fn read_u64(&mut self) -> Result<u64, SnapshotError> {
        let low = u64::from(self.read()?);
        let high = u64::from(self.read()?);
        Ok(low | (high << 32))
    }

    /// Reads a boolean written by [`StateWriter::write_bool`].
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::InvalidField`] for words other than `0`/`1`.
    pub fn read_bool(&mut self, field: &'static str) -> Result<bool, SnapshotError> {
        match self.read()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(SnapshotError::InvalidField { field, value }),
        }
    }

    /// Number of unread words.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.words.len() - self.position
    }

    /// Verifies that every word was consumed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::TrailingWords`] when words remain.
    pub const fn finish(&self) -> Result<(), SnapshotError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(SnapshotError::TrailingWords(extra)),
        }
    }
}

/// State that can be saved to and restored from a word stream.
pub trait Persist {
    /// Appends every mutable field in a fixed order.
    fn save_state(&self, writer: &mut StateWriter);

    /// Restores fields in the order [`Persist::save_state`] wrote them.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] when the stream is short or malformed.
    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), SnapshotError>;
}
