//! Receive buffer for the AMI byte stream

use crate::{
    constants::{BUF_CHUNK, MAX_BUFFER_SIZE},
    error::{AmiError, AmiResult},
};

/// Growable byte buffer with a read cursor.
///
/// Consumed bytes stay in place until [`compact`](Self::compact) shifts the
/// unread tail to the front. A failed pattern search remembers how far it got,
/// so a record arriving in many small reads is scanned once.
pub(crate) struct AmiBuffer {
    data: Vec<u8>,
    position: usize,
    /// Unread bytes already searched for `scanned_for` without a match.
    scanned: usize,
    scanned_for: Vec<u8>,
}

impl AmiBuffer {
    pub(crate) fn new() -> Self {
        Self {
            data: Vec::with_capacity(BUF_CHUNK),
            position: 0,
            scanned: 0,
            scanned_for: Vec::new(),
        }
    }

    /// Unread bytes.
    pub(crate) fn data(&self) -> &[u8] {
        &self.data[self.position..]
    }

    pub(crate) fn len(&self) -> usize {
        self.data
            .len()
            - self.position
    }

    pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
        if self
            .data
            .capacity()
            - self
                .data
                .len()
            < bytes.len()
        {
            self.data
                .reserve(bytes.len().max(BUF_CHUNK));
        }
        self.data
            .extend_from_slice(bytes);
    }

    pub(crate) fn check_size_limits(&self) -> AmiResult<()> {
        if self.len() > MAX_BUFFER_SIZE {
            return Err(AmiError::protocol_error(format!(
                "Buffer size {} exceeds limit {}",
                self.len(),
                MAX_BUFFER_SIZE
            )));
        }
        Ok(())
    }

    /// Remove and return everything before `pattern`, consuming the pattern too.
    pub(crate) fn extract_until_pattern(&mut self, pattern: &[u8]) -> Option<Vec<u8>> {
        if pattern.is_empty() {
            return None;
        }
        if self.scanned_for != pattern {
            self.scanned = 0;
            self.scanned_for = pattern.to_vec();
        }

        // a match may straddle the end of the previous scan
        let from = self
            .scanned
            .saturating_sub(pattern.len() - 1);
        let Some(offset) = self.data()[from..]
            .windows(pattern.len())
            .position(|window| window == pattern)
        else {
            self.scanned = self.len();
            return None;
        };

        let pos = from + offset;
        let start = self.position;
        let extracted = self.data[start..start + pos].to_vec();
        self.position += pos + pattern.len();
        self.scanned = 0;
        Some(extracted)
    }

    pub(crate) fn compact(&mut self) {
        if self.position == 0 {
            return;
        }
        self.data
            .drain(..self.position);
        self.position = 0;
    }
}
