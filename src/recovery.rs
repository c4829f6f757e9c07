//! Tolerance policy for malformed input.
//!
//! Decoders report every structural defect to a [`RecoveryContext`]. In
//! [`RecoveryMode::Strict`] the defect becomes the returned error; in
//! [`RecoveryMode::Lenient`] it is logged, remembered, and decoding carries on
//! with the documented repair.
//!
//! Some defects are fatal in both modes because no sensible repair exists:
//! non-digit leader counters, directory entries with non-digit lengths or
//! offsets, fields pointing outside the record, and XML that is not
//! well-formed. Decoders return those errors directly instead of going
//! through the context.

use crate::error::{MarcError, Result};
use tracing::warn;

/// Strategy for handling malformed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Return an error for any structural defect (default)
    #[default]
    Strict,
    /// Repair recoverable defects, log a warning, and keep the record
    Lenient,
}

/// Collects the repairs made while decoding.
#[derive(Debug, Default)]
pub struct RecoveryContext {
    mode: RecoveryMode,
    messages: Vec<String>,
}

impl RecoveryContext {
    /// Create a new recovery context with the given mode
    #[must_use]
    pub fn new(mode: RecoveryMode) -> Self {
        RecoveryContext {
            mode,
            messages: Vec::new(),
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> RecoveryMode {
        self.mode
    }

    /// Report a recoverable defect.
    ///
    /// # Errors
    ///
    /// Returns `error` unchanged in strict mode.
    pub fn tolerate(&mut self, error: MarcError) -> Result<()> {
        match self.mode {
            RecoveryMode::Strict => Err(error),
            RecoveryMode::Lenient => {
                warn!(%error, "recovered from malformed input");
                self.messages.push(error.to_string());
                Ok(())
            },
        }
    }

    /// Repairs made so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Whether any repair was needed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Forget previous repairs, keeping the mode.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
