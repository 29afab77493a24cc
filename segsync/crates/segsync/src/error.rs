//! Error Module - Segsync Error Types
//!
//! Defines the error types used by the primitives.
//!
//! The primitives themselves never fail during normal operation: acquire,
//! release and arrive are correct by construction once a segment exists.
//! Errors only come from setting things up.
//!
//! # Error Categories
//!
//! ## Environment Errors
//! - `Unsupported` - Host has no 32-bit atomics or the requested wait strategy
//!
//! ## Layout Errors
//! - `InvalidLayout` - Segment length does not match the primitive
//! - `SlotOutOfBounds` - Slot index outside the segment
//! - `InvalidParticipant` - Barrier participant index outside `0..TOTAL`
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for all segsync operations
///
/// # Examples
///
/// ```rust
/// use segsync::error::SyncError;
///
/// fn describe(err: &SyncError) -> &'static str {
///     match err {
///         SyncError::Unsupported(_) => "environment",
///         SyncError::InvalidLayout { .. } | SyncError::SlotOutOfBounds { .. } => "layout",
///         _ => "other",
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum SyncError {
    /// The host cannot run the primitives at all
    ///
    /// **When returned:** No native 32-bit atomics, or a wait strategy that is
    /// not available on this platform.
    ///
    /// **Recovery strategy:** None. A non-atomic fallback is exactly the buggy
    /// behavior the counter demo contrasts against.
    #[error("Unsupported shared-memory environment: {0}")]
    Unsupported(String),

    /// Segment has the wrong number of slots for the primitive
    #[error("Invalid segment layout: expected {expected} slots, got {actual}")]
    InvalidLayout { expected: usize, actual: usize },

    /// Slot index outside the segment
    #[error("Slot {index} out of bounds for segment of {length} slots")]
    SlotOutOfBounds { index: usize, length: usize },

    /// Barrier participant index outside `0..total`
    #[error("Participant {index} out of range for barrier of {total} participants")]
    InvalidParticipant { index: usize, total: usize },

    /// Configuration error
    ///
    /// **Example scenarios:**
    /// - Zero participants for a barrier
    /// - Zero spin limit with the spin-then-park strategy
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl SyncError {
    /// Check if this error indicates a bug in the caller's wiring
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidLayout { .. }
                | SyncError::SlotOutOfBounds { .. }
                | SyncError::InvalidParticipant { .. }
        )
    }
}

/// Result type alias for segsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_error_display() {
        let err = SyncError::InvalidLayout {
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Invalid segment layout: expected 4 slots, got 3"
        );
        assert!(err.is_bug());
    }

    #[test]
    fn test_unsupported_is_not_bug() {
        let err = SyncError::Unsupported("no futex".to_string());
        assert!(!err.is_bug());
        assert!(err.to_string().contains("no futex"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: SyncError = ConfigError::InvalidSpinLimit("must be > 0".to_string()).into();
        assert!(matches!(err, SyncError::Configuration(_)));
    }
}
