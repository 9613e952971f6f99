//! Error types reported by item handles and by layout passes.

use thiserror::Error;

use crate::item::ItemKey;

/// Why an item could not be measured.
///
/// Measurement errors never abort a pass: the item is skipped for that pass
/// and every other item is still placed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasurementError {
    /// The handle has no backing element (not mounted yet, or already torn
    /// down by the host).
    #[error("item {0:?} has no backing element")]
    Detached(ItemKey),
    /// The host reported a NaN or infinite size.
    #[error("item {0:?} reported a non-finite size")]
    NonFinite(ItemKey),
}

/// The stage of a pass in which a user callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// The filter predicate, runtime filter or search conditions.
    Filter,
    /// The sort comparator.
    Sort,
    /// Measuring or writing item styles.
    Apply,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Filter => "filter",
            Self::Sort => "sort",
            Self::Apply => "apply",
        };
        f.write_str(name)
    }
}

/// Errors delivered through [`MasonryEvent::Error`](crate::MasonryEvent::Error).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MasonryError {
    /// A user supplied callback panicked. The pass was aborted and the engine
    /// returned to idle.
    #[error("{stage} callback panicked: {message}")]
    CallbackPanicked {
        /// Where the panic happened.
        stage: PipelineStage,
        /// The panic payload, when it was a string.
        message: String,
    },
}

impl MasonryError {
    pub(crate) fn from_panic(stage: PipelineStage, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::CallbackPanicked { stage, message }
    }
}
