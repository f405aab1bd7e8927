use thiserror::Error;

/// Failures of an inference pass.
///
/// Apart from the wrapped collaborator errors these are invariant violations:
/// the pass stops instead of reporting a layout that cannot be trusted.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Two per-message boundary arrays have different lengths.
    #[error("Boundary arrays disagree: {what} has {actual} entries, expected {expected}")]
    BoundaryMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// `shortest_field_length` was zero.
    #[error("Shortest field length must be at least one bit")]
    InvalidFieldLength,

    /// A message ended up in no message type.
    #[error("Message {0} is not covered by any message type")]
    UncoveredMessage(usize),

    /// A message ended up in more than one message type.
    #[error("Message {0} is assigned to more than one message type")]
    DuplicateMessage(usize),

    /// Overlap resolution found no solution for a non-empty partition.
    #[error("Overlap partition starting at bit {start} produced no candidate solution")]
    EmptyOverlapPartition { start: usize },

    /// The preprocessor rejected the messages.
    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] crate::preprocessor::PreprocessError),

    /// A detection engine failed; `engine` is its name.
    #[error("Engine '{engine}' failed: {source}")]
    Engine {
        engine: &'static str,
        #[source]
        source: crate::engine::EngineError,
    },
}
