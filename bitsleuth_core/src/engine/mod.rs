//! Field-detection engines and the adapter that runs them.

mod address;
mod length;

pub use address::AddressEngine;
pub use length::{DEFAULT_MIN_LENGTH_SCORE, LengthEngine};

use crate::error::InferenceError;
use crate::normalizer::BitVector;
use crate::range::CandidateRange;
use crate::xor_matrix::XorMatrix;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Default width, in bits, of the windows engines scan.
pub const DEFAULT_N_GRAM_LENGTH: usize = 8;

/// Smallest group of messages an engine draws a conclusion from.
pub const MIN_MESSAGES_PER_CLUSTER: usize = 2;

/// Defines errors an `Engine` can report.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine was configured with a zero-width window.
    #[error("n-gram length must be at least one bit")]
    InvalidNGramLength,
    /// The engine needs participant indices but the context has none.
    #[error("Participant indices required but not provided")]
    MissingParticipants,
    /// The context holds a participant index count that differs from the vector count.
    #[error("Got {actual} participant indices for {expected} messages")]
    ParticipantCountMismatch { expected: usize, actual: usize },
}

/// Everything an engine may look at during one pass. Read-only.
#[derive(Debug, Clone, Copy)]
pub struct EngineContext<'a> {
    pub bitvectors: &'a [BitVector],
    pub participant_indices: Option<&'a [usize]>,
    pub xor_matrix: Option<&'a XorMatrix>,
}

impl<'a> EngineContext<'a> {
    pub fn new(bitvectors: &'a [BitVector]) -> Self {
        Self {
            bitvectors,
            participant_indices: None,
            xor_matrix: None,
        }
    }

    /// Attaches per-message participant ranks, as built by `participant_indices`.
    pub fn with_participants(mut self, participant_indices: &'a [usize]) -> Self {
        self.participant_indices = Some(participant_indices);
        self
    }

    pub fn with_xor_matrix(mut self, xor_matrix: &'a XorMatrix) -> Self {
        self.xor_matrix = Some(xor_matrix);
        self
    }
}

/// A heuristic proposing candidate fields of one kind.
///
/// Implementations must be deterministic for a fixed context, and their scores
/// must share one scale because overlap resolution sums them across engines.
pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns proposed fields keyed by an engine-chosen label.
    fn find(
        &self,
        ctx: &EngineContext<'_>,
    ) -> Result<BTreeMap<String, CandidateRange>, EngineError>;
}

/// Runs every engine once, in order, and concatenates what they propose.
pub fn collect_candidates(
    engines: &[Box<dyn Engine>],
    ctx: &EngineContext<'_>,
) -> Result<Vec<CandidateRange>, InferenceError> {
    let mut candidates = Vec::new();
    for engine in engines {
        let found = engine.find(ctx).map_err(|source| InferenceError::Engine {
            engine: engine.name(),
            source,
        })?;
        debug!(engine = engine.name(), proposed = found.len(), "engine finished");
        candidates.extend(found.into_values());
    }
    Ok(candidates)
}

/// Reads `length` bits at `start`, or `None` if the vector is too short.
pub(crate) fn window(bits: &[u8], start: usize, length: usize) -> Option<&[u8]> {
    bits.get(start..start + length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::{CommonBitRange, EmptyRange, FieldType};

    struct FixedEngine {
        proposals: Vec<(&'static str, CandidateRange)>,
    }

    impl Engine for FixedEngine {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn find(
            &self,
            _ctx: &EngineContext<'_>,
        ) -> Result<BTreeMap<String, CandidateRange>, EngineError> {
            Ok(self
                .proposals
                .iter()
                .map(|(label, rng)| (label.to_string(), rng.clone()))
                .collect())
        }
    }

    struct FailingEngine;

    impl Engine for FailingEngine {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn find(
            &self,
            _ctx: &EngineContext<'_>,
        ) -> Result<BTreeMap<String, CandidateRange>, EngineError> {
            Err(EngineError::MissingParticipants)
        }
    }

    #[test]
    fn collects_from_every_engine_in_order() {
        let engines: Vec<Box<dyn Engine>> = vec![
            Box::new(FixedEngine {
                proposals: vec![
                    ("b", CommonBitRange::new(8, 8, FieldType::Length).into()),
                    ("a", CommonBitRange::new(0, 8, FieldType::Length).into()),
                ],
            }),
            Box::new(FixedEngine {
                proposals: vec![("c", EmptyRange::new(FieldType::Address, [0]).into())],
            }),
        ];
        let vectors = vec![vec![0u8; 16]];
        let candidates = collect_candidates(&engines, &EngineContext::new(&vectors)).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].as_real().map(|r| r.start), Some(0));
        assert_eq!(candidates[1].as_real().map(|r| r.start), Some(8));
        assert!(candidates[2].is_empty_range());
    }

    #[test]
    fn engine_failure_names_the_engine() {
        let engines: Vec<Box<dyn Engine>> = vec![Box::new(FailingEngine)];
        let vectors: Vec<BitVector> = Vec::new();
        let err = collect_candidates(&engines, &EngineContext::new(&vectors)).unwrap_err();
        assert!(matches!(err, InferenceError::Engine { engine: "failing", .. }));
    }

    #[test]
    fn window_checks_bounds() {
        let bits = [1, 0, 1, 1];
        assert_eq!(window(&bits, 1, 2), Some(&[0, 1][..]));
        assert_eq!(window(&bits, 2, 4), None);
    }
}
