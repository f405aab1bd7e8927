use crate::clusterer::create_message_types;
use crate::config::InferenceConfig;
use crate::engine::{AddressEngine, Engine, EngineContext, LengthEngine, collect_candidates};
use crate::error::InferenceError;
use crate::merger::{LabelSet, merge_common_ranges};
use crate::message::Message;
use crate::normalizer::{
    BitVector, SyncBoundaries, bitvectors_from_messages, participant_indices, quantize_boundaries,
};
use crate::preprocessor::{Boundaries, Preprocessor};
use crate::range::CommonRangeContainer;
use crate::retransform::retransform_message_types;
use crate::xor_matrix::XorMatrix;
use tracing::{debug, info};

/// Result of one inference run.
#[derive(Debug, Clone)]
pub struct Inference {
    pub label_set: LabelSet,
    pub message_types: Vec<CommonRangeContainer>,
}

/// Drives a full inference pass over a message corpus.
///
/// Construction runs the preprocessor and builds everything the engines need;
/// `infer` then goes normalize → detect → merge → cluster → resolve →
/// retransform. A pass either completes or returns an error, never a partial
/// layout.
pub struct FormatFinder {
    config: InferenceConfig,
    messages: Vec<Message>,
    boundaries: SyncBoundaries,
    bitvectors: Vec<BitVector>,
    xor_matrix: XorMatrix,
    participant_indices: Vec<usize>,
    engines: Vec<Box<dyn Engine>>,
    message_types: Vec<CommonRangeContainer>,
}

impl FormatFinder {
    /// Preprocesses `messages` and prepares bit vectors, the difference matrix
    /// and the engines enabled in `config`.
    pub fn new(
        messages: Vec<Message>,
        preprocessor: &dyn Preprocessor,
        config: InferenceConfig,
    ) -> Result<Self, InferenceError> {
        let boundaries = preprocessor.preprocess(&messages)?;
        let engines = default_engines(&config);
        let mut finder = Self {
            config,
            participant_indices: participant_indices(&messages),
            messages,
            boundaries: SyncBoundaries::default(),
            bitvectors: Vec::new(),
            xor_matrix: XorMatrix::default(),
            engines,
            message_types: Vec::new(),
        };
        finder.set_boundaries(boundaries)?;
        Ok(finder)
    }

    /// Replaces the configured engines.
    pub fn with_engines(mut self, engines: Vec<Box<dyn Engine>>) -> Self {
        self.engines = engines;
        self
    }

    /// Applies new raw boundaries and rebuilds the bit vectors and difference matrix.
    pub fn set_boundaries(&mut self, boundaries: Boundaries) -> Result<(), InferenceError> {
        if boundaries.preamble_ends.len() != self.messages.len() {
            return Err(InferenceError::BoundaryMismatch {
                what: "preamble_ends",
                expected: self.messages.len(),
                actual: boundaries.preamble_ends.len(),
            });
        }
        let quantized = quantize_boundaries(
            &boundaries.preamble_ends,
            boundaries.sync_length,
            self.config.shortest_field_length,
        )?;
        self.bitvectors = bitvectors_from_messages(&self.messages, &quantized.sync_ends)?;
        self.xor_matrix = XorMatrix::build(&self.bitvectors);
        self.boundaries = quantized;
        debug!(
            messages = self.messages.len(),
            sync_length = boundaries.sync_length,
            "boundaries applied"
        );
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn preamble_ends(&self) -> &[usize] {
        &self.boundaries.preamble_ends
    }

    pub fn sync_ends(&self) -> &[usize] {
        &self.boundaries.sync_ends
    }

    pub fn bitvectors(&self) -> &[BitVector] {
        &self.bitvectors
    }

    pub fn xor_matrix(&self) -> &XorMatrix {
        &self.xor_matrix
    }

    pub fn participant_indices(&self) -> &[usize] {
        &self.participant_indices
    }

    /// Message types of the last `perform_iteration`.
    pub fn message_types(&self) -> &[CommonRangeContainer] {
        &self.message_types
    }

    /// Runs a full pass with a fresh label set.
    pub fn infer(&self) -> Result<Inference, InferenceError> {
        let ctx = EngineContext::new(&self.bitvectors)
            .with_participants(&self.participant_indices)
            .with_xor_matrix(&self.xor_matrix);

        let candidates = collect_candidates(&self.engines, &ctx)?;
        let proposed = candidates.len();
        let label_set = LabelSet::new().with(merge_common_ranges(candidates));
        debug!(proposed, labels = label_set.len(), "merged candidate ranges");

        let clustered = create_message_types(&label_set, Some(self.messages.len()))?;
        let message_types = retransform_message_types(
            &clustered,
            &self.boundaries.preamble_ends,
            &self.boundaries.sync_ends,
        )?;
        verify_coverage(&message_types, self.messages.len())?;

        info!(
            messages = self.messages.len(),
            message_types = message_types.len(),
            "inference pass finished"
        );
        Ok(Inference {
            label_set,
            message_types,
        })
    }

    /// Runs `infer` and keeps the resulting message types.
    pub fn perform_iteration(&mut self) -> Result<&[CommonRangeContainer], InferenceError> {
        let inference = self.infer()?;
        self.message_types = inference.message_types;
        Ok(&self.message_types)
    }
}

fn default_engines(config: &InferenceConfig) -> Vec<Box<dyn Engine>> {
    let mut engines: Vec<Box<dyn Engine>> = Vec::new();
    if config.length_engine.enabled {
        engines.push(Box::new(
            LengthEngine::new(config.length_engine.n_gram_length)
                .with_min_score(config.length_engine.min_score)
                .with_min_messages_per_cluster(config.min_messages_per_cluster),
        ));
    }
    if config.address_engine.enabled {
        engines.push(Box::new(AddressEngine {
            n_gram_length: config.address_engine.n_gram_length,
            min_messages_per_cluster: config.min_messages_per_cluster,
        }));
    }
    engines
}

/// Every message index must be held by exactly one message type.
fn verify_coverage(
    message_types: &[CommonRangeContainer],
    num_messages: usize,
) -> Result<(), InferenceError> {
    let mut seen = vec![false; num_messages];
    for &i in message_types.iter().flat_map(|mt| mt.message_indices.iter()) {
        match seen.get_mut(i) {
            Some(true) => return Err(InferenceError::DuplicateMessage(i)),
            Some(slot) => *slot = true,
            None => return Err(InferenceError::UncoveredMessage(i)),
        }
    }
    match seen.iter().position(|covered| !covered) {
        Some(i) => Err(InferenceError::UncoveredMessage(i)),
        None => Ok(()),
    }
}
