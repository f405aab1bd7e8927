use crate::message::Message;
use thiserror::Error;
use tracing::debug;

/// Shortest alternating run accepted as a preamble, in bits.
pub const DEFAULT_MIN_PREAMBLE_LENGTH: usize = 8;
/// Longest sync word the pattern preprocessor reports, in bits.
pub const DEFAULT_MAX_SYNC_LENGTH: usize = 32;

/// Defines errors a `Preprocessor` can report.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// A fixed boundary list does not have one entry per message.
    #[error("Expected {expected} preamble ends, got {actual}")]
    PreambleCountMismatch { expected: usize, actual: usize },
    /// Heuristic detection needs at least one message.
    #[error("Cannot preprocess an empty message list")]
    NoMessages,
}

/// Raw preamble/sync boundaries as reported by a `Preprocessor`, before quantization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Boundaries {
    pub preamble_ends: Vec<usize>,
    pub sync_length: usize,
}

/// Locates where the preamble ends in each message and how long the shared sync word is.
pub trait Preprocessor {
    fn preprocess(&self, messages: &[Message]) -> Result<Boundaries, PreprocessError>;
}

/// Boundaries known in advance, e.g. from a protocol description or a GUI selection.
#[derive(Debug, Clone, Default)]
pub struct FixedBoundaries {
    pub preamble_ends: Vec<usize>,
    pub sync_length: usize,
}

impl FixedBoundaries {
    pub fn new(preamble_ends: Vec<usize>, sync_length: usize) -> Self {
        Self {
            preamble_ends,
            sync_length,
        }
    }

    /// Same preamble end for every message.
    pub fn uniform(num_messages: usize, preamble_end: usize, sync_length: usize) -> Self {
        Self::new(vec![preamble_end; num_messages], sync_length)
    }
}

impl Preprocessor for FixedBoundaries {
    fn preprocess(&self, messages: &[Message]) -> Result<Boundaries, PreprocessError> {
        if self.preamble_ends.len() != messages.len() {
            return Err(PreprocessError::PreambleCountMismatch {
                expected: messages.len(),
                actual: self.preamble_ends.len(),
            });
        }
        Ok(Boundaries {
            preamble_ends: self.preamble_ends.clone(),
            sync_length: self.sync_length,
        })
    }
}

/// Heuristic boundary detector.
///
/// The preamble is the leading run of alternating bits (`1010…` or `0101…`),
/// truncated to an even length; runs shorter than `min_preamble_length` count
/// as no preamble. The sync is the longest prefix that every message shares
/// right after its preamble, truncated to whole nibbles and capped at
/// `max_sync_length`.
#[derive(Debug, Clone)]
pub struct PatternPreprocessor {
    pub min_preamble_length: usize,
    pub max_sync_length: usize,
}

impl Default for PatternPreprocessor {
    fn default() -> Self {
        Self {
            min_preamble_length: DEFAULT_MIN_PREAMBLE_LENGTH,
            max_sync_length: DEFAULT_MAX_SYNC_LENGTH,
        }
    }
}

impl PatternPreprocessor {
    pub fn new(min_preamble_length: usize, max_sync_length: usize) -> Self {
        Self {
            min_preamble_length,
            max_sync_length,
        }
    }

    fn preamble_end(&self, bits: &[u8]) -> usize {
        let run = 1 + bits.windows(2).take_while(|w| w[0] != w[1]).count();
        let run = if bits.is_empty() { 0 } else { run.min(bits.len()) };
        let even = run - run % 2;
        if even >= self.min_preamble_length.max(2) {
            even
        } else {
            0
        }
    }
}

impl Preprocessor for PatternPreprocessor {
    fn preprocess(&self, messages: &[Message]) -> Result<Boundaries, PreprocessError> {
        let (first, rest) = messages.split_first().ok_or(PreprocessError::NoMessages)?;

        let preamble_ends: Vec<usize> = messages
            .iter()
            .map(|msg| self.preamble_end(msg.decoded_bits()))
            .collect();

        let reference = &first.decoded_bits()[preamble_ends[0]..];
        let common = rest
            .iter()
            .zip(&preamble_ends[1..])
            .map(|(msg, &pe)| {
                reference
                    .iter()
                    .zip(&msg.decoded_bits()[pe..])
                    .take_while(|(a, b)| a == b)
                    .count()
            })
            .min()
            .unwrap_or(0);
        let common = common.min(self.max_sync_length);
        let sync_length = common - common % 4;

        debug!(
            messages = messages.len(),
            sync_length, "pattern preprocessor finished"
        );
        Ok(Boundaries {
            preamble_ends,
            sync_length,
        })
    }
}
