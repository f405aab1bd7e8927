use super::{
    DEFAULT_N_GRAM_LENGTH, Engine, EngineContext, EngineError, MIN_MESSAGES_PER_CLUSTER, window,
};
use crate::message::bits_to_value;
use crate::range::{CandidateRange, CommonBitRange, EmptyRange, FieldType};
use std::collections::BTreeMap;
use tracing::trace;

/// Fraction of a cluster a window must match to be reported as a length field.
pub const DEFAULT_MIN_LENGTH_SCORE: f64 = 0.8;

/// Finds a field whose value tracks the message length.
///
/// Messages are grouped by bit-vector length. Within a group every aligned
/// window is read as a big-endian number and compared against the symbol
/// count after the window and the symbol count of the whole vector, one
/// symbol being `n_gram_length` bits. The window matching the most messages
/// wins; ties go to the earliest window.
#[derive(Debug, Clone)]
pub struct LengthEngine {
    pub n_gram_length: usize,
    pub min_score: f64,
    pub min_messages_per_cluster: usize,
}

impl Default for LengthEngine {
    fn default() -> Self {
        Self {
            n_gram_length: DEFAULT_N_GRAM_LENGTH,
            min_score: DEFAULT_MIN_LENGTH_SCORE,
            min_messages_per_cluster: MIN_MESSAGES_PER_CLUSTER,
        }
    }
}

impl LengthEngine {
    pub fn new(n_gram_length: usize) -> Self {
        Self {
            n_gram_length,
            ..Self::default()
        }
    }

    /// Sets the score below which a cluster gets an empty range instead.
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_min_messages_per_cluster(mut self, min_messages: usize) -> Self {
        self.min_messages_per_cluster = min_messages;
        self
    }

    /// Fraction of `members` whose window at `start` equals one of the length targets.
    fn score_window(
        &self,
        ctx: &EngineContext<'_>,
        members: &[usize],
        bit_len: usize,
        start: usize,
    ) -> f64 {
        let n = self.n_gram_length;
        let remaining = (bit_len - start - n) / n;
        let total = bit_len / n;
        let mut matches_remaining = 0usize;
        let mut matches_total = 0usize;
        for &i in members {
            let Some(bits) = window(&ctx.bitvectors[i], start, n) else {
                continue;
            };
            let value = bits_to_value(bits);
            if remaining > 0 && value == remaining as u64 {
                matches_remaining += 1;
            }
            if value == total as u64 {
                matches_total += 1;
            }
        }
        matches_remaining.max(matches_total) as f64 / members.len() as f64
    }

    fn best_window(
        &self,
        ctx: &EngineContext<'_>,
        members: &[usize],
        bit_len: usize,
    ) -> Option<(usize, f64)> {
        let n = self.n_gram_length;
        let mut best: Option<(usize, f64)> = None;
        let mut start = 0;
        while start + n <= bit_len {
            let score = self.score_window(ctx, members, bit_len, start);
            trace!(bit_len, start, score, "length window scored");
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((start, score));
            }
            start += n;
        }
        best
    }
}

impl Engine for LengthEngine {
    fn name(&self) -> &'static str {
        "length"
    }

    fn find(
        &self,
        ctx: &EngineContext<'_>,
    ) -> Result<BTreeMap<String, CandidateRange>, EngineError> {
        if self.n_gram_length == 0 {
            return Err(EngineError::InvalidNGramLength);
        }

        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, bits) in ctx.bitvectors.iter().enumerate() {
            clusters.entry(bits.len()).or_default().push(i);
        }

        let mut result = BTreeMap::new();
        for (bit_len, members) in clusters {
            if members.len() < self.min_messages_per_cluster {
                continue;
            }
            let label = format!("length_{bit_len}");
            let candidate = match self.best_window(ctx, &members, bit_len) {
                Some((start, score)) if score >= self.min_score => {
                    let values = members
                        .iter()
                        .filter_map(|&i| window(&ctx.bitvectors[i], start, self.n_gram_length))
                        .map(<[u8]>::to_vec)
                        .collect();
                    CommonBitRange::new(start, self.n_gram_length, FieldType::Length)
                        .with_score(score)
                        .with_values(values)
                        .with_message_indices(members)
                        .into()
                }
                _ => EmptyRange::new(FieldType::Length, members).into(),
            };
            result.insert(label, candidate);
        }
        Ok(result)
    }
}
