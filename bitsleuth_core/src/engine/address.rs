use super::{
    DEFAULT_N_GRAM_LENGTH, Engine, EngineContext, EngineError, MIN_MESSAGES_PER_CLUSTER, window,
};
use crate::range::{CandidateRange, CommonBitRange, FieldType};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Finds fields that identify who sent a message.
///
/// A window is an address window when its value never changes between the
/// messages of one participant but differs between every pair of
/// participants. Adjacent address windows are reported as one range.
#[derive(Debug, Clone)]
pub struct AddressEngine {
    pub n_gram_length: usize,
    pub min_messages_per_cluster: usize,
}

impl Default for AddressEngine {
    fn default() -> Self {
        Self {
            n_gram_length: DEFAULT_N_GRAM_LENGTH,
            min_messages_per_cluster: MIN_MESSAGES_PER_CLUSTER,
        }
    }
}

impl AddressEngine {
    pub fn new(n_gram_length: usize) -> Self {
        Self {
            n_gram_length,
            ..Self::default()
        }
    }

    /// The value the window holds in every member, or `None` if it varies.
    fn constant_value<'b>(
        &self,
        ctx: &EngineContext<'b>,
        members: &[usize],
        start: usize,
    ) -> Option<&'b [u8]> {
        let n = self.n_gram_length;
        let (&first, rest) = members.split_first()?;
        let reference = window(&ctx.bitvectors[first], start, n)?;
        let constant = match ctx.xor_matrix {
            Some(matrix) => rest.iter().all(|&i| {
                matrix
                    .get(first, i)
                    .and_then(|diff| window(diff, start, n))
                    .is_some_and(|diff| diff.iter().all(|&b| b == 0))
            }),
            None => rest
                .iter()
                .all(|&i| window(&ctx.bitvectors[i], start, n) == Some(reference)),
        };
        constant.then_some(reference)
    }
}

impl Engine for AddressEngine {
    fn name(&self) -> &'static str {
        "address"
    }

    fn find(
        &self,
        ctx: &EngineContext<'_>,
    ) -> Result<BTreeMap<String, CandidateRange>, EngineError> {
        let n = self.n_gram_length;
        if n == 0 {
            return Err(EngineError::InvalidNGramLength);
        }
        let participants = ctx
            .participant_indices
            .ok_or(EngineError::MissingParticipants)?;
        if participants.len() != ctx.bitvectors.len() {
            return Err(EngineError::ParticipantCountMismatch {
                expected: ctx.bitvectors.len(),
                actual: participants.len(),
            });
        }

        let mut by_participant: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &p) in participants.iter().enumerate() {
            by_participant.entry(p).or_default().push(i);
        }
        let groups: Vec<Vec<usize>> = by_participant
            .into_values()
            .filter(|members| members.len() >= self.min_messages_per_cluster.max(1))
            .collect();
        let mut result = BTreeMap::new();
        if groups.len() < 2 {
            debug!(participants = groups.len(), "too few participants for address detection");
            return Ok(result);
        }

        let members: BTreeSet<usize> = groups.iter().flatten().copied().collect();
        let common_len = members
            .iter()
            .map(|&i| ctx.bitvectors[i].len())
            .min()
            .unwrap_or(0);

        let mut address_windows = Vec::new();
        let mut start = 0;
        while start + n <= common_len {
            let values: Option<BTreeSet<&[u8]>> = groups
                .iter()
                .map(|group| self.constant_value(ctx, group, start))
                .collect();
            if values.is_some_and(|distinct| distinct.len() == groups.len()) {
                address_windows.push(start);
            }
            start += n;
        }

        let mut runs: Vec<(usize, usize)> = Vec::new();
        for start in address_windows {
            match runs.last_mut() {
                Some((run_start, run_len)) if *run_start + *run_len == start => *run_len += n,
                _ => runs.push((start, n)),
            }
        }

        for (k, (start, length)) in runs.into_iter().enumerate() {
            let values = members
                .iter()
                .filter_map(|&i| window(&ctx.bitvectors[i], start, length))
                .map(<[u8]>::to_vec)
                .collect();
            let rng = CommonBitRange::new(start, length, FieldType::Address)
                .with_score(1.0)
                .with_values(values)
                .with_message_indices(members.iter().copied());
            result.insert(format!("address_{k}"), rng.into());
        }
        Ok(result)
    }
}
