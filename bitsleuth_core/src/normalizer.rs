use crate::error::InferenceError;
use crate::message::Message;
use std::collections::BTreeMap;
use tracing::warn;

/// Bits of a message after its preamble and sync, one bit per byte.
pub type BitVector = Vec<u8>;

/// Per-message preamble and sync end offsets in original bit coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncBoundaries {
    pub preamble_ends: Vec<usize>,
    pub sync_ends: Vec<usize>,
}

impl SyncBoundaries {
    pub fn len(&self) -> usize {
        self.sync_ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sync_ends.is_empty()
    }
}

/// Derives `sync_end = preamble_end + sync_length` per message and rounds it
/// down to a multiple of `shortest_field_length`.
///
/// Rounding never moves a sync end later, since a late boundary could cut into
/// a real field. A preamble end left behind the rounded sync end is pulled back
/// to it.
pub fn quantize_boundaries(
    preamble_ends: &[usize],
    sync_length: usize,
    shortest_field_length: usize,
) -> Result<SyncBoundaries, InferenceError> {
    if shortest_field_length == 0 {
        return Err(InferenceError::InvalidFieldLength);
    }
    let n = shortest_field_length;
    let mut boundaries = SyncBoundaries {
        preamble_ends: Vec::with_capacity(preamble_ends.len()),
        sync_ends: Vec::with_capacity(preamble_ends.len()),
    };
    for &preamble_end in preamble_ends {
        let sync_end = n * ((preamble_end + sync_length) / n);
        boundaries.preamble_ends.push(preamble_end.min(sync_end));
        boundaries.sync_ends.push(sync_end);
    }
    Ok(boundaries)
}

/// Strips everything before each message's sync end.
///
/// A sync end past the end of a message yields an empty vector and a warning.
/// Fails when `sync_ends` does not hold one entry per message.
pub fn bitvectors_from_messages(
    messages: &[Message],
    sync_ends: &[usize],
) -> Result<Vec<BitVector>, InferenceError> {
    if messages.len() != sync_ends.len() {
        return Err(InferenceError::BoundaryMismatch {
            what: "sync_ends",
            expected: messages.len(),
            actual: sync_ends.len(),
        });
    }
    Ok(messages
        .iter()
        .zip(sync_ends)
        .enumerate()
        .map(|(i, (msg, &sync_end))| match msg.decoded_bits().get(sync_end..) {
            Some(bits) => bits.to_vec(),
            None => {
                warn!(
                    message = i,
                    sync_end,
                    len = msg.len(),
                    "sync end lies past the end of the message"
                );
                Vec::new()
            }
        })
        .collect())
}

/// Untrimmed bits grouped by participant.
pub fn bitvectors_by_participant(
    messages: &[Message],
) -> BTreeMap<Option<String>, Vec<BitVector>> {
    let mut result: BTreeMap<Option<String>, Vec<BitVector>> = BTreeMap::new();
    for msg in messages {
        result
            .entry(msg.participant().map(str::to_string))
            .or_default()
            .push(msg.decoded_bits().to_vec());
    }
    result
}

/// Maps each message's participant to its rank among the sorted, distinct participants.
pub fn participant_indices(messages: &[Message]) -> Vec<usize> {
    let mut participants: Vec<Option<&str>> = messages.iter().map(Message::participant).collect();
    participants.sort_unstable();
    participants.dedup();
    messages
        .iter()
        .map(|msg| {
            participants
                .binary_search(&msg.participant())
                .unwrap_or_default()
        })
        .collect()
}
