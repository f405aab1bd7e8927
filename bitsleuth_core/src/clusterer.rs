use crate::error::InferenceError;
use crate::merger::LabelSet;
use crate::overlap::handle_overlapping_conflicts;
use crate::range::{CommonBitRange, CommonRangeContainer};
use tracing::debug;

/// Groups messages into message types by the exact set of labels covering them.
///
/// `num_messages` fixes the index space; when `None` it is the union of the
/// label set's indices. Messages no real range covers share the container
/// with an empty range set. Overlap conflicts are resolved on the result.
pub fn create_message_types(
    label_set: &LabelSet,
    num_messages: Option<usize>,
) -> Result<Vec<CommonRangeContainer>, InferenceError> {
    let message_indices: Vec<usize> = match num_messages {
        Some(n) => (0..n).collect(),
        None => label_set.message_indices().into_iter().collect(),
    };

    // at least one type per competing range of the most contested field type
    let min_types = label_set.max_ranges_per_field_type().max(1);
    let mut containers: Vec<CommonRangeContainer> = Vec::with_capacity(min_types);

    for i in message_indices {
        let mut labels: Vec<CommonBitRange> = label_set
            .ranges()
            .iter()
            .filter(|rng| rng.message_indices.contains(&i))
            .cloned()
            .collect();
        labels.sort_by(CommonBitRange::sort_cmp);

        match containers.iter_mut().find(|c| c.has_same_ranges(&labels)) {
            Some(container) => {
                container.message_indices.insert(i);
            }
            None => containers.push(CommonRangeContainer::new(labels, [i])),
        }
    }

    debug!(
        min_types,
        message_types = containers.len(),
        "clustered messages by label set"
    );
    handle_overlapping_conflicts(containers)
}
