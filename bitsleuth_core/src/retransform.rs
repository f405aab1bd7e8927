use crate::error::InferenceError;
use crate::range::{CommonBitRange, CommonRangeContainer, FieldType};
use tracing::debug;

/// Maps message types back into original message coordinates.
///
/// Each message gets its own copy of its type with ranges moved past its sync
/// end, plus `Preamble` and `Sync` ranges. Both are always present, even with
/// zero length.
/// Copies whose ranges match are merged again, so messages end up in
/// different types when only their preamble or sync lengths differ.
pub fn retransform_message_types(
    message_types: &[CommonRangeContainer],
    preamble_ends: &[usize],
    sync_ends: &[usize],
) -> Result<Vec<CommonRangeContainer>, InferenceError> {
    if preamble_ends.len() != sync_ends.len() {
        return Err(InferenceError::BoundaryMismatch {
            what: "preamble_ends",
            expected: sync_ends.len(),
            actual: preamble_ends.len(),
        });
    }

    let empty = CommonRangeContainer::default();
    let mut result: Vec<CommonRangeContainer> = Vec::new();
    for (i, (&preamble_end, &sync_end)) in preamble_ends.iter().zip(sync_ends).enumerate() {
        let source = message_types
            .iter()
            .find(|mt| mt.message_indices.contains(&i))
            .unwrap_or(&empty);
        let mut mt = source.narrowed_and_shifted(i, sync_end);
        mt.add_ranges(synthetic_ranges(i, preamble_end, sync_end));

        match result.iter_mut().find(|m| m.has_same_ranges(mt.ranges())) {
            Some(existing) => existing.add_message(i),
            None => result.push(mt),
        }
    }
    debug!(
        before = message_types.len(),
        after = result.len(),
        "retransformed message types"
    );
    Ok(result)
}

fn synthetic_ranges(index: usize, preamble_end: usize, sync_end: usize) -> Vec<CommonBitRange> {
    let preamble = CommonBitRange::new(0, preamble_end, FieldType::Preamble);
    let sync = CommonBitRange::new(
        preamble_end,
        sync_end.saturating_sub(preamble_end),
        FieldType::Sync,
    );
    [preamble, sync]
        .into_iter()
        .map(|rng| rng.with_message_indices([index]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn length(start: usize, len: usize, indices: &[usize]) -> CommonBitRange {
        CommonBitRange::new(start, len, FieldType::Length)
            .with_score(1.0)
            .with_message_indices(indices.iter().copied())
    }

    fn layout(container: &CommonRangeContainer) -> Vec<(FieldType, usize, usize)> {
        container
            .iter()
            .map(|r| (r.field_type.clone(), r.start, r.length))
            .collect()
    }

    #[test]
    fn shifts_by_sync_end_and_adds_preamble_and_sync() {
        let types = vec![CommonRangeContainer::new(vec![length(0, 8, &[0])], [0])];
        let result = retransform_message_types(&types, &[4], &[12]).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            layout(&result[0]),
            vec![
                (FieldType::Preamble, 0, 4),
                (FieldType::Sync, 4, 8),
                (FieldType::Length, 12, 8),
            ]
        );
        assert_eq!(types[0].ranges()[0].start, 0, "input is not mutated");
    }

    #[test]
    fn identical_layouts_merge_again() {
        let types = vec![CommonRangeContainer::new(vec![length(0, 8, &[0, 1, 2])], [0, 1, 2])];
        let result = retransform_message_types(&types, &[8, 8, 8], &[24, 24, 24]).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].message_indices, BTreeSet::from([0, 1, 2]));
        let preamble = result[0].range_of_type(&FieldType::Preamble).unwrap();
        assert_eq!(preamble.message_indices, BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn different_sync_ends_split_a_type() {
        let types = vec![CommonRangeContainer::new(vec![length(0, 8, &[0, 1, 2])], [0, 1, 2])];
        let result = retransform_message_types(&types, &[8, 16, 8], &[24, 32, 24]).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].message_indices, BTreeSet::from([0, 2]));
        assert_eq!(result[1].message_indices, BTreeSet::from([1]));
        assert_eq!(result[1].range_of_type(&FieldType::Length).unwrap().start, 32);
        for mt in &result {
            for rng in mt {
                assert!(
                    rng.message_indices.is_subset(&mt.message_indices),
                    "{rng} claims {:?} outside its type {:?}",
                    rng.message_indices,
                    mt.message_indices
                );
            }
        }
        let length = result[0].range_of_type(&FieldType::Length).unwrap();
        assert_eq!(length.message_indices, BTreeSet::from([0, 2]));
    }

    #[test]
    fn messages_without_a_type_still_get_one() {
        let result = retransform_message_types(&[], &[8, 0], &[16, 0]).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            layout(&result[0]),
            vec![(FieldType::Preamble, 0, 8), (FieldType::Sync, 8, 8)]
        );
        assert_eq!(
            layout(&result[1]),
            vec![(FieldType::Preamble, 0, 0), (FieldType::Sync, 0, 0)],
            "zero-length preamble and sync are kept"
        );
        assert_eq!(result[1].message_indices, BTreeSet::from([1]));
        assert!(!result[1].ranges_overlap());
    }

    #[test]
    fn missing_preamble_keeps_empty_preamble_range() {
        let types = vec![CommonRangeContainer::new(vec![length(0, 8, &[0])], [0])];
        let result = retransform_message_types(&types, &[0], &[8]).unwrap();
        assert_eq!(
            layout(&result[0]),
            vec![
                (FieldType::Preamble, 0, 0),
                (FieldType::Sync, 0, 8),
                (FieldType::Length, 8, 8),
            ]
        );
    }

    #[test]
    fn mismatched_boundaries_are_rejected() {
        assert!(matches!(
            retransform_message_types(&[], &[0, 0], &[0]),
            Err(InferenceError::BoundaryMismatch { .. })
        ));
    }
}
