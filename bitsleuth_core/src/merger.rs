use crate::range::{CandidateRange, CommonBitRange, EmptyRange, FieldType};
use std::collections::{BTreeMap, BTreeSet};

/// Collapses candidates that describe the same bits into one, pooling their evidence.
///
/// Real ranges merge on `(start, length)`, empty ranges on field type. The
/// first range seen stays as the representative; later duplicates only add
/// their values and message indices.
pub fn merge_common_ranges<T>(candidates: T) -> Vec<CandidateRange>
where
    T: IntoIterator<Item = CandidateRange>,
{
    let mut merged: Vec<CandidateRange> = Vec::new();
    for candidate in candidates {
        let same = merged.iter().position(|existing| match (existing, &candidate) {
            (CandidateRange::Real(a), CandidateRange::Real(b)) => a.same_position(b),
            (CandidateRange::Empty(a), CandidateRange::Empty(b)) => a.field_type == b.field_type,
            _ => false,
        });
        match same {
            Some(pos) => absorb_candidate(&mut merged[pos], candidate),
            None => merged.push(candidate),
        }
    }
    merged
}

fn absorb_candidate(existing: &mut CandidateRange, incoming: CandidateRange) {
    match (existing, incoming) {
        (CandidateRange::Real(existing), CandidateRange::Real(incoming)) => {
            absorb(existing, incoming)
        }
        (CandidateRange::Empty(existing), CandidateRange::Empty(incoming)) => {
            existing.message_indices.extend(incoming.message_indices)
        }
        _ => {}
    }
}

fn absorb(existing: &mut CommonBitRange, incoming: CommonBitRange) {
    existing.values.extend(incoming.values);
    existing.message_indices.extend(incoming.message_indices);
}

/// All labels discovered during one inference run.
///
/// Created empty at the start of a run and folded over the engines' merged
/// output; a label already present absorbs the evidence of a newcomer with the
/// same start, length and field type.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    ranges: Vec<CommonBitRange>,
    empties: Vec<EmptyRange>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate, merging it into an existing label when one matches.
    pub fn insert(&mut self, candidate: CandidateRange) {
        match candidate {
            CandidateRange::Real(rng) => {
                match self.ranges.iter_mut().find(|existing| existing.same_label(&rng)) {
                    Some(existing) => absorb(existing, rng),
                    None => self.ranges.push(rng),
                }
            }
            CandidateRange::Empty(empty) => {
                match self
                    .empties
                    .iter_mut()
                    .find(|existing| existing.field_type == empty.field_type)
                {
                    Some(existing) => existing.message_indices.extend(empty.message_indices),
                    None => self.empties.push(empty),
                }
            }
        }
    }

    pub fn extend<T: IntoIterator<Item = CandidateRange>>(&mut self, candidates: T) {
        for candidate in candidates {
            self.insert(candidate);
        }
    }

    /// Folding form of `extend`.
    pub fn with<T: IntoIterator<Item = CandidateRange>>(mut self, candidates: T) -> Self {
        self.extend(candidates);
        self
    }

    /// Non-empty ranges, in insertion order.
    pub fn ranges(&self) -> &[CommonBitRange] {
        &self.ranges
    }

    pub fn empty_ranges(&self) -> &[EmptyRange] {
        &self.empties
    }

    pub fn len(&self) -> usize {
        self.ranges.len() + self.empties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.empties.is_empty()
    }

    /// Every message index any label applies to.
    pub fn message_indices(&self) -> BTreeSet<usize> {
        self.ranges
            .iter()
            .flat_map(|rng| rng.message_indices.iter())
            .chain(self.empties.iter().flat_map(|e| e.message_indices.iter()))
            .copied()
            .collect()
    }

    /// Largest number of distinct real ranges sharing one field type.
    pub fn max_ranges_per_field_type(&self) -> usize {
        let mut counts: BTreeMap<&FieldType, usize> = BTreeMap::new();
        for rng in &self.ranges {
            *counts.entry(&rng.field_type).or_default() += 1;
        }
        counts.into_values().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(start: usize, length: usize, indices: &[usize]) -> CandidateRange {
        CommonBitRange::new(start, length, FieldType::Length)
            .with_score(1.0)
            .with_values(vec![vec![start as u8]])
            .with_message_indices(indices.iter().copied())
            .into()
    }

    #[test]
    fn merges_identical_positions() {
        let merged = merge_common_ranges(vec![
            real(0, 8, &[0, 1]),
            real(8, 8, &[2]),
            real(0, 8, &[3]),
        ]);
        assert_eq!(merged.len(), 2);
        let first = merged[0].as_real().unwrap();
        assert_eq!(first.message_indices, BTreeSet::from([0, 1, 3]));
        assert_eq!(first.values.len(), 2);
    }

    #[test]
    fn first_seen_stays_representative() {
        let address: CandidateRange = CommonBitRange::new(0, 8, FieldType::Address)
            .with_score(0.5)
            .with_message_indices([4])
            .into();
        let merged = merge_common_ranges(vec![real(0, 8, &[0]), address]);
        assert_eq!(merged.len(), 1);
        let rng = merged[0].as_real().unwrap();
        assert_eq!(rng.field_type, FieldType::Length);
        assert!((rng.score - 1.0).abs() < f64::EPSILON);
        assert!(rng.message_indices.contains(&4));
    }

    #[test]
    fn different_lengths_stay_distinct() {
        let merged = merge_common_ranges(vec![real(0, 8, &[0]), real(0, 16, &[1])]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_is_idempotent_without_duplicates() {
        let input = vec![
            real(0, 8, &[0]),
            real(8, 4, &[1]),
            EmptyRange::new(FieldType::Length, [2]).into(),
        ];
        assert_eq!(merge_common_ranges(input.clone()), input);
        let once = merge_common_ranges(vec![real(0, 8, &[0]), real(0, 8, &[1])]);
        assert_eq!(merge_common_ranges(once.clone()), once);
    }

    #[test]
    fn empty_ranges_merge_by_field_type() {
        let merged = merge_common_ranges(vec![
            EmptyRange::new(FieldType::Length, [0]).into(),
            real(0, 8, &[1]),
            EmptyRange::new(FieldType::Length, [2]).into(),
            EmptyRange::new(FieldType::Address, [3]).into(),
        ]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].message_indices(), &BTreeSet::from([0, 2]));
    }

    #[test]
    fn label_set_deduplicates_by_label() {
        let labels = LabelSet::new()
            .with(vec![real(0, 8, &[0]), real(8, 8, &[1])])
            .with(vec![real(0, 8, &[2]), EmptyRange::new(FieldType::Length, [3]).into()]);
        assert_eq!(labels.ranges().len(), 2);
        assert_eq!(labels.empty_ranges().len(), 1);
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.ranges()[0].message_indices, BTreeSet::from([0, 2]));
        assert_eq!(labels.message_indices(), BTreeSet::from([0, 1, 2, 3]));
        assert_eq!(labels.max_ranges_per_field_type(), 2);
        assert!(LabelSet::new().is_empty());
    }
}
