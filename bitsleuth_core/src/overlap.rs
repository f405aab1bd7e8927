use crate::error::InferenceError;
use crate::range::{CommonBitRange, CommonRangeContainer};
use tracing::debug;

/// Resolves overlap conflicts in every container that has any.
pub fn handle_overlapping_conflicts(
    containers: Vec<CommonRangeContainer>,
) -> Result<Vec<CommonRangeContainer>, InferenceError> {
    containers
        .into_iter()
        .map(|container| {
            if container.ranges_overlap() {
                resolve_container(container)
            } else {
                Ok(container)
            }
        })
        .collect()
}

/// Splits sorted ranges into runs where each range overlaps the previous one.
///
/// Only the last range of a run is compared, so a range overlapping an earlier
/// member but not the last one starts a new run.
pub fn partition_overlapping(ranges: &[CommonBitRange]) -> Vec<&[CommonBitRange]> {
    let mut partitions = Vec::new();
    let mut run_start = 0;
    for i in 1..ranges.len() {
        if !ranges[i].overlaps_with(&ranges[i - 1]) {
            partitions.push(&ranges[run_start..i]);
            run_start = i;
        }
    }
    if !ranges.is_empty() {
        partitions.push(&ranges[run_start..]);
    }
    partitions
}

/// Candidate solutions of one partition: each range plus every later range not overlapping it.
pub fn candidate_solutions(partition: &[CommonBitRange]) -> Vec<Vec<&CommonBitRange>> {
    partition
        .iter()
        .enumerate()
        .map(|(i, anchor)| {
            std::iter::once(anchor)
                .chain(partition[i + 1..].iter().filter(|r| !anchor.overlaps_with(r)))
                .collect()
        })
        .collect()
}

fn total_score(solution: &[&CommonBitRange]) -> f64 {
    solution.iter().map(|r| r.score).sum()
}

/// Highest-scoring candidate solution of a partition; the first one wins ties.
pub fn best_solution(partition: &[CommonBitRange]) -> Option<Vec<&CommonBitRange>> {
    let mut best: Option<(f64, Vec<&CommonBitRange>)> = None;
    for solution in candidate_solutions(partition) {
        let score = total_score(&solution);
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, solution));
        }
    }
    best.map(|(_, solution)| solution)
}

fn resolve_container(
    container: CommonRangeContainer,
) -> Result<CommonRangeContainer, InferenceError> {
    let mut resolved = Vec::with_capacity(container.len());
    for partition in partition_overlapping(container.ranges()) {
        let solution = best_solution(partition).ok_or(InferenceError::EmptyOverlapPartition {
            start: partition.first().map_or(0, |r| r.start),
        })?;
        resolved.extend(solution.into_iter().cloned());
    }
    debug!(
        before = container.len(),
        after = resolved.len(),
        messages = container.message_indices.len(),
        "resolved overlapping ranges"
    );
    Ok(CommonRangeContainer::new(resolved, container.message_indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::FieldType;

    fn rng(start: usize, length: usize, score: f64) -> CommonBitRange {
        CommonBitRange::new(start, length, FieldType::Length).with_score(score)
    }

    fn spans(container: &CommonRangeContainer) -> Vec<(usize, usize)> {
        container.iter().map(|r| (r.start, r.length)).collect()
    }

    #[test]
    fn chain_resolves_to_best_anchor_solution() {
        let a = rng(0, 8, 5.0);
        let b = rng(4, 8, 3.0);
        let c = rng(8, 4, 4.0);
        let ranges = vec![a, b, c];

        let partitions = partition_overlapping(&ranges);
        assert_eq!(partitions.len(), 1, "greedy partitioning joins the chain");

        let solutions = candidate_solutions(partitions[0]);
        let scores: Vec<f64> = solutions.iter().map(|s| total_score(s)).collect();
        assert_eq!(scores, vec![9.0, 3.0, 4.0]);

        let container = CommonRangeContainer::new(ranges, [0, 1]);
        let resolved = handle_overlapping_conflicts(vec![container]).unwrap();
        assert_eq!(spans(&resolved[0]), vec![(0, 8), (8, 4)]);
        assert_eq!(resolved[0].message_indices.len(), 2);
        assert!(!resolved[0].ranges_overlap());
    }

    #[test]
    fn disjoint_groups_resolve_independently() {
        let ranges = vec![
            rng(0, 8, 1.0),
            rng(2, 4, 2.0),
            rng(16, 8, 1.0),
            rng(20, 8, 0.5),
            rng(32, 8, 1.0),
        ];
        let partitions = partition_overlapping(&ranges);
        assert_eq!(partitions.iter().map(|p| p.len()).collect::<Vec<_>>(), vec![2, 2, 1]);

        let container = CommonRangeContainer::new(ranges, [7]);
        let resolved = handle_overlapping_conflicts(vec![container]).unwrap();
        assert_eq!(spans(&resolved[0]), vec![(2, 4), (16, 8), (32, 8)]);
    }

    #[test]
    fn greedy_partitioning_checks_only_last_range() {
        // (0,16) overlaps (12,8) but (12,8) does not overlap (2,2)
        let ranges = vec![rng(0, 16, 1.0), rng(2, 2, 1.0), rng(12, 8, 1.0)];
        let partitions = partition_overlapping(&ranges);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[1][0].start, 12);
    }

    #[test]
    fn ties_keep_first_solution() {
        let ranges = vec![rng(0, 8, 2.0), rng(4, 8, 2.0)];
        let best = best_solution(&ranges).unwrap();
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].start, 0);
    }

    #[test]
    fn chosen_solution_dominates_constructed_candidates() {
        let ranges = vec![
            rng(0, 6, 0.7),
            rng(3, 6, 0.9),
            rng(6, 6, 0.8),
            rng(9, 2, 0.3),
            rng(10, 6, 0.6),
        ];
        for partition in partition_overlapping(&ranges) {
            let best = total_score(&best_solution(partition).unwrap());
            for candidate in candidate_solutions(partition) {
                assert!(best >= total_score(&candidate));
            }
        }
    }

    #[test]
    fn non_overlapping_container_is_untouched() {
        let container = CommonRangeContainer::new(vec![rng(0, 8, 1.0), rng(8, 8, 1.0)], [0]);
        let resolved = handle_overlapping_conflicts(vec![container.clone()]).unwrap();
        assert_eq!(resolved, vec![container]);
    }

    #[test]
    fn empty_partition_has_no_solution() {
        assert!(best_solution(&[]).is_none());
        assert!(partition_overlapping(&[]).is_empty());
    }
}
