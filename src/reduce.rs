//! Collapses repeated observations of a gene pair onto one canonical record.

use crate::error::SlError;
use crate::pair::PairGroups;
use crate::record::InteractionRecord;

/// For every group, orders records by descending `|effect size|`, marks the
/// first as canonical and emits the whole group. Groups are emitted in their
/// iteration order. Ties keep insertion order, so the earliest record wins.
///
/// Fails on the first effect size that is not a finite number.
pub fn mark_maximum_entries(groups: PairGroups) -> Result<Vec<InteractionRecord>, SlError> {
    let mut reduced = Vec::with_capacity(groups.record_count());
    for (_, records) in groups {
        reduced.extend(reduce_group(records)?);
    }
    Ok(reduced)
}

/// Reduction of a single group; an empty group yields nothing.
pub fn reduce_group(
    records: Vec<InteractionRecord>,
) -> Result<Vec<InteractionRecord>, SlError> {
    let mut ranked = records
        .into_iter()
        .map(|record| match record.effect_size().magnitude() {
            Some(magnitude) => Ok((magnitude, record)),
            None => Err(SlError::NonNumericEffect {
                gene_a: record.gene_a_symbol().to_string(),
                gene_b: record.gene_b_symbol().to_string(),
                value: record.effect_size().to_string(),
            }),
        })
        .collect::<Result<Vec<_>, SlError>>()?;

    // `sort_by` is stable.
    ranked.sort_by(|(left, _), (right, _)| right.total_cmp(left));

    let mut group = ranked
        .into_iter()
        .map(|(_, record)| record)
        .collect::<Vec<_>>();
    if let Some(first) = group.first_mut() {
        first.mark_canonical();
    }
    Ok(group)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::EffectSize;

    fn record(gene_a: &str, gene_b: &str, effect: impl Into<EffectSize>) -> InteractionRecord {
        InteractionRecord::builder()
            .gene_a(gene_a, "n/a")
            .gene_b(gene_b, "n/a")
            .gene_a_perturbation("activating mutation")
            .gene_b_perturbation("shRNA")
            .assay("RNA-interference assay")
            .source_id("PMID:19490893")
            .effect("stddev", effect)
            .is_interaction(true)
            .build()
            .unwrap()
    }

    fn sizes(records: &[InteractionRecord]) -> Vec<String> {
        records.iter().map(|r| r.effect_size().to_string()).collect()
    }

    #[test]
    fn single_record_group_is_canonical() {
        let groups: PairGroups = [record("KRAS", "STK33", 1.0)].into_iter().collect();
        let reduced = mark_maximum_entries(groups).unwrap();
        assert_eq!(reduced.len(), 1);
        assert!(reduced[0].is_canonical());
    }

    #[test]
    fn largest_magnitude_first_with_stable_ties() {
        let groups: PairGroups = [
            record("KRAS", "STK33", -1.2),
            record("KRAS", "STK33", 3.3),
            record("KRAS", "STK33", -3.3),
        ]
        .into_iter()
        .collect();

        let reduced = mark_maximum_entries(groups).unwrap();
        assert_eq!(sizes(&reduced), ["3.3", "-3.3", "-1.2"]);
        assert_eq!(
            reduced.iter().map(|r| r.is_canonical()).collect::<Vec<_>>(),
            [true, false, false]
        );
    }

    #[test]
    fn groups_are_emitted_in_insertion_order() {
        let groups: PairGroups = [
            record("PARP1", "ATR", -0.5),
            record("KRAS", "STK33", 2.0),
            record("PARP1", "ATR", -0.9),
        ]
        .into_iter()
        .collect();

        let reduced = mark_maximum_entries(groups).unwrap();
        assert_eq!(sizes(&reduced), ["-0.9", "-0.5", "2"]);
        assert_eq!(reduced.iter().filter(|r| r.is_canonical()).count(), 2);
        assert!(reduced[0].is_canonical());
        assert!(reduced[2].is_canonical());
    }

    #[test]
    fn numeric_text_is_coerced() {
        let groups: PairGroups = [record("A", "B", "0.5"), record("A", "B", "-4")]
            .into_iter()
            .collect();
        let reduced = mark_maximum_entries(groups).unwrap();
        assert_eq!(sizes(&reduced), ["-4", "0.5"]);
    }

    #[test]
    fn non_numeric_effect_aborts() {
        let groups: PairGroups = [record("A", "B", 1.0), record("A", "B", "n/a")]
            .into_iter()
            .collect();
        let err = mark_maximum_entries(groups).unwrap_err();
        assert_matches!(err, SlError::NonNumericEffect { ref value, .. } if value == "n/a");
    }

    #[test]
    fn missing_effect_aborts() {
        let record = InteractionRecord::builder()
            .gene_a("A", "n/a")
            .gene_b("B", "n/a")
            .gene_a_perturbation("knockout")
            .gene_b_perturbation("knockout")
            .assay("PDX")
            .source_id("PMID:1")
            .is_interaction(true)
            .build()
            .unwrap();
        assert_matches!(
            reduce_group(vec![record]),
            Err(SlError::NonNumericEffect { .. })
        );
    }
}
