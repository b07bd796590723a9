use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    domain::{
        ConsumerRecord, MasterMapping, MeterId, ObservedSet, Scope, TableRole,
        WronglyMappedPolicy,
    },
    engine::{diagnostics::Diagnostics, scope_filter},
};

/// Every consumer identifier of one scope sorted into its category, plus the
/// source rows behind each category.
///
/// `correctly_tagged`, `untagged` and `wrongly_mapped_ids` are pairwise
/// disjoint, and `correctly_tagged ∪ untagged == master_scoped`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub scope: Scope,
    pub policy: WronglyMappedPolicy,
    pub master_scoped: BTreeSet<MeterId>,
    pub observed: BTreeSet<MeterId>,
    pub correctly_tagged: BTreeSet<MeterId>,
    pub untagged: BTreeSet<MeterId>,
    pub wrongly_mapped_ids: BTreeSet<MeterId>,
    /// Identifiers tagged on the scope's feeder to some other transformer,
    /// observed or not.
    pub other_dtr_on_feeder: BTreeSet<MeterId>,

    /// Master rows tagged to the scope.
    pub master_tagged_rows: Vec<usize>,
    /// Master rows of the scope whose consumer was observed.
    pub correctly_tagged_rows: Vec<usize>,
    /// Master rows of the scope whose consumer was not observed.
    pub untagged_rows: Vec<usize>,
    pub wrongly_mapped_rows: Vec<usize>,
    /// Which table `wrongly_mapped_rows` indexes into.
    pub wrongly_mapped_source: TableRole,
    pub other_dtr_rows: Vec<usize>,

    pub diagnostics: Diagnostics,
}

pub fn classify(
    master: &MasterMapping,
    observed: &ObservedSet,
    scope: Scope,
    policy: WronglyMappedPolicy,
) -> Classification {
    let scoped = scope_filter::filter(master, scope);
    let master_scoped = scoped.dtr_ids(master);
    let feeder_others = scoped.feeder_other_ids(master);
    let observed_ids: BTreeSet<MeterId> = observed
        .records
        .iter()
        .filter_map(|r| r.meter_id.clone())
        .collect();

    let correctly_tagged: BTreeSet<MeterId> =
        master_scoped.intersection(&observed_ids).cloned().collect();
    let untagged: BTreeSet<MeterId> = master_scoped.difference(&observed_ids).cloned().collect();
    let absent_from_scope: BTreeSet<MeterId> =
        observed_ids.difference(&master_scoped).cloned().collect();

    let (wrongly_mapped_ids, wrongly_mapped_rows, wrongly_mapped_source) = match policy {
        WronglyMappedPolicy::SameFeederOtherDtr => {
            let ids: BTreeSet<MeterId> =
                absent_from_scope.intersection(&feeder_others).cloned().collect();
            let rows = rows_matching(master, &scoped.feeder_other_rows, &ids);
            (ids, rows, TableRole::Master)
        }
        WronglyMappedPolicy::AnyMasterAbsence => {
            let all_rows: Vec<usize> = observed.records.iter().map(|r| r.row).collect();
            let rows = rows_where(&observed.records, &all_rows, &absent_from_scope);
            (absent_from_scope, rows, TableRole::Observed)
        }
    };

    let diagnostics = Diagnostics::collect(
        master,
        observed,
        &scoped,
        wrongly_mapped_ids.len(),
        wrongly_mapped_rows.len(),
    );

    Classification {
        scope,
        policy,
        correctly_tagged_rows: rows_matching(master, &scoped.dtr_rows, &correctly_tagged),
        untagged_rows: rows_matching(master, &scoped.dtr_rows, &untagged),
        master_tagged_rows: scoped.dtr_rows.clone(),
        other_dtr_rows: scoped.feeder_other_rows.clone(),
        master_scoped,
        observed: observed_ids,
        correctly_tagged,
        untagged,
        wrongly_mapped_ids,
        other_dtr_on_feeder: feeder_others,
        wrongly_mapped_rows,
        wrongly_mapped_source,
        diagnostics,
    }
}

fn rows_matching(master: &MasterMapping, rows: &[usize], ids: &BTreeSet<MeterId>) -> Vec<usize> {
    rows_where(&master.records, rows, ids)
}

fn rows_where(
    records: &[ConsumerRecord],
    rows: &[usize],
    ids: &BTreeSet<MeterId>,
) -> Vec<usize> {
    rows.iter()
        .copied()
        .filter(|&r| {
            records
                .get(r)
                .and_then(|rec| rec.meter_id.as_ref())
                .is_some_and(|id| ids.contains(id))
        })
        .collect()
}
