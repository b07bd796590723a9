use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::Serialize;

use crate::{
    domain::{ConsumerRecord, MasterMapping, MeterId, ObservedSet, TableRole},
    engine::scope_filter::ScopedMaster,
};

/// Non-fatal data quality findings for one classification.
///
/// None of these stop the engine; source data may legitimately have zero
/// rows for a scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Blank identifiers among the master rows of the scope's feeder.
    pub invalid_master_identifiers: usize,
    pub invalid_observed_identifiers: usize,
    /// Master rows with unreadable transformer/feeder codes.
    pub unparseable_master_codes: usize,
    /// Identifiers with more than one master row on the scope's feeder.
    pub duplicate_master_identifiers: BTreeSet<MeterId>,
    pub duplicate_observed_identifiers: BTreeSet<MeterId>,
    pub observed_empty: bool,
    pub master_scope_empty: bool,
    /// Wrongly-mapped rows beyond one per wrongly-mapped identifier.
    pub wrongly_mapped_row_excess: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    InvalidIdentifiers { role: TableRole, count: usize },
    UnparseableCodes { count: usize },
    DuplicateIdentifiers { role: TableRole, count: usize },
    EmptyObservedSet,
    EmptyMasterScope,
    WronglyMappedRowExcess { excess: usize },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifiers { role, count } => {
                write!(f, "{count} {role} rows have an empty meter serial number")
            }
            Self::UnparseableCodes { count } => {
                write!(f, "{count} master rows have unreadable dtr/feeder codes")
            }
            Self::DuplicateIdentifiers { role, count } => {
                write!(f, "{count} {role} meter serial numbers appear on more than one row")
            }
            Self::EmptyObservedSet => f.write_str("observed extract has no consumers"),
            Self::EmptyMasterScope => f.write_str("no master consumers are tagged to this scope"),
            Self::WronglyMappedRowExcess { excess } => write!(
                f,
                "{excess} wrongly mapped rows beyond one per meter serial number"
            ),
        }
    }
}

fn duplicates<'a, I>(records: I) -> BTreeSet<MeterId>
where
    I: IntoIterator<Item = &'a ConsumerRecord>,
{
    let mut seen: BTreeMap<&MeterId, usize> = BTreeMap::new();
    for rec in records {
        if let Some(id) = &rec.meter_id {
            *seen.entry(id).or_default() += 1;
        }
    }
    seen.into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id.clone())
        .collect()
}

impl Diagnostics {
    pub(crate) fn collect(
        master: &MasterMapping,
        observed: &ObservedSet,
        scoped: &ScopedMaster,
        wrongly_mapped_ids: usize,
        wrongly_mapped_rows: usize,
    ) -> Self {
        let feeder_records: Vec<&ConsumerRecord> = scoped
            .feeder_rows()
            .into_iter()
            .filter_map(|r| master.records.get(r))
            .collect();

        let master_scope_empty = !scoped
            .dtr_rows
            .iter()
            .any(|&r| master.records.get(r).is_some_and(|rec| rec.meter_id.is_some()));

        Self {
            invalid_master_identifiers: feeder_records
                .iter()
                .filter(|r| r.meter_id.is_none())
                .count(),
            invalid_observed_identifiers: observed
                .records
                .iter()
                .filter(|r| r.meter_id.is_none())
                .count(),
            unparseable_master_codes: master.unscoped_rows(),
            duplicate_master_identifiers: duplicates(feeder_records.iter().copied()),
            duplicate_observed_identifiers: duplicates(&observed.records),
            observed_empty: observed.records.iter().all(|r| r.meter_id.is_none()),
            master_scope_empty,
            wrongly_mapped_row_excess: wrongly_mapped_rows.saturating_sub(wrongly_mapped_ids),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings().is_empty()
    }

    pub fn warnings(&self) -> Vec<DataQualityWarning> {
        let mut out = Vec::new();
        if self.invalid_master_identifiers > 0 {
            out.push(DataQualityWarning::InvalidIdentifiers {
                role: TableRole::Master,
                count: self.invalid_master_identifiers,
            });
        }
        if self.invalid_observed_identifiers > 0 {
            out.push(DataQualityWarning::InvalidIdentifiers {
                role: TableRole::Observed,
                count: self.invalid_observed_identifiers,
            });
        }
        if self.unparseable_master_codes > 0 {
            out.push(DataQualityWarning::UnparseableCodes {
                count: self.unparseable_master_codes,
            });
        }
        if !self.duplicate_master_identifiers.is_empty() {
            out.push(DataQualityWarning::DuplicateIdentifiers {
                role: TableRole::Master,
                count: self.duplicate_master_identifiers.len(),
            });
        }
        if !self.duplicate_observed_identifiers.is_empty() {
            out.push(DataQualityWarning::DuplicateIdentifiers {
                role: TableRole::Observed,
                count: self.duplicate_observed_identifiers.len(),
            });
        }
        if self.observed_empty {
            out.push(DataQualityWarning::EmptyObservedSet);
        }
        if self.master_scope_empty {
            out.push(DataQualityWarning::EmptyMasterScope);
        }
        if self.wrongly_mapped_row_excess > 0 {
            out.push(DataQualityWarning::WronglyMappedRowExcess {
                excess: self.wrongly_mapped_row_excess,
            });
        }
        out
    }
}
