use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::Serialize;
use tagging_core::{
    Classification, DataQualityWarning, Kpis, MeterId, ObservedMeaning, Scope, Table,
    WronglyMappedPolicy,
};
use time::OffsetDateTime;

/// The exportable row sets of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSetKind {
    MasterTagged,
    Observed,
    CorrectlyTagged,
    Untagged,
    WronglyMapped,
    OtherDtrOnFeeder,
}

impl RowSetKind {
    pub const ALL: [RowSetKind; 6] = [
        Self::MasterTagged,
        Self::Observed,
        Self::CorrectlyTagged,
        Self::Untagged,
        Self::WronglyMapped,
        Self::OtherDtrOnFeeder,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::MasterTagged => "master_tagged",
            Self::Observed => "observed",
            Self::CorrectlyTagged => "correctly_tagged",
            Self::Untagged => "untagged",
            Self::WronglyMapped => "wrongly_mapped",
            Self::OtherDtrOnFeeder => "other_dtr_on_feeder",
        }
    }

    /// File name stem used for CSV downloads.
    pub fn file_slug(&self, meaning: ObservedMeaning) -> &'static str {
        match (self, meaning) {
            (Self::MasterTagged, _) => "master_tagged_consumers",
            (Self::Observed, ObservedMeaning::Live) => "live_connections",
            (Self::Observed, ObservedMeaning::Outage) => "outage_consumers",
            (Self::CorrectlyTagged, ObservedMeaning::Live) => "master_tagged_connected",
            (Self::CorrectlyTagged, ObservedMeaning::Outage) => "master_tagged_outage",
            (Self::Untagged, _) => "untagged_master_only",
            (Self::WronglyMapped, _) => "wrongly_mapped",
            (Self::OtherDtrOnFeeder, _) => "other_dtr_on_feeder",
        }
    }
}

impl fmt::Display for RowSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown row set '{0}'")]
pub struct UnknownRowSet(pub String);

impl FromStr for RowSetKind {
    type Err = UnknownRowSet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| UnknownRowSet(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RowSet {
    pub kind: RowSetKind,
    pub table: Table,
}

/// Engine output compared against a precomputed reference list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceComparison {
    pub kind: RowSetKind,
    pub reference_rows: usize,
    pub engine_count: usize,
    /// In the engine's set but not in the reference list.
    pub missing_from_reference: BTreeSet<MeterId>,
    /// In the reference list but not in the engine's set.
    pub missing_from_engine: BTreeSet<MeterId>,
}

impl ReferenceComparison {
    pub fn compare(
        kind: RowSetKind,
        engine: &BTreeSet<MeterId>,
        reference_rows: usize,
        reference: &BTreeSet<MeterId>,
    ) -> Self {
        Self {
            kind,
            reference_rows,
            engine_count: engine.len(),
            missing_from_reference: engine.difference(reference).cloned().collect(),
            missing_from_engine: reference.difference(engine).cloned().collect(),
        }
    }

    pub fn agrees(&self) -> bool {
        self.missing_from_reference.is_empty() && self.missing_from_engine.is_empty()
    }
}

/// Result of checking one reference sheet.
///
/// A reference sheet never decides the report; an unreadable sheet is
/// recorded here and the engine's classification still stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReferenceOutcome {
    /// Identifier sets were compared.
    Compared(ReferenceComparison),
    /// The sheet has no recognisable identifier column; only its row count
    /// is compared with the engine's count.
    RowsOnly {
        kind: RowSetKind,
        reference_rows: usize,
        engine_count: usize,
    },
    Unavailable { kind: RowSetKind, reason: String },
}

impl ReferenceOutcome {
    pub fn kind(&self) -> RowSetKind {
        match self {
            Self::Compared(cmp) => cmp.kind,
            Self::RowsOnly { kind, .. } | Self::Unavailable { kind, .. } => *kind,
        }
    }

    /// `None` when the sheet could not be read at all.
    pub fn agrees(&self) -> Option<bool> {
        match self {
            Self::Compared(cmp) => Some(cmp.agrees()),
            Self::RowsOnly {
                reference_rows,
                engine_count,
                ..
            } => Some(reference_rows == engine_count),
            Self::Unavailable { .. } => None,
        }
    }
}

impl fmt::Display for ReferenceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.agrees() {
            Some(true) => "agrees",
            Some(false) => "DISAGREES",
            None => "unavailable",
        };
        match self {
            Self::Compared(cmp) => write!(
                f,
                "{status} ({} reference rows, {} computed)",
                cmp.reference_rows, cmp.engine_count
            ),
            Self::RowsOnly {
                reference_rows,
                engine_count,
                ..
            } => write!(
                f,
                "{status} by row count ({reference_rows} reference rows, {engine_count} computed)"
            ),
            Self::Unavailable { reason, .. } => write!(f, "{status}: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceCheck {
    pub untagged: Option<ReferenceOutcome>,
    pub wrongly_mapped: Option<ReferenceOutcome>,
}

impl ReferenceCheck {
    pub fn outcomes(&self) -> impl Iterator<Item = &ReferenceOutcome> {
        self.untagged.iter().chain(self.wrongly_mapped.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub scope: Scope,
    pub meaning: ObservedMeaning,
    pub policy: WronglyMappedPolicy,
    pub kpis: Kpis,
    pub classification: Classification,
    pub warnings: Vec<DataQualityWarning>,
    pub row_sets: Vec<RowSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceCheck>,
    /// Stable digest of the classification; equal inputs give equal digests.
    pub fingerprint: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

impl ScopeReport {
    pub fn row_set(&self, kind: RowSetKind) -> Option<&Table> {
        self.row_sets.iter().find(|r| r.kind == kind).map(|r| &r.table)
    }
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_ids(hasher: &mut blake3::Hasher, tag: &str, ids: &BTreeSet<MeterId>) {
    hash_str(hasher, tag);
    hasher.update(&(ids.len() as u64).to_le_bytes());
    for id in ids {
        hash_str(hasher, id.as_str());
    }
}

fn hash_rows(hasher: &mut blake3::Hasher, tag: &str, rows: &[usize]) {
    hash_str(hasher, tag);
    hasher.update(&(rows.len() as u64).to_le_bytes());
    for r in rows {
        hasher.update(&(*r as u64).to_le_bytes());
    }
}

pub fn fingerprint(c: &Classification) -> String {
    let mut h = blake3::Hasher::new();
    h.update(&c.scope.feeder.to_le_bytes());
    h.update(&c.scope.dtr.to_le_bytes());
    hash_str(
        &mut h,
        match c.policy {
            WronglyMappedPolicy::SameFeederOtherDtr => "same_feeder_other_dtr",
            WronglyMappedPolicy::AnyMasterAbsence => "any_master_absence",
        },
    );
    hash_ids(&mut h, "master_scoped", &c.master_scoped);
    hash_ids(&mut h, "observed", &c.observed);
    hash_ids(&mut h, "correctly_tagged", &c.correctly_tagged);
    hash_ids(&mut h, "untagged", &c.untagged);
    hash_ids(&mut h, "wrongly_mapped", &c.wrongly_mapped_ids);
    hash_ids(&mut h, "other_dtr_on_feeder", &c.other_dtr_on_feeder);
    hash_rows(&mut h, "master_tagged_rows", &c.master_tagged_rows);
    hash_rows(&mut h, "wrongly_mapped_rows", &c.wrongly_mapped_rows);
    h.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> BTreeSet<MeterId> {
        names.iter().filter_map(|n| MeterId::parse(n)).collect()
    }

    #[test]
    fn row_set_keys_round_trip() {
        for kind in RowSetKind::ALL {
            assert_eq!(kind.key().parse::<RowSetKind>().unwrap(), kind);
        }
        assert!("everything".parse::<RowSetKind>().is_err());
    }

    #[test]
    fn observed_file_slug_follows_meaning() {
        assert_eq!(RowSetKind::Observed.file_slug(ObservedMeaning::Live), "live_connections");
        assert_eq!(RowSetKind::Observed.file_slug(ObservedMeaning::Outage), "outage_consumers");
    }

    #[test]
    fn reference_comparison_reports_both_differences() {
        let cmp = ReferenceComparison::compare(
            RowSetKind::Untagged,
            &ids(&["a", "b"]),
            3,
            &ids(&["b", "c"]),
        );
        assert!(!cmp.agrees());
        assert_eq!(cmp.missing_from_reference, ids(&["a"]));
        assert_eq!(cmp.missing_from_engine, ids(&["c"]));
        assert_eq!(cmp.engine_count, 2);
        assert_eq!(cmp.reference_rows, 3);
    }

    #[test]
    fn identical_sets_agree() {
        let cmp = ReferenceComparison::compare(RowSetKind::WronglyMapped, &ids(&["x"]), 1, &ids(&["X "]));
        assert!(cmp.agrees());
    }

    #[test]
    fn outcomes_without_identifiers_still_report() {
        let rows = ReferenceOutcome::RowsOnly {
            kind: RowSetKind::Untagged,
            reference_rows: 19,
            engine_count: 19,
        };
        assert_eq!(rows.agrees(), Some(true));
        assert_eq!(
            rows.to_string(),
            "agrees by row count (19 reference rows, 19 computed)"
        );

        let gone = ReferenceOutcome::Unavailable {
            kind: RowSetKind::WronglyMapped,
            reason: "sheet not found".to_string(),
        };
        assert_eq!(gone.agrees(), None);
        assert_eq!(gone.kind(), RowSetKind::WronglyMapped);
        assert_eq!(gone.to_string(), "unavailable: sheet not found");
    }
}
