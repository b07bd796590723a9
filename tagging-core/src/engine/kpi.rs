use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::classify::Classification;

/// Which optional KPIs a report exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiOptions {
    pub include_loss_percent: bool,
    pub include_other_dtr_on_feeder: bool,
}

impl Default for KpiOptions {
    fn default() -> Self {
        Self {
            include_loss_percent: true,
            include_other_dtr_on_feeder: false,
        }
    }
}

/// Named counts handed to the presentation layer.
///
/// `master_tagged` and `live_connections` count distinct identifiers, while
/// `master_tagged_rows` and `wrongly_mapped_count` count source rows. The two
/// differ only when the source tables repeat identifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub master_tagged: usize,
    pub master_tagged_rows: usize,
    pub live_connections: usize,
    pub correctly_tagged: usize,
    pub untagged_count: usize,
    pub wrongly_mapped_count: usize,
    pub wrongly_mapped_ids: usize,
    pub total_after_correction: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_dtr_on_feeder: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KpiName {
    MasterTagged,
    LiveConnections,
    CorrectlyTagged,
    UntaggedCount,
    WronglyMappedCount,
    TotalAfterCorrection,
    LossPercent,
    OtherDtrOnFeeder,
}

impl KpiName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MasterTagged => "masterTagged",
            Self::LiveConnections => "liveConnections",
            Self::CorrectlyTagged => "correctlyTagged",
            Self::UntaggedCount => "untaggedCount",
            Self::WronglyMappedCount => "wronglyMappedCount",
            Self::TotalAfterCorrection => "totalAfterCorrection",
            Self::LossPercent => "lossPercent",
            Self::OtherDtrOnFeeder => "otherDtrOnFeeder",
        }
    }
}

impl fmt::Display for KpiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Share of master-tagged consumers that were not observed, in percent.
/// Zero when nothing is tagged to the scope.
pub fn loss_percent(untagged: usize, master_scoped: usize) -> f64 {
    if master_scoped == 0 {
        0.0
    } else {
        untagged as f64 / master_scoped as f64 * 100.0
    }
}

pub fn aggregate(c: &Classification, options: KpiOptions) -> Kpis {
    let correctly_tagged = c.correctly_tagged.len();
    let wrongly_mapped_count = c.wrongly_mapped_rows.len();

    Kpis {
        master_tagged: c.master_scoped.len(),
        master_tagged_rows: c.master_tagged_rows.len(),
        live_connections: c.observed.len(),
        correctly_tagged,
        untagged_count: c.untagged.len(),
        wrongly_mapped_count,
        wrongly_mapped_ids: c.wrongly_mapped_ids.len(),
        total_after_correction: correctly_tagged + wrongly_mapped_count,
        loss_percent: options
            .include_loss_percent
            .then(|| loss_percent(c.untagged.len(), c.master_scoped.len())),
        other_dtr_on_feeder: options
            .include_other_dtr_on_feeder
            .then(|| c.other_dtr_on_feeder.len()),
    }
}

impl Kpis {
    /// Exposed KPIs in display order.
    pub fn entries(&self) -> Vec<(KpiName, f64)> {
        let mut out = vec![
            (KpiName::MasterTagged, self.master_tagged as f64),
            (KpiName::LiveConnections, self.live_connections as f64),
            (KpiName::CorrectlyTagged, self.correctly_tagged as f64),
            (KpiName::UntaggedCount, self.untagged_count as f64),
            (KpiName::WronglyMappedCount, self.wrongly_mapped_count as f64),
            (KpiName::TotalAfterCorrection, self.total_after_correction as f64),
        ];
        if let Some(v) = self.loss_percent {
            out.push((KpiName::LossPercent, v));
        }
        if let Some(v) = self.other_dtr_on_feeder {
            out.push((KpiName::OtherDtrOnFeeder, v as f64));
        }
        out
    }
}
