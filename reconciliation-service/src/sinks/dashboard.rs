use std::fmt::Write as _;

use serde::Serialize;
use tagging_core::{KpiName, Kpis, ObservedMeaning, Scope, WronglyMappedPolicy};

use crate::{
    pipeline::{ReferenceCheck, RowSetKind, ScopeReport},
    sinks::csv_export,
};

#[derive(Debug, Clone, Serialize)]
pub struct MetricCard {
    pub key: &'static str,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub colors: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableLink {
    pub set: &'static str,
    pub title: String,
    pub rows: usize,
    pub file_name: String,
    pub href: String,
}

/// Everything the dashboard page shows for one scope.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub title: String,
    pub subtitle: String,
    pub scope: Scope,
    pub meaning: ObservedMeaning,
    pub cards: Vec<MetricCard>,
    pub bar_chart: ChartSeries,
    pub pie_chart: ChartSeries,
    pub tables: Vec<TableLink>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceCheck>,
    pub fingerprint: String,
    pub generated_at: String,
}

fn kpi_label(name: KpiName, meaning: ObservedMeaning, policy: WronglyMappedPolicy) -> &'static str {
    use KpiName::*;
    use ObservedMeaning::*;

    match (name, meaning) {
        (MasterTagged, _) => "Master Tagged Consumers",
        (LiveConnections, Live) => "Live Connections on DTR",
        (LiveConnections, Outage) => "Consumers Experiencing Outage",
        (CorrectlyTagged, Live) => "Master-Tagged & Connected",
        (CorrectlyTagged, Outage) => "Master-Tagged Consumers Experiencing Outage",
        (UntaggedCount, Live) => "Untagged (Master Only)",
        (UntaggedCount, Outage) => "Potentially Disconnected (Untagged in Outage)",
        (WronglyMappedCount, _) if policy == WronglyMappedPolicy::AnyMasterAbsence => {
            "Not Mapped (Observed, Not in Master)"
        }
        (WronglyMappedCount, Live) => "Wrongly Mapped (Other DTR, Same Feeder)",
        (WronglyMappedCount, Outage) => "Outage in Feeder-Mapped (Possibly Misassigned)",
        (TotalAfterCorrection, Live) => "Total After Correction",
        (TotalAfterCorrection, Outage) => "Total Effective Connections (Master-Tagged + Corrected)",
        (LossPercent, _) => "Loss %",
        (OtherDtrOnFeeder, _) => "Tagged to Other DTRs on Feeder",
    }
}

fn kpi_color(name: KpiName) -> &'static str {
    match name {
        KpiName::MasterTagged => "#0984e3",
        KpiName::LiveConnections => "#27ae60",
        KpiName::CorrectlyTagged => "#3498db",
        KpiName::UntaggedCount => "#e74c3c",
        KpiName::WronglyMappedCount => "#f39c12",
        KpiName::TotalAfterCorrection => "#9b59b6",
        KpiName::LossPercent => "#d63031",
        KpiName::OtherDtrOnFeeder => "#7f8c8d",
    }
}

fn table_title(kind: RowSetKind, meaning: ObservedMeaning) -> &'static str {
    match (kind, meaning) {
        (RowSetKind::MasterTagged, _) => "Master Tagged Consumers",
        (RowSetKind::Observed, ObservedMeaning::Live) => "Live Connections on DTR",
        (RowSetKind::Observed, ObservedMeaning::Outage) => "Consumers Experiencing Outage",
        (RowSetKind::CorrectlyTagged, ObservedMeaning::Live) => "Master-Tagged & Connected",
        (RowSetKind::CorrectlyTagged, ObservedMeaning::Outage) => "Master-Tagged with Outage",
        (RowSetKind::Untagged, _) => "Untagged (Master Only)",
        (RowSetKind::WronglyMapped, _) => "Wrongly Mapped",
        (RowSetKind::OtherDtrOnFeeder, _) => "Tagged to Other DTRs on Feeder",
    }
}

/// Correct, untagged and wrongly mapped, all counted as distinct meters so
/// the slices do not overlap.
fn pie_chart(kpis: &Kpis, meaning: ObservedMeaning, policy: WronglyMappedPolicy) -> ChartSeries {
    let slices = [
        KpiName::CorrectlyTagged,
        KpiName::UntaggedCount,
        KpiName::WronglyMappedCount,
    ];
    ChartSeries {
        title: "Consumer Tagging Breakdown".to_string(),
        labels: slices
            .iter()
            .map(|n| kpi_label(*n, meaning, policy).to_string())
            .collect(),
        values: vec![
            kpis.correctly_tagged as f64,
            kpis.untagged_count as f64,
            kpis.wrongly_mapped_ids as f64,
        ],
        colors: slices.iter().map(|n| kpi_color(*n)).collect(),
    }
}

fn format_value(name: KpiName, value: f64) -> String {
    match name {
        KpiName::LossPercent => format!("{value:.2}%"),
        _ => format!("{}", value as u64),
    }
}

pub fn render(report: &ScopeReport) -> DashboardView {
    let meaning = report.meaning;
    let policy = report.policy;
    let entries = report.kpis.entries();

    let cards = entries
        .iter()
        .map(|(name, value)| MetricCard {
            key: name.as_str(),
            label: kpi_label(*name, meaning, policy).to_string(),
            value: format_value(*name, *value),
        })
        .collect();

    let counts: Vec<(KpiName, f64)> = entries
        .iter()
        .copied()
        .filter(|(name, _)| *name != KpiName::LossPercent)
        .collect();
    let bar_chart = ChartSeries {
        title: format!("DTR KPIs Breakdown ({})", report.scope),
        labels: counts
            .iter()
            .map(|(n, _)| kpi_label(*n, meaning, policy).to_string())
            .collect(),
        values: counts.iter().map(|(_, v)| *v).collect(),
        colors: counts.iter().map(|(n, _)| kpi_color(*n)).collect(),
    };

    let pie_chart = pie_chart(&report.kpis, meaning, policy);

    let tables = report
        .row_sets
        .iter()
        .map(|set| TableLink {
            set: set.kind.key(),
            title: table_title(set.kind, meaning).to_string(),
            rows: set.table.len(),
            file_name: csv_export::file_name(report.scope, set.kind, meaning),
            href: format!(
                "/scopes/{}/{}/export/{}",
                report.scope.feeder,
                report.scope.dtr,
                set.kind.key()
            ),
        })
        .collect();

    let subtitle = match meaning {
        ObservedMeaning::Live => format!(
            "Consumer mapping, live connection verification and correction for DTR {}.",
            report.scope
        ),
        ObservedMeaning::Outage => format!(
            "Consumer mapping, outage verification and correction for DTR {}.",
            report.scope
        ),
    };

    DashboardView {
        title: format!(
            "DTR KPIs Dashboard [Feeder: {}, DTR: {}]",
            report.scope.feeder, report.scope.dtr
        ),
        subtitle,
        scope: report.scope,
        meaning,
        cards,
        bar_chart,
        pie_chart,
        tables,
        warnings: report.warnings.iter().map(ToString::to_string).collect(),
        reference: report.reference.clone(),
        fingerprint: report.fingerprint.clone(),
        generated_at: report
            .generated_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
    }
}

/// Plain-text rendering of the metric cards for terminals.
pub fn render_text(report: &ScopeReport) -> String {
    let view = render(report);
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.title);
    let width = view.cards.iter().map(|c| c.label.len()).max().unwrap_or(0);
    for card in &view.cards {
        let _ = writeln!(out, "  {:<width$}  {}", card.label, card.value);
    }
    for w in &view.warnings {
        let _ = writeln!(out, "  warning: {w}");
    }
    if let Some(check) = &report.reference {
        for outcome in check.outcomes() {
            let _ = writeln!(out, "  reference {}: {outcome}", outcome.kind());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_observed_meaning() {
        let p = WronglyMappedPolicy::SameFeederOtherDtr;
        assert_eq!(
            kpi_label(KpiName::LiveConnections, ObservedMeaning::Live, p),
            "Live Connections on DTR"
        );
        assert_eq!(
            kpi_label(KpiName::LiveConnections, ObservedMeaning::Outage, p),
            "Consumers Experiencing Outage"
        );
        assert_eq!(
            kpi_label(
                KpiName::WronglyMappedCount,
                ObservedMeaning::Live,
                WronglyMappedPolicy::AnyMasterAbsence
            ),
            "Not Mapped (Observed, Not in Master)"
        );
    }

    #[test]
    fn loss_percent_has_two_decimals() {
        assert_eq!(format_value(KpiName::LossPercent, 12.3376), "12.34%");
        assert_eq!(format_value(KpiName::UntaggedCount, 19.0), "19");
    }

    #[test]
    fn pie_counts_distinct_wrongly_mapped_meters() {
        // one meter repeated over three master rows on another DTR
        let kpis = Kpis {
            master_tagged: 4,
            master_tagged_rows: 4,
            live_connections: 4,
            correctly_tagged: 3,
            untagged_count: 1,
            wrongly_mapped_count: 3,
            wrongly_mapped_ids: 1,
            total_after_correction: 6,
            loss_percent: Some(25.0),
            other_dtr_on_feeder: None,
        };
        let pie = pie_chart(&kpis, ObservedMeaning::Live, WronglyMappedPolicy::SameFeederOtherDtr);
        assert_eq!(pie.values, vec![3.0, 1.0, 1.0]);
        assert_eq!(pie.labels[2], "Wrongly Mapped (Other DTR, Same Feeder)");
    }
}
