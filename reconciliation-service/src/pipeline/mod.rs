mod report;

use std::{collections::BTreeSet, sync::Arc};

use tagging_core::{
    aggregate, classify, KpiOptions, MeterId, SchemaError, Scope, Table, TableRole,
};
use time::OffsetDateTime;

use crate::{
    config::{AppConfig, ColumnsConfig, ScopeConfig},
    sources::{FileSource, LoadError, SourceLocation, TableCache, TableSource},
    transform,
};

pub use report::{
    fingerprint, ReferenceCheck, ReferenceComparison, ReferenceOutcome, RowSet, RowSetKind,
    ScopeReport, UnknownRowSet,
};

/// Identifier columns tried on a reference sheet, in order, without repeats.
fn reference_candidates<'a>(observed: &'a str, master: &'a str) -> Vec<&'a str> {
    let mut candidates = vec![observed, master, "msn"];
    let mut seen = BTreeSet::new();
    candidates.retain(|c| seen.insert(*c));
    candidates
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("schema error in {location}: {source}")]
    Schema {
        location: String,
        #[source]
        source: SchemaError,
    },
    #[error("scope {0} is not registered")]
    UnknownScope(Scope),
}

/// Runs load -> canonicalize -> classify -> aggregate for one scope.
///
/// Each call starts from the source tables; the only state carried between
/// calls is the optional table cache.
pub struct Reconciler<S = FileSource> {
    source: S,
    cache: Option<Arc<TableCache>>,
    columns: ColumnsConfig,
    kpis: KpiOptions,
}

impl Reconciler<FileSource> {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(FileSource, cfg.columns.clone(), cfg.kpis)
    }
}

impl<S: TableSource> Reconciler<S> {
    pub fn new(source: S, columns: ColumnsConfig, kpis: KpiOptions) -> Self {
        Self {
            source,
            cache: None,
            columns,
            kpis,
        }
    }

    pub fn with_cache(mut self, cache: Arc<TableCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<TableCache>> {
        self.cache.as_ref()
    }

    fn load(&self, location: &SourceLocation) -> Result<Arc<Table>, LoadError> {
        match &self.cache {
            Some(cache) => cache.get_or_load(&self.source, location),
            None => self.source.load(location).map(Arc::new),
        }
    }

    pub fn run(&self, entry: &ScopeConfig) -> Result<ScopeReport, PipelineError> {
        let scope = entry.scope();
        let _span = tracing::info_span!("reconcile", %scope).entered();

        let master_table = self.load(&entry.master)?;
        let observed_table = self.load(&entry.observed)?;

        let master = transform::master_mapping((*master_table).clone(), &self.columns.master)
            .map_err(|source| PipelineError::Schema {
                location: entry.master.to_string(),
                source,
            })?;
        let observed_columns = entry.observed_columns(&self.columns.observed);
        let observed = transform::observed_set(
            (*observed_table).clone(),
            &observed_columns,
            entry.observed_meaning,
        )
        .map_err(|source| PipelineError::Schema {
            location: entry.observed.to_string(),
            source,
        })?;

        let classification = classify(&master, &observed, scope, entry.policy);
        let kpis = aggregate(&classification, self.kpis);

        let mut row_sets = vec![
            RowSet {
                kind: RowSetKind::MasterTagged,
                table: master.table.select(&classification.master_tagged_rows),
            },
            RowSet {
                kind: RowSetKind::Observed,
                table: observed.table.clone(),
            },
            RowSet {
                kind: RowSetKind::CorrectlyTagged,
                table: master.table.select(&classification.correctly_tagged_rows),
            },
            RowSet {
                kind: RowSetKind::Untagged,
                table: master.table.select(&classification.untagged_rows),
            },
            RowSet {
                kind: RowSetKind::WronglyMapped,
                table: match classification.wrongly_mapped_source {
                    TableRole::Observed => observed.table.select(&classification.wrongly_mapped_rows),
                    _ => master.table.select(&classification.wrongly_mapped_rows),
                },
            },
        ];
        if self.kpis.include_other_dtr_on_feeder {
            row_sets.push(RowSet {
                kind: RowSetKind::OtherDtrOnFeeder,
                table: master.table.select(&classification.other_dtr_rows),
            });
        }

        let reference = entry.reference.as_ref().map(|sheets| {
            let candidates = reference_candidates(
                &observed_columns.identifier,
                &self.columns.master.identifier,
            );
            ReferenceCheck {
                untagged: sheets.untagged.as_ref().map(|loc| {
                    self.compare_reference(
                        loc,
                        &candidates,
                        RowSetKind::Untagged,
                        &classification.untagged,
                    )
                }),
                wrongly_mapped: sheets.wrongly_mapped.as_ref().map(|loc| {
                    self.compare_reference(
                        loc,
                        &candidates,
                        RowSetKind::WronglyMapped,
                        &classification.wrongly_mapped_ids,
                    )
                }),
            }
        });

        let warnings = classification.diagnostics.warnings();
        for w in &warnings {
            tracing::warn!(warning = %w, "data quality");
        }
        if let Some(check) = &reference {
            for outcome in check.outcomes() {
                match outcome {
                    ReferenceOutcome::Compared(cmp) if !cmp.agrees() => tracing::warn!(
                        set = %cmp.kind,
                        engine = cmp.engine_count,
                        reference_rows = cmp.reference_rows,
                        missing_from_reference = cmp.missing_from_reference.len(),
                        missing_from_engine = cmp.missing_from_engine.len(),
                        "reference sheet disagrees with classification"
                    ),
                    ReferenceOutcome::RowsOnly {
                        kind,
                        reference_rows,
                        engine_count,
                    } if reference_rows != engine_count => tracing::warn!(
                        set = %kind,
                        engine = engine_count,
                        reference_rows,
                        "reference sheet row count disagrees with classification"
                    ),
                    _ => {}
                }
            }
        }

        metrics::counter!("reconciliations_total").increment(1);
        metrics::counter!("data_quality_warnings_total").increment(warnings.len() as u64);
        tracing::info!(
            meaning = %entry.observed_meaning,
            master_tagged = kpis.master_tagged,
            live_connections = kpis.live_connections,
            correctly_tagged = kpis.correctly_tagged,
            untagged = kpis.untagged_count,
            wrongly_mapped = kpis.wrongly_mapped_count,
            total_after_correction = kpis.total_after_correction,
            loss_percent = kpis.loss_percent.unwrap_or(0.0),
            "scope reconciled"
        );

        Ok(ScopeReport {
            scope,
            meaning: entry.observed_meaning,
            policy: entry.policy,
            fingerprint: fingerprint(&classification),
            kpis,
            classification,
            warnings,
            row_sets,
            reference,
            generated_at: OffsetDateTime::now_utc(),
        })
    }

    /// Look a scope up in the registry and run it.
    pub fn run_scope(&self, cfg: &AppConfig, scope: Scope) -> Result<ScopeReport, PipelineError> {
        let entry = cfg.find(scope).ok_or(PipelineError::UnknownScope(scope))?;
        self.run(entry)
    }

    /// Compare one reference sheet with an engine set. Failures are
    /// recorded in the outcome; they never fail the report.
    fn compare_reference(
        &self,
        location: &SourceLocation,
        candidates: &[&str],
        kind: RowSetKind,
        engine: &BTreeSet<MeterId>,
    ) -> ReferenceOutcome {
        let table = match self.load(location) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(set = %kind, %location, error = %e, "reference sheet unavailable");
                return ReferenceOutcome::Unavailable {
                    kind,
                    reason: e.to_string(),
                };
            }
        };
        match transform::reference_list_any(&table, candidates) {
            Ok(list) => ReferenceOutcome::Compared(ReferenceComparison::compare(
                kind, engine, list.rows, &list.ids,
            )),
            Err(e) => {
                tracing::warn!(
                    set = %kind,
                    %location,
                    error = %e,
                    "reference sheet has no identifier column; comparing row counts only"
                );
                ReferenceOutcome::RowsOnly {
                    kind,
                    reference_rows: table.len(),
                    engine_count: engine.len(),
                }
            }
        }
    }
}
