use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use reconciliation_service::{
    config::{AppConfig, ColumnsConfig, ScopeConfig},
    observability,
    pipeline::Reconciler,
    sinks::{csv_export, dashboard},
    sources::{FileSource, SourceLocation},
};
use tagging_core::{KpiOptions, ObservedMeaning, Scope, WronglyMappedPolicy};

/// Reconcile one feeder/transformer scope and print its KPIs.
///
/// Either pick a registered scope (`--scope 7088-57`) from the config file,
/// or describe the tables directly with `--master`/`--observed`.
#[derive(Parser, Debug)]
#[command(name = "reconcile")]
struct Cli {
    /// Config file; defaults to $RECONCILE_CONFIG or reconcile-config.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Registered scope as <feeder>-<dtr>.
    #[arg(long)]
    scope: Option<Scope>,

    #[arg(long, requires = "observed")]
    master: Option<PathBuf>,
    #[arg(long)]
    master_sheet: Option<String>,
    #[arg(long, requires = "master")]
    observed: Option<PathBuf>,
    #[arg(long)]
    observed_sheet: Option<String>,
    /// Identifier column of the observed extract.
    #[arg(long)]
    observed_identifier: Option<String>,
    #[arg(long)]
    feeder: Option<i64>,
    #[arg(long)]
    dtr: Option<i64>,
    #[arg(long, value_enum)]
    meaning: Option<MeaningArg>,
    #[arg(long, value_enum, default_value_t = PolicyArg::SameFeederOtherDtr)]
    policy: PolicyArg,

    /// Write every row set as CSV into this directory.
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Print the full report as JSON instead of the KPI summary.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MeaningArg {
    Live,
    Outage,
}

impl From<MeaningArg> for ObservedMeaning {
    fn from(m: MeaningArg) -> Self {
        match m {
            MeaningArg::Live => ObservedMeaning::Live,
            MeaningArg::Outage => ObservedMeaning::Outage,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    SameFeederOtherDtr,
    AnyMasterAbsence,
}

impl From<PolicyArg> for WronglyMappedPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::SameFeederOtherDtr => WronglyMappedPolicy::SameFeederOtherDtr,
            PolicyArg::AnyMasterAbsence => WronglyMappedPolicy::AnyMasterAbsence,
        }
    }
}

fn location(path: PathBuf, sheet: Option<String>) -> SourceLocation {
    SourceLocation {
        path,
        sheet,
        delimiter: None,
    }
}

fn ad_hoc_entry(cli: &Cli) -> Result<ScopeConfig> {
    let (Some(master), Some(observed)) = (cli.master.clone(), cli.observed.clone()) else {
        bail!("either --scope or both --master and --observed are required");
    };
    let (Some(feeder), Some(dtr)) = (cli.feeder, cli.dtr) else {
        bail!("--feeder and --dtr are required with --master/--observed");
    };
    let Some(meaning) = cli.meaning else {
        bail!("--meaning (live|outage) is required with --master/--observed");
    };

    Ok(ScopeConfig {
        feeder,
        dtr,
        observed_meaning: meaning.into(),
        policy: cli.policy.into(),
        master: location(master, cli.master_sheet.clone()),
        observed: location(observed, cli.observed_sheet.clone()),
        observed_identifier: cli.observed_identifier.clone(),
        reference: None,
    })
}

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let cfg = match (&cli.config, cli.scope) {
        (Some(path), _) => Some(
            AppConfig::load_from(path).with_context(|| format!("loading {}", path.display()))?,
        ),
        (None, Some(_)) => Some(AppConfig::load()?),
        (None, None) => None,
    };

    let (entry, reconciler) = match (&cfg, cli.scope) {
        (Some(cfg), Some(scope)) => {
            let Some(entry) = cfg.find(scope) else {
                bail!("scope {scope} is not registered in the config");
            };
            (entry.clone(), Reconciler::from_config(cfg))
        }
        (Some(cfg), None) => (ad_hoc_entry(&cli)?, Reconciler::from_config(cfg)),
        (None, _) => (
            ad_hoc_entry(&cli)?,
            Reconciler::new(FileSource, ColumnsConfig::default(), KpiOptions::default()),
        ),
    };

    let report = reconciler.run(&entry)?;

    if let Some(dir) = &cli.export_dir {
        let written = csv_export::export_report(&report, dir)?;
        tracing::info!(files = written.len(), dir = %dir.display(), "export complete");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", dashboard::render_text(&report));
    }

    Ok(())
}
