use std::{fs, path::Path};

use reconciliation_service::config::AppConfig;
use tempfile::TempDir;

pub const MASTER_CSV: &str = "\
Meter_Serial_Number,dtrcode,Feedercode,Consumer_Name
a1,57,7088,Asha
A2,57,7088,Bala
a3,57,7088,Chitra
x9,32,7088,Dev
y8,34,15631,Esha
,57,7088,Blank
";

pub const OBSERVED_CSV: &str = "\
msn,kwh
A1,1.5
a2 ,2.0
X9,0.4
z7,3.1
";

pub const CONFIG_TOML: &str = r#"
[columns.observed]
identifier = "msn"

[kpis]
include_other_dtr_on_feeder = true

[[scopes]]
feeder = 7088
dtr = 57
observed_meaning = "live"
master = { path = "master.csv" }
observed = { path = "7088-57.csv" }

[scopes.reference]
untagged = { path = "untagged.csv" }
wrongly_mapped = { path = "wrongly.csv" }

[[scopes]]
feeder = 7088
dtr = 32
observed_meaning = "outage"
policy = "any_master_absence"
master = { path = "master.csv" }
observed = { path = "missing.csv" }
"#;

/// Writes the fixture tables and config into a fresh directory.
pub fn fixture() -> (TempDir, AppConfig) {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "master.csv", MASTER_CSV);
    write(dir.path(), "7088-57.csv", OBSERVED_CSV);
    write(dir.path(), "untagged.csv", "msn\nA3\n");
    write(dir.path(), "wrongly.csv", "Meter_Serial_Number\nX9\nQ1\n");
    write(dir.path(), "reconcile-config.toml", CONFIG_TOML);

    let cfg = AppConfig::load_from(&dir.path().join("reconcile-config.toml")).expect("config");
    (dir, cfg)
}

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write fixture");
}
