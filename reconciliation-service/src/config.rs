use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tagging_core::{ColumnMap, KpiOptions, ObservedMeaning, Scope, WronglyMappedPolicy};

use crate::sources::SourceLocation;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("scope {0} is registered more than once")]
    DuplicateScope(Scope),
    #[error("no scopes registered")]
    NoScopes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default = "ColumnMap::master_default")]
    pub master: ColumnMap,
    #[serde(default = "ColumnMap::observed_default")]
    pub observed: ColumnMap,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            master: ColumnMap::master_default(),
            observed: ColumnMap::observed_default(),
        }
    }
}

/// Precomputed lists kept next to an observed extract, used to cross-check
/// the engine's own classification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceSheets {
    pub untagged: Option<SourceLocation>,
    pub wrongly_mapped: Option<SourceLocation>,
}

/// One registered feeder/transformer pair and where its tables live.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    pub feeder: i64,
    pub dtr: i64,
    pub observed_meaning: ObservedMeaning,
    #[serde(default)]
    pub policy: WronglyMappedPolicy,
    pub master: SourceLocation,
    pub observed: SourceLocation,
    /// Identifier column of the observed extract when it differs from the default.
    #[serde(default)]
    pub observed_identifier: Option<String>,
    #[serde(default)]
    pub reference: Option<ReferenceSheets>,
}

impl ScopeConfig {
    pub fn scope(&self) -> Scope {
        Scope::new(self.feeder, self.dtr)
    }

    pub fn observed_columns(&self, defaults: &ColumnMap) -> ColumnMap {
        match &self.observed_identifier {
            Some(id) => defaults.with_identifier(id.clone()),
            None => defaults.clone(),
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.master.resolve_against(base);
        self.observed.resolve_against(base);
        if let Some(r) = &mut self.reference {
            for loc in [&mut r.untagged, &mut r.wrongly_mapped].into_iter().flatten() {
                loc.resolve_against(base);
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub kpis: KpiOptions,
    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("RECONCILE_CONFIG").unwrap_or_else(|_| "reconcile-config.toml".to_string());
        Ok(Self::load_from(Path::new(&path))?)
    }

    /// Relative source paths resolve against the directory holding the config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            for scope in &mut cfg.scopes {
                scope.resolve_paths(base);
            }
        }
        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scopes.is_empty() {
            return Err(ConfigError::NoScopes);
        }
        let mut seen = HashSet::new();
        for s in &self.scopes {
            if !seen.insert(s.scope()) {
                return Err(ConfigError::DuplicateScope(s.scope()));
            }
        }
        Ok(())
    }

    pub fn find(&self, scope: Scope) -> Option<&ScopeConfig> {
        self.scopes.iter().find(|s| s.scope() == scope)
    }

    /// Feeder -> transformers, both sorted, for selection menus.
    pub fn feeders(&self) -> BTreeMap<i64, Vec<i64>> {
        let mut out: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for s in &self.scopes {
            out.entry(s.feeder).or_default().push(s.dtr);
        }
        for dtrs in out.values_mut() {
            dtrs.sort_unstable();
        }
        out
    }
}
