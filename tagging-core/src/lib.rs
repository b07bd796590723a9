pub mod domain;
pub mod engine;
pub mod error;

pub use domain::{
    ColumnMap, ConsumerRecord, MasterMapping, MeterId, ObservedMeaning, ObservedSet, Scope,
    Table, TableRole, WronglyMappedPolicy,
};
pub use engine::{
    classify::{classify, Classification},
    diagnostics::{DataQualityWarning, Diagnostics},
    kpi::{aggregate, KpiName, KpiOptions, Kpis},
};
pub use error::{SchemaError, ScopeParseError};
