use crate::domain::TableRole;

/// A loaded table cannot be mapped onto the canonical consumer schema.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{role} table is missing required column '{column}'")]
    MissingColumn { role: TableRole, column: String },
    #[error("{role} column map does not name a {field} column")]
    UnmappedField { role: TableRole, field: &'static str },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeParseError {
    #[error("scope '{0}' is not of the form <feeder>-<dtr>")]
    Malformed(String),
    #[error("invalid {field} code '{value}' in scope")]
    InvalidCode { field: &'static str, value: String },
}
