use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ObservedMeaning, Table},
    engine::normalize,
    error::SchemaError,
};

/// Canonical consumer key: the trimmed, upper-cased meter serial number.
///
/// Never empty; blank serials are rejected by [`MeterId::parse`] and counted
/// as invalid identifiers instead of joining each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeterId(String);

impl MeterId {
    pub fn parse(raw: &str) -> Option<Self> {
        normalize::normalize(raw)
    }

    pub(crate) fn from_normalized(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    Master,
    Observed,
    Reference,
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Observed => f.write_str("observed"),
            Self::Reference => f.write_str("reference"),
        }
    }
}

/// Source column names for the canonical `identifier / transformer / feeder` schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub identifier: String,
    #[serde(default)]
    pub transformer: Option<String>,
    #[serde(default)]
    pub feeder: Option<String>,
}

impl ColumnMap {
    pub fn master_default() -> Self {
        Self {
            identifier: "Meter_Serial_Number".to_string(),
            transformer: Some("dtrcode".to_string()),
            feeder: Some("Feedercode".to_string()),
        }
    }

    pub fn observed_default() -> Self {
        Self {
            identifier: "Meter_Serial_Number".to_string(),
            transformer: None,
            feeder: None,
        }
    }

    pub fn with_identifier(&self, identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..self.clone()
        }
    }
}

/// One row of a source table mapped onto the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    /// Index of the row in the originating [`Table`].
    pub row: usize,
    pub meter_id: Option<MeterId>,
    pub dtr_code: Option<i64>,
    pub feeder_code: Option<i64>,
}

/// Parse a transformer/feeder code cell. Whole-number floats (`"57.0"`)
/// are accepted since spreadsheet exports often carry codes that way.
pub fn parse_code(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(f as i64),
        _ => None,
    }
}

fn require_column(table: &Table, role: TableRole, column: &str) -> Result<usize, SchemaError> {
    table
        .column_index(column)
        .ok_or_else(|| SchemaError::MissingColumn {
            role,
            column: column.to_string(),
        })
}

fn require_field<'a>(
    name: &'a Option<String>,
    role: TableRole,
    field: &'static str,
) -> Result<&'a str, SchemaError> {
    name.as_deref()
        .ok_or(SchemaError::UnmappedField { role, field })
}

/// The authoritative consumer -> transformer/feeder tagging table.
#[derive(Debug, Clone)]
pub struct MasterMapping {
    pub table: Table,
    pub records: Vec<ConsumerRecord>,
}

impl MasterMapping {
    pub fn from_table(table: Table, columns: &ColumnMap) -> Result<Self, SchemaError> {
        let role = TableRole::Master;
        let id_col = require_column(&table, role, &columns.identifier)?;
        let dtr_col = require_column(
            &table,
            role,
            require_field(&columns.transformer, role, "transformer")?,
        )?;
        let feeder_col = require_column(
            &table,
            role,
            require_field(&columns.feeder, role, "feeder")?,
        )?;

        let records = (0..table.len())
            .map(|row| ConsumerRecord {
                row,
                meter_id: MeterId::parse(table.cell(row, id_col)),
                dtr_code: parse_code(table.cell(row, dtr_col)),
                feeder_code: parse_code(table.cell(row, feeder_col)),
            })
            .collect();

        Ok(Self { table, records })
    }

    /// Rows whose transformer or feeder code could not be read; they never match a scope.
    pub fn unscoped_rows(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.dtr_code.is_none() || r.feeder_code.is_none())
            .count()
    }
}

/// Consumers seen on one transformer's extract at a point in time.
#[derive(Debug, Clone)]
pub struct ObservedSet {
    pub table: Table,
    pub records: Vec<ConsumerRecord>,
    pub meaning: ObservedMeaning,
}

impl ObservedSet {
    /// Only the identifier column is required; transformer/feeder codes are
    /// read when the column map names them and the table carries them.
    pub fn from_table(
        table: Table,
        columns: &ColumnMap,
        meaning: ObservedMeaning,
    ) -> Result<Self, SchemaError> {
        let id_col = require_column(&table, TableRole::Observed, &columns.identifier)?;
        let dtr_col = columns
            .transformer
            .as_deref()
            .and_then(|c| table.column_index(c));
        let feeder_col = columns.feeder.as_deref().and_then(|c| table.column_index(c));

        let records = (0..table.len())
            .map(|row| ConsumerRecord {
                row,
                meter_id: MeterId::parse(table.cell(row, id_col)),
                dtr_code: dtr_col.and_then(|c| parse_code(table.cell(row, c))),
                feeder_code: feeder_col.and_then(|c| parse_code(table.cell(row, c))),
            })
            .collect();

        Ok(Self {
            table,
            records,
            meaning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_code_accepts_integral_floats() {
        assert_eq!(parse_code(" 7088 "), Some(7088));
        assert_eq!(parse_code("57.0"), Some(57));
        assert_eq!(parse_code("57.5"), None);
        assert_eq!(parse_code("DTR-57"), None);
        assert_eq!(parse_code(""), None);
    }

    #[test]
    fn master_requires_all_three_columns() {
        let table = Table::new(strings(&["Meter_Serial_Number", "dtrcode"]), vec![]);
        let err = MasterMapping::from_table(table, &ColumnMap::master_default()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumn {
                role: TableRole::Master,
                column: "Feedercode".to_string()
            }
        );
    }

    #[test]
    fn master_column_map_must_name_codes() {
        let table = Table::new(strings(&["Meter_Serial_Number"]), vec![]);
        let err = MasterMapping::from_table(table, &ColumnMap::observed_default()).unwrap_err();
        assert!(matches!(err, SchemaError::UnmappedField { field: "transformer", .. }));
    }

    #[test]
    fn master_records_normalize_ids_and_codes() {
        let table = Table::new(
            strings(&["Meter_Serial_Number", "dtrcode", "Feedercode", "Name"]),
            vec![
                strings(&[" ab12 ", "57", "7088", "x"]),
                strings(&["", "57.0", "7088", "y"]),
                strings(&["CD34", "n/a", "7088", "z"]),
            ],
        );
        let master = MasterMapping::from_table(table, &ColumnMap::master_default()).unwrap();
        assert_eq!(master.records[0].meter_id.as_ref().unwrap().as_str(), "AB12");
        assert_eq!(master.records[1].meter_id, None);
        assert_eq!(master.records[1].dtr_code, Some(57));
        assert_eq!(master.unscoped_rows(), 1);
    }

    #[test]
    fn observed_needs_only_identifier() {
        let table = Table::new(strings(&["msn"]), vec![strings(&["ab12"])]);
        let columns = ColumnMap::observed_default().with_identifier("msn");
        let observed = ObservedSet::from_table(table, &columns, ObservedMeaning::Live).unwrap();
        assert_eq!(observed.records.len(), 1);
        assert_eq!(observed.records[0].dtr_code, None);
    }
}
