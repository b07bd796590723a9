use tagging_core::{ColumnMap, MasterMapping, ObservedMeaning, ObservedSet, Table};

/// Master table from `(serial, dtrcode, Feedercode)` triples, with a
/// descriptive pass-through column.
pub fn master(rows: &[(&str, i64, i64)]) -> MasterMapping {
    let table = Table::new(
        vec![
            "Meter_Serial_Number".to_string(),
            "dtrcode".to_string(),
            "Feedercode".to_string(),
            "Consumer_Name".to_string(),
        ],
        rows.iter()
            .enumerate()
            .map(|(i, (m, d, f))| {
                vec![m.to_string(), d.to_string(), f.to_string(), format!("consumer {i}")]
            })
            .collect(),
    );
    MasterMapping::from_table(table, &ColumnMap::master_default()).expect("master schema")
}

pub fn observed(ids: &[&str]) -> ObservedSet {
    let table = Table::new(
        vec!["msn".to_string()],
        ids.iter().map(|m| vec![m.to_string()]).collect(),
    );
    ObservedSet::from_table(
        table,
        &ColumnMap::observed_default().with_identifier("msn"),
        ObservedMeaning::Live,
    )
    .expect("observed schema")
}
