use std::collections::BTreeSet;

use crate::domain::{MasterMapping, MeterId, Scope};

/// Row indices of the master table split around one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopedMaster {
    /// `Feedercode == feeder && dtrcode == dtr`
    pub dtr_rows: Vec<usize>,
    /// `Feedercode == feeder && dtrcode != dtr`
    pub feeder_other_rows: Vec<usize>,
}

pub fn filter(master: &MasterMapping, scope: Scope) -> ScopedMaster {
    let mut scoped = ScopedMaster::default();
    for record in &master.records {
        let (Some(feeder), Some(dtr)) = (record.feeder_code, record.dtr_code) else {
            continue;
        };
        if feeder != scope.feeder {
            continue;
        }
        if dtr == scope.dtr {
            scoped.dtr_rows.push(record.row);
        } else {
            scoped.feeder_other_rows.push(record.row);
        }
    }
    scoped
}

impl ScopedMaster {
    pub fn dtr_ids(&self, master: &MasterMapping) -> BTreeSet<MeterId> {
        ids_at(master, &self.dtr_rows)
    }

    pub fn feeder_other_ids(&self, master: &MasterMapping) -> BTreeSet<MeterId> {
        ids_at(master, &self.feeder_other_rows)
    }

    /// Every row of the scope's feeder, in table order.
    pub fn feeder_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .dtr_rows
            .iter()
            .chain(self.feeder_other_rows.iter())
            .copied()
            .collect();
        rows.sort_unstable();
        rows
    }
}

fn ids_at(master: &MasterMapping, rows: &[usize]) -> BTreeSet<MeterId> {
    rows.iter()
        .filter_map(|&r| master.records.get(r).and_then(|rec| rec.meter_id.clone()))
        .collect()
}
