mod consumer;
mod scope;
mod table;

pub use consumer::{
    parse_code, ColumnMap, ConsumerRecord, MasterMapping, MeterId, ObservedSet, TableRole,
};
pub use scope::{ObservedMeaning, Scope, WronglyMappedPolicy};
pub use table::Table;
