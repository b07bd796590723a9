//! The reconciliation engine: normalize identifiers, filter the master
//! table to a scope, classify consumers and project KPIs.
//!
//! Every function here is pure; calling it twice on the same inputs gives
//! the same output.

pub mod classify;
pub mod diagnostics;
pub mod kpi;
pub mod normalize;
pub mod scope_filter;
