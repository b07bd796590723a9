pub mod csv_export;
pub mod dashboard;

pub use csv_export::{export_report, ExportError};
pub use dashboard::DashboardView;
