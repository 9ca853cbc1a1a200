//! # CivicWatch Reports Module
//!
//! Community crime reports: the record model, its storage, and the
//! HTTP surface for filing and managing them.

pub mod api;
pub mod errors;
pub mod model;
pub mod repository;

pub use errors::{ReportError, ReportResult};
pub use model::{CrimeReport, NewReport, ReportStatus};
pub use repository::{InMemoryReportRepository, ReportRepository};
