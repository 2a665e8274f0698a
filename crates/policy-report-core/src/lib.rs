//! Policy Report Core Library
//!
//! Aggregates the policies of an organization's projects from the remote
//! API into one denormalized record per project, carrying org-level,
//! product-level and project-level policies separately.
//!
//! ## Phases
//!
//! 1. [`vitals::VitalsResolver`] - org name plus token-to-name maps
//! 2. [`policies::PolicyFetcher`] - one aggregated-policy request per project
//! 3. [`records::build_records`] - scope partition and name join
//! 4. [`report::ReportSink`] - six-column report output

pub mod client;
pub mod error;
pub mod model;
pub mod obs;
pub mod pipeline;
pub mod policies;
pub mod pool;
pub mod records;
pub mod report;
pub mod settings;
pub mod telemetry;
pub mod vitals;

pub use client::{
    check_response, HttpTransport, RemoteClient, RequestKind, TokenKind, Transport,
    AGGREGATE_POLICIES, API_PATH,
};
pub use error::{PolicyReportError, Result};
pub use model::{
    OrgToken, Policy, PolicyOwner, PolicyScope, ProductToken, ProjectPolicyBundle, ProjectToken,
    Record, VitalsEntry,
};
pub use obs::{emit_phase_finished, emit_phase_started, emit_run_failed, run_span};
pub use pipeline::{Pipeline, PolicyReport};
pub use policies::PolicyFetcher;
pub use pool::fan_out;
pub use records::{build_records, partition_by_scope, ScopePartition};
pub use report::{
    build_workbook, render_markdown, Column, ColumnValue, JsonReport, JsonReportSink,
    MarkdownReportSink, ReportSink, XlsxReportSink, COLUMNS,
};
pub use settings::{Parallelism, Settings};
pub use telemetry::init_tracing;
pub use vitals::{OrgVitals, VitalsResolver};

/// Policy report version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
