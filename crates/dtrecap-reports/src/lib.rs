//! # dtrecap Reports
//!
//! The aggregation engine and pipeline orchestration for the DT recap
//! system. Five report families share one generalized pipeline: the
//! price-level bid/ask footprint, the per-price broker breakdown over
//! investor/board scopes, the broker summary, and the two broker
//! transaction variants (per broker and per stock).
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`breakdown`] | Per-price broker breakdown rows |
//! | [`csv_out`] | CSV encoding of report rows |
//! | [`footprint`] | Price-level bid/ask footprint |
//! | [`net`] | Net collapsing and zero-safe ratios |
//! | [`pipeline`] | Pipeline orchestrator and progress reporting |
//! | [`scope`] | Investor/board scope grid partitioning |
//! | [`summary`] | Broker-by-stock aggregates |

pub mod breakdown;
pub mod csv_out;
pub mod footprint;
pub mod net;
pub mod pipeline;
pub mod scope;
pub mod summary;

pub use breakdown::{breakdown_rows, BreakdownRow};
pub use csv_out::{to_csv, CSV_CONTENT_TYPE};
pub use footprint::{footprint_rows, FootprintRow};
pub use net::{collapse_net, safe_ratio, NetBasis, NetPosition};
pub use pipeline::{
    build_outputs, Pipeline, PipelineConfig, PipelineError, ProgressSink, ProgressUpdate,
    ReportFamily, RunSummary, TracingProgressSink,
};
pub use scope::{partition_scopes, scope_suffix, BoardScope, InvestorScope, ScopeGrid};
pub use summary::{broker_stock_rows, group_by_broker, group_by_stock, BrokerStockRow};
