//! # dtrecap Core
//!
//! Shared machinery for the DT recap pipelines: the object-store
//! boundary, the date-scoped content cache, DT file decoding, and the
//! order-count correction used by broker-level reports.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Date-scoped raw/parsed content cache with eviction and stats |
//! | [`decode`] | Semicolon-delimited DT file decoder |
//! | [`error`] | Store and path error types |
//! | [`object_store`] | Key-addressed blob store trait and implementations |
//! | [`orders`] | Order counting with post-open time-bucket correction |
//! | [`paths`] | Trading dates and object key conventions |
//! | [`retry`] | Upload retry with backoff and jitter |

pub mod cache;
pub mod decode;
pub mod error;
pub mod object_store;
pub mod orders;
pub mod paths;
pub mod retry;

pub use cache::{CacheConfig, CacheStats, DateScopedCache};
pub use decode::{
    decode_transactions, BoardType, ColumnSet, InvestorType, TransactionRecord, SHARES_PER_LOT,
};
pub use error::{PathError, StoreError};
pub use object_store::{HttpObjectStore, MemoryObjectStore, ObjectStore, StoreFuture};
pub use orders::{corrected_order_count, normalize_time, OrderCounts, ORDER_CUTOFF_HHMM};
pub use paths::{date_from_dt_key, dt_file_key, TradingDate, DT_PREFIX};
pub use retry::{with_retry, Backoff, RetryPolicy};
