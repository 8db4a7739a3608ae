//! Report pipeline orchestration.
//!
//! One run walks a fixed sequence: discover DT files, filter out dates
//! whose outputs already exist, pre-count work units (families that
//! support it), activate the surviving dates in the cache, process files
//! in bounded-concurrency batches, and finally deactivate the dates.
//! Deactivation runs on every exit path so the cache never retains dates
//! beyond their owning run.
//!
//! A single file's failure is counted and logged, never raised; only a
//! worker panic fails the whole run.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use dtrecap_core::cache::DateScopedCache;
use dtrecap_core::decode::{decode_transactions, ColumnSet, TransactionRecord};
use dtrecap_core::object_store::ObjectStore;
use dtrecap_core::paths::{
    bid_ask_key, bid_ask_rollup_key, breakdown_key, broker_summary_key,
    broker_summary_rollup_key, broker_transaction_key, broker_transaction_stock_key,
    date_from_dt_key, TradingDate,
};
use dtrecap_core::retry::{with_retry, RetryPolicy};

use crate::breakdown::breakdown_rows;
use crate::csv_out::{to_csv, CSV_CONTENT_TYPE};
use crate::footprint::footprint_rows;
use crate::scope::{partition_scopes, scope_suffix, InvestorScope};
use crate::summary::{broker_stock_rows, group_by_broker, group_by_stock};

/// The five report families sharing one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFamily {
    BidAsk,
    BrokerBreakdown,
    BrokerSummary,
    BrokerTransaction,
    BrokerTransactionStock,
}

impl ReportFamily {
    pub const ALL: [Self; 5] = [
        Self::BidAsk,
        Self::BrokerBreakdown,
        Self::BrokerSummary,
        Self::BrokerTransaction,
        Self::BrokerTransactionStock,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::BidAsk => "bid_ask",
            Self::BrokerBreakdown => "broker_breakdown",
            Self::BrokerSummary => "broker_summary",
            Self::BrokerTransaction => "broker_transaction",
            Self::BrokerTransactionStock => "broker_transaction_stock",
        }
    }

    pub const fn columns(self) -> ColumnSet {
        match self {
            Self::BidAsk => ColumnSet::Base,
            Self::BrokerBreakdown => ColumnSet::BrokerWithBoard,
            Self::BrokerSummary | Self::BrokerTransaction | Self::BrokerTransactionStock => {
                ColumnSet::Broker
            }
        }
    }

    /// Families that pre-count work units for progress accuracy. The
    /// others estimate by file count so no input I/O happens before the
    /// existence filter completes.
    pub const fn precounts(self) -> bool {
        matches!(self, Self::BidAsk | Self::BrokerSummary)
    }
}

/// Progress pushed to the external log sink after each batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress_percentage: f64,
    pub current_processing_message: String,
}

/// External log sink consuming per-run progress.
pub trait ProgressSink: Send + Sync {
    fn update_log(&self, run_id: Uuid, update: &ProgressUpdate);
}

/// Default sink writing progress into the tracing stream.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn update_log(&self, run_id: Uuid, update: &ProgressUpdate) {
        info!(
            run_id = %run_id,
            progress = update.progress_percentage,
            message = %update.current_processing_message,
            "pipeline progress"
        );
    }
}

/// Per-run tunables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Files per batch; also the concurrency bound within a batch.
    pub batch_size: usize,
    /// Cap on candidate files per run (newest dates first).
    pub max_files: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            max_files: None,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("worker task failed: {0}")]
    Task(String),
}

/// Result of one pipeline run. Individual file failures are counted
/// here, not raised.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub family: &'static str,
    pub discovered: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub message: String,
}

impl RunSummary {
    /// True when every candidate file failed; the only per-file
    /// condition severe enough to fail a run for the caller.
    pub fn all_failed(&self) -> bool {
        self.failed > 0 && self.processed == 0
    }
}

struct FileOutcome {
    failed: bool,
    units: usize,
}

/// One pipeline instance bound to a shared cache and store.
pub struct Pipeline {
    cache: DateScopedCache,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn ProgressSink>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        cache: DateScopedCache,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn ProgressSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            cache,
            store,
            sink,
            config,
        }
    }

    /// Run one report family over every unprocessed DT file.
    pub async fn run(&self, family: ReportFamily) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, family = family.name(), "starting report run");

        // Discover: listing is newest-date-first already.
        let listing = self.cache.dt_file_list().await;
        let mut candidates: Vec<(String, TradingDate)> = listing
            .iter()
            .filter_map(|key| date_from_dt_key(key).ok().map(|date| (key.clone(), date)))
            .collect();
        if let Some(max) = self.config.max_files {
            candidates.truncate(max);
        }
        let discovered = candidates.len();

        // FilterExisting: must finish before any date becomes active.
        let mut skipped = 0usize;
        let mut pending: Vec<(String, TradingDate)> = Vec::new();
        for (key, date) in candidates {
            if self.output_exists(family, date).await {
                skipped += 1;
            } else {
                pending.push((key, date));
            }
        }

        // PreCount: direct store reads, bypassing the cache, so dates
        // not yet confirmed for processing never pollute it.
        let expected_units = if family.precounts() {
            let mut units = 0usize;
            for (key, _) in &pending {
                units += self.precount_units(key).await;
            }
            units.max(1)
        } else {
            pending.len().max(1)
        };

        // ActivateDates: from here the cache retains fetched content.
        let mut dates: Vec<TradingDate> = pending.iter().map(|(_, d)| *d).collect();
        dates.sort();
        dates.dedup();
        for date in &dates {
            self.cache.activate_date(*date).await;
        }

        let outcome = self
            .process_batches(run_id, family, &pending, expected_units)
            .await;

        // DeactivateDates: unconditional, whatever happened above.
        for date in &dates {
            self.cache.deactivate_date(*date).await;
        }

        let (processed, failed) = match outcome {
            Ok(counts) => counts,
            Err(error) => {
                self.sink.update_log(
                    run_id,
                    &ProgressUpdate {
                        progress_percentage: 100.0,
                        current_processing_message: format!(
                            "{} run failed: {error}",
                            family.name()
                        ),
                    },
                );
                return Err(error);
            }
        };

        let message = format!(
            "{}: {} processed, {} failed, {} skipped of {} discovered",
            family.name(),
            processed,
            failed,
            skipped,
            discovered
        );
        self.sink.update_log(
            run_id,
            &ProgressUpdate {
                progress_percentage: 100.0,
                current_processing_message: message.clone(),
            },
        );
        info!(run_id = %run_id, %message, "report run finished");

        Ok(RunSummary {
            run_id,
            family: family.name(),
            discovered,
            processed,
            failed,
            skipped,
            message,
        })
    }

    async fn process_batches(
        &self,
        run_id: Uuid,
        family: ReportFamily,
        pending: &[(String, TradingDate)],
        expected_units: usize,
    ) -> Result<(usize, usize), PipelineError> {
        let mut processed = 0usize;
        let mut failed = 0usize;
        let mut done_units = 0usize;

        for batch in pending.chunks(self.config.batch_size.max(1)) {
            let mut tasks = JoinSet::new();
            for (key, date) in batch {
                let cache = self.cache.clone();
                let store = Arc::clone(&self.store);
                let retry = self.config.retry.clone();
                let key = key.clone();
                let date = *date;
                tasks.spawn(async move {
                    process_file(cache, store, retry, family, key, date).await
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let outcome = joined.map_err(|e| PipelineError::Task(e.to_string()))?;
                done_units += outcome.units;
                if outcome.failed {
                    failed += 1;
                } else {
                    processed += 1;
                }
            }

            let percentage =
                ((done_units as f64 / expected_units as f64) * 100.0).min(100.0);
            self.sink.update_log(
                run_id,
                &ProgressUpdate {
                    progress_percentage: percentage,
                    current_processing_message: format!(
                        "{}: {} of {} units done",
                        family.name(),
                        done_units,
                        expected_units
                    ),
                },
            );

            // Bound peak memory/network pressure between batches.
            tokio::task::yield_now().await;
        }

        Ok((processed, failed))
    }

    /// Existence probe for a family's output. A probe failure reads as
    /// "needs processing": the safe direction, since assuming the
    /// opposite silently drops data.
    async fn output_exists(&self, family: ReportFamily, date: TradingDate) -> bool {
        match family {
            ReportFamily::BidAsk => self
                .store
                .exists(&bid_ask_rollup_key(date))
                .await
                .unwrap_or(false),
            ReportFamily::BrokerSummary => self
                .store
                .exists(&broker_summary_rollup_key(date))
                .await
                .unwrap_or(false),
            ReportFamily::BrokerBreakdown => {
                let prefix = format!("done_summary_broker_breakdown/{}/", date.yyyymmdd());
                self.probe_prefix(&prefix).await
            }
            ReportFamily::BrokerTransaction => {
                let prefix = format!(
                    "broker_transaction/broker_transaction_d_{}/",
                    date.yyyymmdd()
                );
                self.probe_prefix(&prefix).await
            }
            ReportFamily::BrokerTransactionStock => {
                let prefix = format!(
                    "broker_transaction_stock/broker_transaction_stock_d_{}/",
                    date.yyyymmdd()
                );
                self.probe_prefix(&prefix).await
            }
        }
    }

    async fn probe_prefix(&self, prefix: &str) -> bool {
        match self.store.list(prefix, Some(1)).await {
            Ok(keys) => !keys.is_empty(),
            Err(_) => false,
        }
    }

    /// Count distinct stocks in a candidate file without touching the
    /// cache. Absent or unreadable files count as one unit.
    async fn precount_units(&self, key: &str) -> usize {
        match self.store.get(key).await {
            Ok(Some(body)) => {
                let records = decode_transactions(&body, ColumnSet::Base);
                let stocks: BTreeSet<&str> =
                    records.iter().map(|r| r.stock_code.as_str()).collect();
                stocks.len().max(1)
            }
            _ => 1,
        }
    }
}

async fn process_file(
    cache: DateScopedCache,
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
    family: ReportFamily,
    key: String,
    date: TradingDate,
) -> FileOutcome {
    let Some(records) = cache.parsed(&key, family.columns()).await else {
        // Missing input or fetch failure: nothing to do for this date.
        info!(key = %key, family = family.name(), "input absent, skipping");
        return FileOutcome {
            failed: false,
            units: 1,
        };
    };
    if records.is_empty() {
        // Empty file or schema validation failure.
        warn!(key = %key, family = family.name(), "no decodable records");
        return FileOutcome {
            failed: false,
            units: 1,
        };
    }

    let units = if family.precounts() {
        let stocks: BTreeSet<&str> = records.iter().map(|r| r.stock_code.as_str()).collect();
        stocks.len().max(1)
    } else {
        1
    };

    let outputs = match build_outputs(family, date, &records) {
        Ok(outputs) => outputs,
        Err(error) => {
            warn!(key = %key, %error, "report encoding failed");
            return FileOutcome {
                failed: true,
                units,
            };
        }
    };

    let mut upload_failures = 0usize;
    for (out_key, body) in outputs {
        let result = with_retry(&retry, || {
            store.put(&out_key, body.clone(), CSV_CONTENT_TYPE)
        })
        .await;
        if let Err(error) = result {
            warn!(out_key = %out_key, %error, "upload failed after retries");
            upload_failures += 1;
        }
    }

    FileOutcome {
        failed: upload_failures > 0,
        units,
    }
}

/// Build every output object for one decoded DT file. Pure with respect
/// to the cache and store.
pub fn build_outputs(
    family: ReportFamily,
    date: TradingDate,
    records: &[TransactionRecord],
) -> Result<Vec<(String, String)>, csv::Error> {
    let mut outputs: Vec<(String, String)> = Vec::new();

    match family {
        ReportFamily::BidAsk => {
            let rows = footprint_rows(records);
            let mut by_stock: std::collections::BTreeMap<&str, Vec<_>> =
                std::collections::BTreeMap::new();
            for row in &rows {
                by_stock
                    .entry(row.stock_code.as_str())
                    .or_default()
                    .push(row.clone());
            }
            for (stock, stock_rows) in by_stock {
                outputs.push((bid_ask_key(date, stock), to_csv(&stock_rows)?));
            }
            outputs.push((bid_ask_rollup_key(date), to_csv(&rows)?));
        }
        ReportFamily::BrokerBreakdown => {
            let grid = partition_scopes(records);
            for (investor, board, partition) in grid.partitions() {
                let suffix = scope_suffix(investor, board);
                for ((stock, broker), rows) in breakdown_rows(partition, investor) {
                    outputs.push((
                        breakdown_key(date, &stock, &broker, &suffix),
                        to_csv(&rows)?,
                    ));
                }
            }
        }
        ReportFamily::BrokerSummary => {
            let rows = broker_stock_rows(records, InvestorScope::All);
            for (stock, stock_rows) in group_by_stock(rows.clone()) {
                outputs.push((broker_summary_key(date, &stock), to_csv(&stock_rows)?));
            }
            outputs.push((broker_summary_rollup_key(date), to_csv(&rows)?));
        }
        ReportFamily::BrokerTransaction => {
            for (side, scope) in [('d', InvestorScope::Domestic), ('f', InvestorScope::Foreign)] {
                let rows = broker_stock_rows(records, scope);
                for (broker, broker_rows) in group_by_broker(rows) {
                    outputs.push((
                        broker_transaction_key(date, side, &broker),
                        to_csv(&broker_rows)?,
                    ));
                }
            }
        }
        ReportFamily::BrokerTransactionStock => {
            for (side, scope) in [('d', InvestorScope::Domestic), ('f', InvestorScope::Foreign)] {
                let rows = broker_stock_rows(records, scope);
                for (stock, stock_rows) in group_by_stock(rows) {
                    outputs.push((
                        broker_transaction_stock_key(date, side, &stock),
                        to_csv(&stock_rows)?,
                    ));
                }
            }
        }
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "STK_CODE;BRK_COD1;BRK_COD2;STK_VOLM;STK_PRIC;TRX_CODE;TRX_TIME;INV_TYP1;INV_TYP2;TRX_ORD1;TRX_ORD2;TRX_TYPE";

    fn sample_records() -> Vec<TransactionRecord> {
        let content = format!(
            "{HEADER}\n\
             BBCA;CC;ZP;10;1000;T1;090000;I;A;5;1;RG\n\
             TLKM;DX;YU;20;500;T2;090001;A;I;1;6;RG"
        );
        decode_transactions(&content, ColumnSet::BrokerWithBoard)
    }

    #[test]
    fn bid_ask_outputs_per_stock_plus_rollup() {
        let date = TradingDate::parse("20260102").unwrap();
        let outputs = build_outputs(ReportFamily::BidAsk, date, &sample_records()).unwrap();
        let keys: Vec<&str> = outputs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "bid_ask/bid_ask_20260102/BBCA.csv",
                "bid_ask/bid_ask_20260102/TLKM.csv",
                "bid_ask/bid_ask_20260102/ALL_STOCK.csv"
            ]
        );
        // Rollup carries both stocks.
        let rollup = &outputs[2].1;
        assert!(rollup.contains("BBCA"));
        assert!(rollup.contains("TLKM"));
    }

    #[test]
    fn breakdown_outputs_cover_scoped_suffixes() {
        let date = TradingDate::parse("20260102").unwrap();
        let outputs =
            build_outputs(ReportFamily::BrokerBreakdown, date, &sample_records()).unwrap();
        let keys: Vec<&str> = outputs.iter().map(|(k, _)| k.as_str()).collect();

        // All/All files carry no suffix.
        assert!(keys.contains(&"done_summary_broker_breakdown/20260102/BBCA/ZP.csv"));
        // Scoped variants are suffixed.
        assert!(keys.contains(&"done_summary_broker_breakdown/20260102/BBCA/ZP_all_rg.csv"));
        assert!(keys
            .contains(&"done_summary_broker_breakdown/20260102/BBCA/CC_foreign_all.csv"));
    }

    #[test]
    fn broker_transaction_splits_domestic_and_foreign() {
        let date = TradingDate::parse("20260102").unwrap();
        let outputs =
            build_outputs(ReportFamily::BrokerTransaction, date, &sample_records()).unwrap();
        let keys: Vec<&str> = outputs.iter().map(|(k, _)| k.as_str()).collect();

        // BBCA's buyer ZP acts for a domestic investor, its seller CC
        // for a foreign one.
        assert!(keys.contains(&"broker_transaction/broker_transaction_d_20260102/ZP.csv"));
        assert!(keys.contains(&"broker_transaction/broker_transaction_f_20260102/CC.csv"));
    }

    #[test]
    fn summary_rollup_lists_every_broker() {
        let date = TradingDate::parse("20260102").unwrap();
        let outputs = build_outputs(ReportFamily::BrokerSummary, date, &sample_records()).unwrap();
        let (key, body) = outputs.last().unwrap();
        assert_eq!(
            key,
            "broker_summary/broker_summary_20260102/ALLSUM-broker_summary.csv"
        );
        for broker in ["CC", "ZP", "DX", "YU"] {
            assert!(body.contains(broker), "rollup missing {broker}");
        }
    }
}
