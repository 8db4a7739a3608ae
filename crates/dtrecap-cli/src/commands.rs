//! Command implementations.

use std::sync::Arc;

use dtrecap_core::{CacheConfig, DateScopedCache, HttpObjectStore, ObjectStore};
use dtrecap_reports::{Pipeline, PipelineConfig, RunSummary, TracingProgressSink};

use crate::cli::{Cli, Command, FamilyArg};
use crate::error::CliError;

fn build_pipeline(store_url: &str, config: PipelineConfig) -> (Pipeline, DateScopedCache) {
    let store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(store_url));
    let cache = DateScopedCache::new(Arc::clone(&store), CacheConfig::default());
    let pipeline = Pipeline::new(
        cache.clone(),
        store,
        Arc::new(TracingProgressSink),
        config,
    );
    (pipeline, cache)
}

async fn run_families(
    pipeline: &Pipeline,
    families: FamilyArg,
) -> Result<Vec<RunSummary>, CliError> {
    let mut summaries = Vec::new();
    for family in families.families() {
        summaries.push(pipeline.run(family).await?);
    }
    Ok(summaries)
}

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Run {
            report,
            max_files,
            batch_size,
        } => {
            let config = PipelineConfig {
                batch_size: *batch_size,
                max_files: *max_files,
                ..PipelineConfig::default()
            };
            let (pipeline, _cache) = build_pipeline(&cli.store_url, config);
            let summaries = run_families(&pipeline, *report).await?;

            let mut failed_candidates = 0usize;
            let mut any_processed = false;
            for summary in &summaries {
                println!("{}", summary.message);
                failed_candidates += summary.failed;
                any_processed |= summary.processed > 0;
            }
            if failed_candidates > 0 && !any_processed {
                return Err(CliError::AllFilesFailed(failed_candidates));
            }
            Ok(())
        }
        Command::List => {
            let (_, cache) = build_pipeline(&cli.store_url, PipelineConfig::default());
            for key in cache.dt_file_list().await.iter() {
                println!("{key}");
            }
            Ok(())
        }
        Command::Stats { report } => {
            let (pipeline, cache) = build_pipeline(&cli.store_url, PipelineConfig::default());
            for summary in run_families(&pipeline, *report).await? {
                println!("{}", summary.message);
            }
            let stats = cache.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}
