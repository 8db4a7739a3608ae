// Shared fixtures for dtrecap behavior tests.

use std::sync::{Arc, Mutex};

use dtrecap_core::{dt_file_key, MemoryObjectStore, TradingDate};
use dtrecap_reports::{ProgressSink, ProgressUpdate};
use uuid::Uuid;

/// Full DT header used by broker-level reports.
pub const FULL_HEADER: &str = "STK_CODE;BRK_COD1;BRK_COD2;STK_VOLM;STK_PRIC;TRX_CODE;TRX_TIME;INV_TYP1;INV_TYP2;TRX_ORD1;TRX_ORD2;TRX_TYPE";

/// A small two-stock DT body with both bid and ask prints.
pub fn sample_dt_body() -> String {
    format!(
        "{FULL_HEADER}\n\
         BBCA;CC;ZP;10;1000;T1;090000;I;A;5;1;RG\n\
         BBCA;DX;ZP;20;1000;T2;090001;I;I;6;2;RG\n\
         BBCA;CC;YU;30;1005;T3;090002;A;I;1;7;RG\n\
         TLKM;DX;YU;40;500;T4;090003;A;A;8;2;NG"
    )
}

/// Seed a store with one sample DT file per date.
pub async fn seed_dt_files(store: &MemoryObjectStore, dates: &[&str]) -> Vec<TradingDate> {
    let mut parsed = Vec::new();
    for raw in dates {
        let date = TradingDate::parse(raw).expect("valid test date");
        store.insert(dt_file_key(date), sample_dt_body()).await;
        parsed.push(date);
    }
    parsed
}

/// Progress sink that records every update for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().expect("sink lock").clone()
    }
}

impl ProgressSink for RecordingSink {
    fn update_log(&self, _run_id: Uuid, update: &ProgressUpdate) {
        self.updates.lock().expect("sink lock").push(update.clone());
    }
}
