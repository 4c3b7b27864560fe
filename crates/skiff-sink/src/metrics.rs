use std::time::Duration;

use skiff_catalog::ident::TableIdent;

use crate::result::WriteResult;

/// Flush-level counters for one row writer instance.
///
/// The host engine's metrics registration is out of scope; values are
/// kept readable for the operator wrapper and logged on every flush.
#[derive(Debug, Clone, Default)]
pub struct WriterMetrics {
    flush_count: u64,
    last_flush_data_files: usize,
    last_flush_records: u64,
    last_flush_bytes: u64,
    last_flush_duration: Duration,
}

impl WriterMetrics {
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    pub fn last_flush_data_files(&self) -> usize {
        self.last_flush_data_files
    }

    pub fn last_flush_records(&self) -> u64 {
        self.last_flush_records
    }

    pub fn last_flush_bytes(&self) -> u64 {
        self.last_flush_bytes
    }

    pub fn last_flush_duration(&self) -> Duration {
        self.last_flush_duration
    }

    pub(crate) fn record_flush(
        &mut self,
        table: &TableIdent,
        result: &WriteResult,
        duration: Duration,
    ) {
        self.flush_count += 1;
        self.last_flush_data_files = result.data_files.len();
        self.last_flush_records = result.record_count();
        self.last_flush_bytes = result.byte_size();
        self.last_flush_duration = duration;
        log::debug!(
            "flushed {} data files ({} records, {} bytes) for {} in {:?}",
            self.last_flush_data_files,
            self.last_flush_records,
            self.last_flush_bytes,
            table,
            duration,
        );
    }
}
