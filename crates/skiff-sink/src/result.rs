use serde::{Deserialize, Serialize};
use skiff_catalog::ident::TableIdent;

/// A data file produced or removed by a write task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFile {
    pub path: String,
    pub record_count: u64,
    pub file_size_bytes: u64,
}

/// The set of file-level changes produced by completing a write task.
///
/// An empty result is a valid outcome of a checkpoint with no rows; the
/// downstream committer treats it as a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub data_files: Vec<DataFile>,
    pub deleted_files: Vec<DataFile>,
}

impl WriteResult {
    pub fn is_empty(&self) -> bool {
        self.data_files.is_empty() && self.deleted_files.is_empty()
    }

    pub fn record_count(&self) -> u64 {
        self.data_files.iter().map(|f| f.record_count).sum()
    }

    pub fn byte_size(&self) -> u64 {
        self.data_files.iter().map(|f| f.file_size_bytes).sum()
    }
}

/// A write result paired with the table it belongs to, as emitted to
/// the downstream commit stage. Ownership passes to the committer once
/// emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableWriteResult {
    pub table: TableIdent,
    pub result: WriteResult,
}
