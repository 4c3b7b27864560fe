use std::time::Instant;

use skiff_catalog::ident::TableIdent;

use crate::error::{SinkError, SinkResult};
use crate::metrics::WriterMetrics;
use crate::result::{TableWriteResult, WriteResult};

/// A table-format write session for one stream partition.
///
/// Rows accumulate into data files until the session is completed;
/// completing yields the file-level changes it produced.
#[async_trait::async_trait]
pub trait WriteTask<R: Send + 'static>: Send {
    async fn write(&mut self, row: R) -> SinkResult<()>;

    /// Finishes the session, flushing buffered file I/O.
    async fn complete(self: Box<Self>) -> SinkResult<WriteResult>;

    /// Releases the session's resources without producing a result.
    async fn close(self: Box<Self>) -> SinkResult<()>;
}

/// Creates write tasks bound to one partition instance.
#[async_trait::async_trait]
pub trait WriteTaskFactory<R: Send + 'static>: Send {
    /// Binds the factory to a partition instance identity.
    fn initialize(&mut self, subtask_id: u32, attempt_id: u32);

    async fn create(&mut self) -> SinkResult<Box<dyn WriteTask<R>>>;
}

/// The downstream target for completed write results.
pub trait Collector: Send {
    fn collect(&mut self, result: TableWriteResult) -> SinkResult<()>;
}

impl Collector for Vec<TableWriteResult> {
    fn collect(&mut self, result: TableWriteResult) -> SinkResult<()> {
        self.push(result);
        Ok(())
    }
}

enum WriterState<R: Send + 'static> {
    Uninitialized,
    Active { task: Box<dyn WriteTask<R>> },
    Flushing,
    Closed,
}

impl<R: Send + 'static> WriterState<R> {
    fn name(&self) -> &'static str {
        match self {
            WriterState::Uninitialized => "uninitialized",
            WriterState::Active { .. } => "active",
            WriterState::Flushing => "flushing",
            WriterState::Closed => "closed",
        }
    }
}

/// A checkpoint-synchronized row writer for one stream partition.
///
/// Rows flow into the active write task; a checkpoint pre-barrier
/// completes the task, emits its result downstream, and opens a fresh
/// task for the next generation. End-of-input runs the same flush but
/// leaves the writer inert.
///
/// Rows and flush signals for one partition arrive from a single
/// logical thread of control; the writer performs no internal locking.
/// Failures propagate to the caller and are fatal for the current
/// attempt; retry is the surrounding engine's job, via a new partition
/// instance with an incremented attempt number.
pub struct RowWriter<R: Send + 'static, F: WriteTaskFactory<R>> {
    table: TableIdent,
    factory: F,
    state: WriterState<R>,
    metrics: WriterMetrics,
}

impl<R: Send + 'static, F: WriteTaskFactory<R>> RowWriter<R, F> {
    pub fn new(table: TableIdent, factory: F) -> Self {
        Self {
            table,
            factory,
            state: WriterState::Uninitialized,
            metrics: WriterMetrics::default(),
        }
    }

    pub fn table(&self) -> &TableIdent {
        &self.table
    }

    pub fn metrics(&self) -> &WriterMetrics {
        &self.metrics
    }

    pub fn has_task(&self) -> bool {
        matches!(self.state, WriterState::Active { .. })
    }

    /// Binds the writer to its partition instance and creates the first
    /// write task.
    pub async fn open(&mut self, subtask_id: u32, attempt_id: u32) -> SinkResult<()> {
        if !matches!(self.state, WriterState::Uninitialized) {
            return Err(SinkError::InvalidWriterState(self.state.name()));
        }
        self.factory.initialize(subtask_id, attempt_id);
        let task = self.factory.create().await?;
        self.state = WriterState::Active { task };
        Ok(())
    }

    /// Forwards one row into the active write task.
    pub async fn process_row(&mut self, row: R) -> SinkResult<()> {
        match &mut self.state {
            WriterState::Active { task } => task.write(row).await,
            other => Err(SinkError::InvalidWriterState(other.name())),
        }
    }

    /// Checkpoint pre-barrier: completes the current task, emits its
    /// result, and opens a new task so subsequent rows have a
    /// destination. No row can be processed between the two steps; the
    /// writer is borrowed for the whole transition.
    pub async fn prepare_flush(&mut self, collector: &mut dyn Collector) -> SinkResult<()> {
        if self.flush(collector).await? {
            let task = self.factory.create().await?;
            self.state = WriterState::Active { task };
        }
        Ok(())
    }

    /// End of a bounded input: emits the remaining completed files so
    /// none are lost when no further checkpoint runs. The task
    /// reference stays cleared afterwards, so a checkpoint barrier
    /// arriving after end-of-input cannot emit a duplicate result.
    pub async fn end_of_input(&mut self, collector: &mut dyn Collector) -> SinkResult<()> {
        self.flush(collector).await?;
        self.state = WriterState::Closed;
        Ok(())
    }

    /// Releases the current task's resources, if any. Idempotent.
    pub async fn close(&mut self) -> SinkResult<()> {
        if let WriterState::Active { task } =
            std::mem::replace(&mut self.state, WriterState::Closed)
        {
            task.close().await?;
        }
        Ok(())
    }

    /// Completes the active task and emits its result downstream.
    /// Returns whether a task was flushed; a cleared task reference
    /// makes this a no-op.
    async fn flush(&mut self, collector: &mut dyn Collector) -> SinkResult<bool> {
        let task = match std::mem::replace(&mut self.state, WriterState::Flushing) {
            WriterState::Active { task } => task,
            other => {
                self.state = other;
                return Ok(false);
            }
        };
        let started = Instant::now();
        let result = task.complete().await?;
        self.metrics
            .record_flush(&self.table, &result, started.elapsed());
        collector.collect(TableWriteResult {
            table: self.table.clone(),
            result,
        })?;
        Ok(true)
    }
}
