use skiff_catalog::error::CatalogError;
use thiserror::Error;

use crate::events::SchemaChangeEvent;

pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, Error)]
pub enum SinkError {
    /// An event category the sink cannot express against the table
    /// store. Fatal; never retried.
    #[error("unsupported schema change: {0}")]
    UnsupportedEvent(String),
    /// A catalog or transaction failure while applying a schema change,
    /// together with the event that triggered it. Fatal for that event.
    #[error("failed to apply {event}")]
    Apply {
        event: Box<SchemaChangeEvent>,
        #[source]
        source: Box<SinkError>,
    },
    /// The applier was used before its catalog connection was opened.
    #[error("schema applier used before open")]
    ApplierNotOpened,
    /// A row writer lifecycle hook was invoked in a state that does not
    /// permit it. Programming-contract violation, not recoverable.
    #[error("row writer hook invoked in state {0}")]
    InvalidWriterState(&'static str),
    /// An I/O or resource failure while writing rows or completing a
    /// write task. Fatal for the current attempt; the surrounding
    /// engine recovers by restarting the partition instance.
    #[error("write task failure: {0}")]
    WriteTask(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl SinkError {
    pub fn write_task(message: impl Into<String>) -> Self {
        SinkError::WriteTask(message.into())
    }

    pub(crate) fn wrap_apply(event: &SchemaChangeEvent) -> impl FnOnce(SinkError) -> SinkError + '_ {
        move |source| SinkError::Apply {
            event: Box::new(event.clone()),
            source: Box::new(source),
        }
    }
}
