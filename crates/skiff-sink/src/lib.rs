pub mod applier;
pub mod convert;
pub mod error;
pub mod events;
pub mod metrics;
pub mod result;
pub mod writer;
