//! The replicated update log: one durable stream of events per origin server, and the order in
//! which a replica applies the union of those streams.

mod log;
mod log_event;
mod merge;

pub use log_event::EventKind;
pub use log_event::LogEvent;
pub use log_event::LogRecord;

pub(crate) use log::UpdateLog;
pub(crate) use merge::merge_order;
