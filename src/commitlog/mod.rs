mod in_memory;
mod log;
mod storage;

pub use in_memory::InMemoryLog;
pub use log::Entry;
pub use log::Log;
pub use log::LogError;
pub use log::MalformedEntry;
pub use storage::FileLog;
