pub mod format;
pub mod parser;
pub mod resource;

pub use format::{ResourceEntry, ResourceKind};
pub use parser::{load, FirmwareSink, LoadResult};
pub use resource::{TraceBuffer, TraceSlots};
