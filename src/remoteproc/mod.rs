pub mod mailbox;
pub mod platform;
pub mod processor;
pub mod registry;

pub use platform::{FirmwareLoader, MemoryReader, MemoryWriter, PlatformBundle, PlatformOps};
pub use processor::{RemoteProcessor, State};
pub use registry::Registry;
