pub mod bus;
pub mod buffer;
pub mod channel;
pub mod endpoint;
pub mod frame;
pub mod ns;
pub mod virtqueue;

pub use bus::{Bus, Driver};
pub use buffer::{Doorbell, LoopbackDoorbell, Transport};
pub use channel::Channel;
pub use endpoint::{EndpointCallback, EndpointTable, ADDR_ANY, NS_ADDR, RESERVED_LOW};
pub use frame::Frame;
pub use ns::{NsFlags, NsMessage};
