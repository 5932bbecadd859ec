use core::fmt;

/// Crate-wide error taxonomy. Every public, fallible operation returns
/// `Result<T, RprocError>`; invariant violations (double-unregister,
/// refcount underflow) are programming errors and use `assert!`/`expect`
/// instead of a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RprocError {
    /// No such named remote processor, endpoint, or channel.
    NotFound,
    /// Duplicate registration, or address already bound.
    Exists,
    /// Malformed arguments, e.g. `ADDR_ANY` where a concrete address is required.
    Invalid,
    /// Payload exceeds `slot_size - header_size`.
    MsgTooBig { len: usize, max: usize },
    /// The TX buffer pool is exhausted.
    NoBuffer,
    /// Image is shorter than a header, or a section overruns the image.
    Malformed,
    /// Image magic does not match the configured firmware variant.
    BadMagic,
    /// A section or resource entry is truncated.
    Truncated,
    /// A section's device address is not covered by the memory map.
    BadAddress,
    /// `ops.start`/`ops.stop`/IOMMU programming failed.
    PlatformFail,
    /// Reserved for future use (hardware-spinlock acquisition and the like).
    Timeout,
}

impl fmt::Display for RprocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RprocError::NotFound => write!(f, "no such entry"),
            RprocError::Exists => write!(f, "already exists"),
            RprocError::Invalid => write!(f, "invalid argument"),
            RprocError::MsgTooBig { len, max } => {
                write!(f, "message too big ({len} bytes, max {max})")
            }
            RprocError::NoBuffer => write!(f, "no free transmit buffer"),
            RprocError::Malformed => write!(f, "malformed firmware image"),
            RprocError::BadMagic => write!(f, "firmware magic mismatch"),
            RprocError::Truncated => write!(f, "truncated firmware section"),
            RprocError::BadAddress => write!(f, "device address not mapped"),
            RprocError::PlatformFail => write!(f, "platform operation failed"),
            RprocError::Timeout => write!(f, "operation timed out"),
        }
    }
}

pub type Result<T> = core::result::Result<T, RprocError>;
