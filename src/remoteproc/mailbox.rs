//! Mailbox protocol consumed from the platform (spec.md §6).
//!
//! The hardware mailbox driver itself is out of scope (spec.md §1); this
//! module only interprets the discriminated `u32` values it delivers.

/// Reserved mailbox codes. Any value `< base_vq_id` is one of these;
/// anything else indexes a local virtqueue to service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxCode {
    Ready,
    PendingMsg,
    Crash,
    EchoRequest,
    EchoReply,
    AbortRequest,
}

pub const READY: u32 = 0xFFFF_FF00;
pub const PENDING_MSG: u32 = 0xFFFF_FF01;
pub const CRASH: u32 = 0xFFFF_FF02;
pub const ECHO_REQUEST: u32 = 0xFFFF_FF03;
pub const ECHO_REPLY: u32 = 0xFFFF_FF04;
pub const ABORT_REQUEST: u32 = 0xFFFF_FF05;

/// What a raw mailbox value means to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxAction {
    /// A reserved control code below `base_vq_id`.
    Control(MailboxCode),
    /// Service the local virtqueue with this index.
    ServiceVirtqueue(u32),
    /// Below `base_vq_id` and not a known reserved code: ignored.
    Ignored,
}

/// Interpret a raw mailbox value, given the processor's `base_vq_id`
/// (spec.md §6: "Any value below the pre-assigned base_vq_id is
/// ignored; higher values index the local virtqueue to service").
pub fn interpret(value: u32, base_vq_id: u32) -> MailboxAction {
    let code = match value {
        READY => Some(MailboxCode::Ready),
        PENDING_MSG => Some(MailboxCode::PendingMsg),
        CRASH => Some(MailboxCode::Crash),
        ECHO_REQUEST => Some(MailboxCode::EchoRequest),
        ECHO_REPLY => Some(MailboxCode::EchoReply),
        ABORT_REQUEST => Some(MailboxCode::AbortRequest),
        _ => None,
    };
    if let Some(code) = code {
        return MailboxAction::Control(code);
    }
    if value < base_vq_id {
        MailboxAction::Ignored
    } else {
        MailboxAction::ServiceVirtqueue(value - base_vq_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_msg_services_rx_vq_zero() {
        assert_eq!(
            interpret(PENDING_MSG, 2),
            MailboxAction::Control(MailboxCode::PendingMsg)
        );
    }

    #[test]
    fn crash_is_recognized() {
        assert_eq!(interpret(CRASH, 2), MailboxAction::Control(MailboxCode::Crash));
    }

    #[test]
    fn value_below_base_is_ignored() {
        assert_eq!(interpret(1, 2), MailboxAction::Ignored);
    }

    #[test]
    fn value_at_or_above_base_indexes_a_virtqueue() {
        assert_eq!(interpret(2, 2), MailboxAction::ServiceVirtqueue(0));
        assert_eq!(interpret(5, 2), MailboxAction::ServiceVirtqueue(3));
    }
}
