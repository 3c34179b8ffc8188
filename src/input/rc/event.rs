//! Remote-control key events, plus the adapter for raw Linux input event
//! records into their strongly-typed Rust counterparts.

use ::bitflags::bitflags;
use ::deku::prelude::*;
use ::std::{fmt, mem::size_of, sync::Arc};
use ::tracing::trace;

bitflags! {
    /// Key event flags. Bit values match the remote-control driver ABI so
    /// flags can be passed through to the action layer unchanged.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KeyFlags: u32 {
        /// The key was released.
        const BREAK = 1;
        /// The key is being held and this is a continuation of an earlier
        /// press.
        const REPEAT = 2;
        /// Synthesized after a key has been held for a while.
        const LONG = 4;
        /// The code is a character rather than a key code.
        const ASCII = 8;
    }
}

/// Identifies the driver or device which produced a key event. Opaque to the
/// dispatcher, which only compares identifiers for equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProducerId(Arc<str>);

impl ProducerId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single key event as reported by an input driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub producer: ProducerId,
    pub code: u32,
    pub flags: KeyFlags,
}

impl KeyEvent {
    pub fn new(producer: ProducerId, code: impl Into<u32>, flags: KeyFlags) -> Self {
        Self {
            producer,
            code: code.into(),
            flags,
        }
    }

    /// Returns `true` if `other` was produced by the same physical key on the
    /// same device.
    pub fn same_key(&self, other: &KeyEvent) -> bool {
        self.code == other.code && self.producer == other.producer
    }

    /// Adapts a raw `struct input_event` record, as read from an evdev device
    /// node, into a [`KeyEvent`].
    ///
    /// Returns `None` for records which do not describe a key (sync reports,
    /// relative axes, etc), for key values the remote-control layer has no use
    /// for, and for truncated records.
    pub fn from_input_event(producer: &ProducerId, bytes: &[u8]) -> Option<Self> {
        let (_, record) = match InputEventRecord::from_bytes((bytes, 0)) {
            Ok(parsed) => parsed,
            Err(err) => {
                trace!(%producer, len = bytes.len(), %err, "Dropping malformed input event");
                return None;
            }
        };

        if record.kind != EV_KEY {
            return None;
        }

        let flags = match record.value {
            KEY_VALUE_RELEASE => KeyFlags::BREAK,
            KEY_VALUE_PRESS => KeyFlags::empty(),
            KEY_VALUE_REPEAT => KeyFlags::REPEAT,
            _ => return None,
        };

        Some(Self::new(producer.clone(), record.code, flags))
    }
}

/// Event type for key and button state changes.
const EV_KEY: u16 = 0x01;

const KEY_VALUE_RELEASE: i32 = 0;
const KEY_VALUE_PRESS: i32 = 1;
const KEY_VALUE_REPEAT: i32 = 2;

/// `time_t` / `suseconds_t` as laid out in `struct timeval` on the target.
#[cfg(target_pointer_width = "64")]
type TimeField = i64;
#[cfg(not(target_pointer_width = "64"))]
type TimeField = i32;

/// Size in bytes of one `struct input_event` record on the target.
pub const INPUT_EVENT_SIZE: usize = 2 * size_of::<TimeField>() + 8;

/// Struct representation of the kernel's `struct input_event`.
///
/// Layout definition:
/// <https://www.kernel.org/doc/html/latest/input/input.html#event-interface>
#[derive(Clone, Copy, Debug, PartialEq, Eq, DekuRead, DekuWrite)]
#[cfg_attr(target_endian = "little", deku(endian = "little"))]
#[cfg_attr(target_endian = "big", deku(endian = "big"))]
pub(crate) struct InputEventRecord {
    pub(crate) tv_sec: TimeField,
    pub(crate) tv_usec: TimeField,
    /// `EV_*` event type.
    pub(crate) kind: u16,
    /// `KEY_*` code for `EV_KEY` records.
    pub(crate) code: u16,
    /// For `EV_KEY`: 0 release, 1 press, 2 autorepeat.
    pub(crate) value: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::rc::RcKey;

    use ::pretty_assertions::assert_eq;

    fn record(kind: u16, code: u16, value: i32) -> Vec<u8> {
        InputEventRecord {
            tv_sec: 1_700_000_000,
            tv_usec: 250_000,
            kind,
            code,
            value,
        }
        .to_bytes()
        .unwrap()
    }

    fn producer() -> ProducerId {
        ProducerId::new("/dev/input/event0")
    }

    #[test]
    fn test_record_size_matches_kernel_layout() {
        assert_eq!(record(EV_KEY, 0, 0).len(), INPUT_EVENT_SIZE);
    }

    /// Pressing 'OK' on the remote.
    #[test]
    fn test_key_press() {
        let event = KeyEvent::from_input_event(&producer(), &record(EV_KEY, 352, 1)).unwrap();
        assert_eq!(event, KeyEvent::new(producer(), RcKey::Ok, KeyFlags::empty()));
    }

    /// Holding 'OK' on the remote.
    #[test]
    fn test_key_repeat() {
        let event = KeyEvent::from_input_event(&producer(), &record(EV_KEY, 352, 2)).unwrap();
        assert_eq!(event, KeyEvent::new(producer(), RcKey::Ok, KeyFlags::REPEAT));
    }

    /// Releasing 'OK' on the remote.
    #[test]
    fn test_key_release() {
        let event = KeyEvent::from_input_event(&producer(), &record(EV_KEY, 352, 0)).unwrap();
        assert_eq!(event, KeyEvent::new(producer(), RcKey::Ok, KeyFlags::BREAK));
    }

    #[test]
    fn test_non_key_records_are_ignored() {
        // EV_SYN / SYN_REPORT follows every key record.
        assert_eq!(KeyEvent::from_input_event(&producer(), &record(0x00, 0, 0)), None);
        // EV_MSC / MSC_SCAN carries the raw IR scancode.
        assert_eq!(
            KeyEvent::from_input_event(&producer(), &record(0x04, 4, 0x0425)),
            None
        );
    }

    #[test]
    fn test_unknown_key_value_is_ignored() {
        assert_eq!(KeyEvent::from_input_event(&producer(), &record(EV_KEY, 352, 7)), None);
    }

    #[test]
    fn test_truncated_record_is_ignored() {
        let bytes = record(EV_KEY, 352, 1);
        assert_eq!(
            KeyEvent::from_input_event(&producer(), &bytes[..INPUT_EVENT_SIZE - 1]),
            None
        );
    }

    #[test]
    fn test_same_key() {
        let ok = KeyEvent::new(producer(), RcKey::Ok, KeyFlags::empty());
        let ok_repeat = KeyEvent::new(producer(), RcKey::Ok, KeyFlags::REPEAT);
        let ok_other_remote = KeyEvent::new(ProducerId::new("lirc"), RcKey::Ok, KeyFlags::empty());
        let exit = KeyEvent::new(producer(), RcKey::Exit, KeyFlags::empty());

        assert!(ok.same_key(&ok_repeat));
        assert!(!ok.same_key(&ok_other_remote));
        assert!(!ok.same_key(&exit));
    }
}
