//! Key event normalization, repeat tracking and ASCII latching.

use ::tracing::trace;

use super::{KeyEvent, KeyFlags, ProducerId, RcKey, KEY_ASCII};

/// Number of consecutive repeats after the initial press at which a held key
/// is promoted to a long press. The promotion is emitted alongside the fifth
/// occurrence of the key.
pub const LONG_PRESS_REPEATS: u32 = 4;

/// Receiver for normalized key presses, typically the action map which binds
/// keys to application actions.
pub trait ActionSink {
    /// Called once for every normalized key press.
    fn key_pressed(&mut self, producer: &ProducerId, code: u32, flags: KeyFlags);
}

impl<F> ActionSink for F
where
    F: FnMut(&ProducerId, u32, KeyFlags),
{
    fn key_pressed(&mut self, producer: &ProducerId, code: u32, flags: KeyFlags) {
        self(producer, code, flags)
    }
}

/// The central object which normalizes remote-control key events before they
/// reach the action layer.
///
/// # Repeat and Long-Press Tracking
///
/// Remote-control drivers report a held key as an initial press followed by a
/// stream of events flagged [`KeyFlags::REPEAT`]. The [`Dispatcher`] remembers
/// the last key it saw and counts consecutive repeats of that same key from
/// the same producer. Any other key, or the same key without the repeat flag,
/// starts a new run.
///
/// Once a run reaches [`LONG_PRESS_REPEATS`] repeats, an additional
/// [`KeyFlags::LONG`] event is dispatched for the key. This happens exactly
/// once per hold; further repeats are forwarded as ordinary repeats.
///
/// # ASCII Input
///
/// Some producers (USB keyboards, virtual keyboards on companion apps) report
/// characters rather than key codes, flagged [`KeyFlags::ASCII`]. Character
/// codes would collide with key codes, so the dispatcher latches the character
/// and forwards the reserved [`KEY_ASCII`] code instead. Whoever handles
/// [`KEY_ASCII`] then fetches the character with [`take_latched_ascii`].
/// Only the most recent character is kept.
///
/// # Example
///
/// ```
/// use ::stbcore::input::rc::{Dispatcher, KeyEvent, KeyFlags, ProducerId, RcKey};
///
/// let mut dispatcher = Dispatcher::new();
/// let remote = ProducerId::new("dreambox remote control (native)");
///
/// let mut pressed = Vec::new();
/// let mut sink = |_: &ProducerId, code: u32, flags: KeyFlags| pressed.push((code, flags));
///
/// dispatcher.dispatch(&KeyEvent::new(remote.clone(), RcKey::Ok, KeyFlags::empty()), &mut sink);
/// for _ in 0..4 {
///     dispatcher.dispatch(&KeyEvent::new(remote.clone(), RcKey::Ok, KeyFlags::REPEAT), &mut sink);
/// }
///
/// // One press, four repeats, plus the long-press promotion.
/// assert_eq!(pressed.len(), 6);
/// assert!(pressed.contains(&(RcKey::Ok.value(), KeyFlags::LONG)));
/// ```
///
/// [`take_latched_ascii`]: Self::take_latched_ascii
#[derive(Debug, Default)]
pub struct Dispatcher {
    /// The key which started the current run.
    last: Option<KeyEvent>,
    /// Number of repeats seen for `last`, not counting the initial press.
    num_repeat: u32,
    /// Most recent ASCII code, or zero if none is pending.
    latched_ascii: u32,
}

impl Dispatcher {
    /// Constructs a new dispatcher with no tracked key and nothing latched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes a key event and forwards the result to `sink`.
    ///
    /// Exactly one event is forwarded per call, or two when the call completes
    /// a long press.
    pub fn dispatch<S>(&mut self, key: &KeyEvent, sink: &mut S)
    where
        S: ActionSink + ?Sized,
    {
        trace!(
            producer = %key.producer,
            code = key.code,
            name = ?RcKey::try_from(key.code).ok(),
            flags = ?key.flags,
            "Key event"
        );

        match &self.last {
            Some(last) if last.same_key(key) && key.flags.contains(KeyFlags::REPEAT) => {
                self.num_repeat = self.num_repeat.saturating_add(1);
            }
            _ => {
                self.num_repeat = 0;
                self.last = Some(key.clone());
            }
        }

        if self.num_repeat == LONG_PRESS_REPEATS {
            trace!(producer = %key.producer, code = key.code, "Long press");
            sink.key_pressed(&key.producer, key.code, KeyFlags::LONG);
            self.num_repeat = self.num_repeat.saturating_add(1);
        }

        if key.flags.contains(KeyFlags::ASCII) {
            self.latched_ascii = key.code;
            sink.key_pressed(&key.producer, KEY_ASCII, KeyFlags::empty());
        } else {
            sink.key_pressed(&key.producer, key.code, key.flags);
        }
    }

    /// Returns the most recently latched ASCII code and clears the latch.
    ///
    /// Returns `0` if no ASCII key has arrived since the last call.
    pub fn take_latched_ascii(&mut self) -> u32 {
        ::std::mem::take(&mut self.latched_ascii)
    }

    /// The number of consecutive repeats of the currently tracked key.
    pub fn repeat_count(&self) -> u32 {
        self.num_repeat
    }

    /// Forget the tracked key and any latched ASCII code.
    pub fn reset(&mut self) {
        self.last = None;
        self.num_repeat = 0;
        self.latched_ascii = 0;
    }
}
