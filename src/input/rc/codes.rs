//! Well-known remote-control key codes.
//!
//! Values follow the Linux input subsystem (`linux/input-event-codes.h`),
//! which is what remote-control drivers on the box report.

use ::strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

/// Synthetic code dispatched in place of ASCII-producing keys. The original
/// character is latched by the [`Dispatcher`] and can be retrieved with
/// [`Dispatcher::take_latched_ascii`].
///
/// [`Dispatcher`]: crate::input::rc::Dispatcher
/// [`Dispatcher::take_latched_ascii`]: crate::input::rc::Dispatcher::take_latched_ascii
pub const KEY_ASCII: u32 = 510;

/// Highest key code the input subsystem will ever report.
pub const KEY_MAX: u32 = 0x2ff;

/// Named remote-control keys.
///
/// Key events carry raw integer codes, and any code is forwarded regardless of
/// whether it has a name here. [`RcKey`] exists for logging and for tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[repr(u16)]
pub enum RcKey {
    Esc = 1,
    Num1 = 2,
    Num2 = 3,
    Num3 = 4,
    Num4 = 5,
    Num5 = 6,
    Num6 = 7,
    Num7 = 8,
    Num8 = 9,
    Num9 = 10,
    Num0 = 11,
    Backspace = 14,
    Up = 103,
    Left = 105,
    Right = 106,
    Down = 108,
    Mute = 113,
    VolumeDown = 114,
    VolumeUp = 115,
    Power = 116,
    Pause = 119,
    Stop = 128,
    Help = 138,
    Menu = 139,
    Record = 167,
    Rewind = 168,
    Exit = 174,
    Play = 207,
    FastForward = 208,
    Ok = 352,
    Info = 358,
    Epg = 365,
    Subtitle = 370,
    Tv = 377,
    Radio = 385,
    Text = 388,
    Audio = 392,
    Video = 393,
    Red = 398,
    Green = 399,
    Yellow = 400,
    Blue = 401,
    ChannelUp = 402,
    ChannelDown = 403,
    Next = 407,
    Previous = 412,
}

impl RcKey {
    /// The raw key code for this key.
    pub const fn value(self) -> u32 {
        self as u16 as u32
    }
}

impl From<RcKey> for u32 {
    fn from(key: RcKey) -> Self {
        key.value()
    }
}

impl TryFrom<u32> for RcKey {
    type Error = u32;

    /// Looks up the named key for a raw code. Returns the code back if the key
    /// has no name.
    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::iter().find(|key| key.value() == code).ok_or(code)
    }
}
