//! Byte-exact console input records.
//!
//! [`KeyEventRecord`] and [`InputRecord`] mirror the native
//! `KEY_EVENT_RECORD` / `INPUT_RECORD` layout field for field, so they can be
//! checked on any host.  [`KeyEvent`] is the owned, builder-style description
//! that callers actually construct.
//!
//! Native layout (little-endian, 4-byte alignment):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0  | 2 | `EventType` |
//! | 2  | 2 | padding |
//! | 4  | 4 | `bKeyDown` (BOOL) |
//! | 8  | 2 | `wRepeatCount` |
//! | 10 | 2 | `wVirtualKeyCode` |
//! | 12 | 2 | `wVirtualScanCode` |
//! | 14 | 2 | `uChar.UnicodeChar` |
//! | 16 | 4 | `dwControlKeyState` |

use serde::Serialize;

use crate::errors::{NativeError, Result};

/// `INPUT_RECORD.EventType` value for keyboard events.
pub const KEY_EVENT: u16 = 0x0001;

/// Virtual key code of the "L" key.
pub const VK_L: u16 = 0x4C;

/// Size of a native `KEY_EVENT_RECORD`.
pub const KEY_EVENT_RECORD_SIZE: usize = 16;

/// Size of a native `INPUT_RECORD`.
pub const INPUT_RECORD_SIZE: usize = 20;

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// Mirror of `KEY_EVENT_RECORD`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyEventRecord {
    /// Win32 `BOOL`: non-zero for key down.
    pub key_down: i32,
    pub repeat_count: u16,
    pub virtual_key_code: u16,
    pub virtual_scan_code: u16,
    /// UTF-16 code unit (`uChar.UnicodeChar`).
    pub unicode_char: u16,
    pub control_key_state: u32,
}

/// Mirror of `INPUT_RECORD` restricted to the key-event arm of the union.
///
/// The key-event arm is the largest member of the native union, so the
/// size matches the full record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputRecord {
    pub event_type: u16,
    pub key_event: KeyEventRecord,
}

const _: () = assert!(std::mem::size_of::<KeyEventRecord>() == KEY_EVENT_RECORD_SIZE);
const _: () = assert!(std::mem::size_of::<InputRecord>() == INPUT_RECORD_SIZE);
const _: () = assert!(std::mem::align_of::<InputRecord>() == 4);

impl InputRecord {
    /// Serialize to the exact bytes the OS reads (padding zeroed).
    pub fn to_bytes(&self) -> [u8; INPUT_RECORD_SIZE] {
        let k = &self.key_event;
        let mut out = [0u8; INPUT_RECORD_SIZE];
        out[0..2].copy_from_slice(&self.event_type.to_le_bytes());
        out[4..8].copy_from_slice(&k.key_down.to_le_bytes());
        out[8..10].copy_from_slice(&k.repeat_count.to_le_bytes());
        out[10..12].copy_from_slice(&k.virtual_key_code.to_le_bytes());
        out[12..14].copy_from_slice(&k.virtual_scan_code.to_le_bytes());
        out[14..16].copy_from_slice(&k.unicode_char.to_le_bytes());
        out[16..20].copy_from_slice(&k.control_key_state.to_le_bytes());
        out
    }
}

// ---------------------------------------------------------------------------
// Control key state
// ---------------------------------------------------------------------------

/// `dwControlKeyState` bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ControlKeyState(pub u32);

impl ControlKeyState {
    pub const NONE: Self = Self(0);
    pub const RIGHT_ALT_PRESSED: Self = Self(0x0001);
    pub const LEFT_ALT_PRESSED: Self = Self(0x0002);
    pub const RIGHT_CTRL_PRESSED: Self = Self(0x0004);
    pub const LEFT_CTRL_PRESSED: Self = Self(0x0008);
    pub const SHIFT_PRESSED: Self = Self(0x0010);
    pub const NUMLOCK_ON: Self = Self(0x0020);
    pub const SCROLLLOCK_ON: Self = Self(0x0040);
    pub const CAPSLOCK_ON: Self = Self(0x0080);
    pub const ENHANCED_KEY: Self = Self(0x0100);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ControlKeyState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// KeyEvent
// ---------------------------------------------------------------------------

/// One synthetic keypress, owned and serializable.
///
/// Defaults to a key-down event with repeat count 1 and no character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyEvent {
    pub key_down: bool,
    pub repeat_count: u16,
    pub virtual_key_code: u16,
    pub virtual_scan_code: u16,
    pub unicode_char: u16,
    pub control_key_state: ControlKeyState,
}

impl KeyEvent {
    /// Key-down event for a virtual key code.
    pub fn key(virtual_key_code: u16) -> Self {
        Self {
            key_down: true,
            repeat_count: 1,
            virtual_key_code,
            virtual_scan_code: 0,
            unicode_char: 0,
            control_key_state: ControlKeyState::NONE,
        }
    }

    /// The fixed record LSU diagnostics write: "L" key released, character
    /// 'L', repeat 1, no scan code, no modifiers.
    pub fn letter_l_release() -> Self {
        Self {
            key_down: false,
            repeat_count: 1,
            virtual_key_code: VK_L,
            virtual_scan_code: 0,
            unicode_char: 'L' as u16,
            control_key_state: ControlKeyState::NONE,
        }
    }

    /// Attach a character.  Characters outside the BMP need two UTF-16 units
    /// and cannot be carried by a single record.
    pub fn with_char(mut self, ch: char) -> Result<Self> {
        let mut buf = [0u16; 2];
        let units = ch.encode_utf16(&mut buf);
        if units.len() != 1 {
            return Err(NativeError::InvalidArgument(format!(
                "character U+{:04X} does not fit one UTF-16 unit",
                ch as u32
            )));
        }
        self.unicode_char = units[0];
        Ok(self)
    }

    pub fn pressed(mut self) -> Self {
        self.key_down = true;
        self
    }

    pub fn released(mut self) -> Self {
        self.key_down = false;
        self
    }

    pub fn repeat(mut self, count: u16) -> Self {
        self.repeat_count = count;
        self
    }

    pub fn scan_code(mut self, scan: u16) -> Self {
        self.virtual_scan_code = scan;
        self
    }

    pub fn control_state(mut self, state: ControlKeyState) -> Self {
        self.control_key_state = state;
        self
    }

    /// Lay the event out as a native `INPUT_RECORD`.
    pub fn to_record(&self) -> InputRecord {
        InputRecord {
            event_type: KEY_EVENT,
            key_event: KeyEventRecord {
                key_down: i32::from(self.key_down),
                repeat_count: self.repeat_count,
                virtual_key_code: self.virtual_key_code,
                virtual_scan_code: self.virtual_scan_code,
                unicode_char: self.unicode_char,
                control_key_state: self.control_key_state.0,
            },
        }
    }
}

impl From<KeyEventRecord> for KeyEvent {
    fn from(raw: KeyEventRecord) -> Self {
        Self {
            key_down: raw.key_down != 0,
            repeat_count: raw.repeat_count,
            virtual_key_code: raw.virtual_key_code,
            virtual_scan_code: raw.virtual_scan_code,
            unicode_char: raw.unicode_char,
            control_key_state: ControlKeyState(raw.control_key_state),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
