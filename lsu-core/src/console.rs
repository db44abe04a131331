//! Console input injection via `CONIN$` and `WriteConsoleInputW`.
//!
//! [`ConsoleInput`] opens the attached console's input buffer with fixed
//! write-only flags and writes [`KeyEvent`]s into it.  Writes report a
//! composite [`WriteOutcome`] (success flag, events written, last-error
//! code) rather than a `Result`, mirroring what the native call hands back.

use serde::Serialize;

#[cfg(windows)]
use crate::record::KeyEvent;

/// Composite result of a console input write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub events_written: u32,
    /// Last-error code read immediately after the call; 0 on success.
    pub last_error: u32,
}

impl WriteOutcome {
    /// Outcome for a write that never reached the OS call.
    pub fn failed(last_error: u32) -> Self {
        Self {
            success: false,
            events_written: 0,
            last_error,
        }
    }
}

#[cfg(windows)]
pub use self::win::{write_char_to_console_input, write_events_raw, ConsoleInput};

#[cfg(windows)]
mod win {
    use windows::core::w;
    use windows::Win32::Foundation::{BOOL, HANDLE};
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_WRITE, OPEN_EXISTING,
    };
    use windows::Win32::System::Console::{
        WriteConsoleInputW, INPUT_RECORD, INPUT_RECORD_0, KEY_EVENT_RECORD, KEY_EVENT_RECORD_0,
    };

    use super::*;
    use crate::errors::{clear_last_error, from_windows, last_error_code, Result};
    use crate::handle::{to_handle, OwnedHandle};
    use crate::record::{InputRecord, INPUT_RECORD_SIZE, KEY_EVENT_RECORD_SIZE};

    /// `GENERIC_WRITE` access right.
    const GENERIC_WRITE_ACCESS: u32 = 0x4000_0000;

    const _: () = assert!(std::mem::size_of::<INPUT_RECORD>() == INPUT_RECORD_SIZE);
    const _: () = assert!(std::mem::size_of::<KEY_EVENT_RECORD>() == KEY_EVENT_RECORD_SIZE);

    fn to_native(record: &InputRecord) -> INPUT_RECORD {
        let k = &record.key_event;
        INPUT_RECORD {
            EventType: record.event_type,
            Event: INPUT_RECORD_0 {
                KeyEvent: KEY_EVENT_RECORD {
                    bKeyDown: BOOL(k.key_down),
                    wRepeatCount: k.repeat_count,
                    wVirtualKeyCode: k.virtual_key_code,
                    wVirtualScanCode: k.virtual_scan_code,
                    uChar: KEY_EVENT_RECORD_0 {
                        UnicodeChar: k.unicode_char,
                    },
                    dwControlKeyState: k.control_key_state,
                },
            },
        }
    }

    /// Write-only handle to the console input buffer.
    #[derive(Debug)]
    pub struct ConsoleInput {
        handle: OwnedHandle,
    }

    impl ConsoleInput {
        /// Open `CONIN$` with `GENERIC_WRITE`, `FILE_SHARE_WRITE`,
        /// `OPEN_EXISTING` and no flags.
        ///
        /// Fails (typically `ERROR_INVALID_HANDLE` or
        /// `ERROR_FILE_NOT_FOUND`) when the process has no console.
        pub fn open() -> Result<Self> {
            let handle = unsafe {
                CreateFileW(
                    w!("CONIN$"),
                    GENERIC_WRITE_ACCESS,
                    FILE_SHARE_WRITE,
                    None,
                    OPEN_EXISTING,
                    FILE_FLAGS_AND_ATTRIBUTES(0),
                    HANDLE::default(),
                )
            }
            .map_err(|e| from_windows("CreateFileW(CONIN$)", e))?;

            Ok(Self {
                handle: unsafe { OwnedHandle::from_raw(handle.0 as isize) },
            })
        }

        /// Adopt an already open console input handle.
        pub fn from_handle(handle: OwnedHandle) -> Self {
            Self { handle }
        }

        pub fn handle(&self) -> &OwnedHandle {
            &self.handle
        }

        pub fn into_handle(self) -> OwnedHandle {
            self.handle
        }

        /// Write `events` in one `WriteConsoleInputW` call.
        pub fn write(&self, events: &[KeyEvent]) -> WriteOutcome {
            write_events_raw(self.handle.as_raw(), events)
        }

        pub fn write_one(&self, event: KeyEvent) -> WriteOutcome {
            self.write(std::slice::from_ref(&event))
        }
    }

    /// Forward `WriteConsoleInputW` on a raw handle the caller owns.
    pub fn write_events_raw(handle: isize, events: &[KeyEvent]) -> WriteOutcome {
        let records: Vec<INPUT_RECORD> = events.iter().map(|e| to_native(&e.to_record())).collect();
        let mut written = 0u32;

        clear_last_error();
        let result = unsafe { WriteConsoleInputW(to_handle(handle), &records, &mut written) };
        match result {
            Ok(()) => WriteOutcome {
                success: true,
                events_written: written,
                last_error: last_error_code(),
            },
            Err(e) => {
                let err = from_windows("WriteConsoleInputW", e);
                WriteOutcome {
                    success: false,
                    events_written: written,
                    last_error: err.code(),
                }
            }
        }
    }

    /// Open `CONIN$` and write the fixed "L" key-up record.
    ///
    /// An open failure is reported in the outcome with zero events written.
    pub fn write_char_to_console_input() -> WriteOutcome {
        match ConsoleInput::open() {
            Ok(conin) => conin.write_one(KeyEvent::letter_l_release()),
            Err(e) => WriteOutcome::failed(e.code()),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::record::ControlKeyState;

        #[test]
        fn test_native_record_fields() {
            let native = to_native(&KeyEvent::letter_l_release().to_record());
            assert_eq!(native.EventType, 1);
            let k = unsafe { native.Event.KeyEvent };
            assert!(!k.bKeyDown.as_bool());
            assert_eq!(k.wRepeatCount, 1);
            assert_eq!(k.wVirtualKeyCode, 0x4C);
            assert_eq!(k.wVirtualScanCode, 0);
            assert_eq!(unsafe { k.uChar.UnicodeChar }, 'L' as u16);
            assert_eq!(k.dwControlKeyState, 0);
        }

        #[test]
        fn test_native_record_carries_modifiers() {
            let ev = KeyEvent::key(0x43).control_state(ControlKeyState::LEFT_CTRL_PRESSED);
            let native = to_native(&ev.to_record());
            let k = unsafe { native.Event.KeyEvent };
            assert!(k.bKeyDown.as_bool());
            assert_eq!(k.dwControlKeyState, 0x0008);
        }

        #[test]
        fn test_write_to_invalid_handle_reports_failure() {
            let outcome = write_events_raw(0, &[KeyEvent::letter_l_release()]);
            assert!(!outcome.success);
            assert_eq!(outcome.events_written, 0);
            assert_ne!(outcome.last_error, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_outcome_serialization() {
        let o = WriteOutcome {
            success: true,
            events_written: 1,
            last_error: 0,
        };
        let json = serde_json::to_string(&o).unwrap();
        assert_eq!(json, r#"{"success":true,"events_written":1,"last_error":0}"#);
    }

    #[test]
    fn test_failed_outcome() {
        let o = WriteOutcome::failed(6);
        assert!(!o.success);
        assert_eq!(o.events_written, 0);
        assert_eq!(o.last_error, 6);
    }
}
