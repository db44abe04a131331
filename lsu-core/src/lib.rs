//! `lsu_native` -- Pure Rust bindings for Windows job objects, thread window
//! queries and console input injection.
//!
//! Every operation forwards to one Win32 call and surfaces the OS result
//! unchanged.  This crate is consumed by:
//! - `lsu-native-ffi` (C ABI DLL for C# / PowerShell / ctypes)
//! - `lsu-native-cli` (diagnostic command-line tools)
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`errors`] | `NativeError` enum via `thiserror`, raw last-error codes |
//! | [`handle`] | `OwnedHandle` RAII wrapper, `CloseHandle` forwarding |
//! | [`job`] | Job objects: create, query, set, assign |
//! | [`window`] | `EnumThreadWindows`, visibility, style bits, rectangles |
//! | [`record`] | Byte-exact `INPUT_RECORD` / `KEY_EVENT_RECORD` mirrors |
//! | [`console`] | `CONIN$` input buffer writes |
//!
//! Data types and record layouts build on every target; the calls into
//! the OS exist only on Windows.

pub mod console;
pub mod errors;
pub mod handle;
pub mod job;
pub mod record;
pub mod window;

pub use errors::{NativeError, Result};
pub use record::{ControlKeyState, KeyEvent};
