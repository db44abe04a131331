//! Error types for `lsu_native`.
//!
//! Every OS failure is funnelled through [`NativeError::Win32`], which keeps
//! the raw last-error code exactly as the system reported it.  Nothing is
//! translated into a higher-level taxonomy; callers match on
//! [`NativeError::code`].

use thiserror::Error;

/// Convenience alias used by every fallible binding.
pub type Result<T> = std::result::Result<T, NativeError>;

/// Top-level error type for the `lsu_native` library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// A forwarded Win32 call failed.  `code` is the thread's last-error
    /// value read immediately after the call.
    #[error("{call} failed with Win32 error {code} (0x{code:08X})")]
    Win32 { call: &'static str, code: u32 },

    /// Argument rejected before reaching the OS (interior NUL in a name,
    /// buffer larger than `u32::MAX`, ...).
    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),
}

impl NativeError {
    /// Build a `Win32` error from a raw last-error code.
    pub fn win32(call: &'static str, code: u32) -> Self {
        NativeError::Win32 { call, code }
    }

    /// Raw OS error code, or 0 when the error did not come from the OS.
    pub fn code(&self) -> u32 {
        match self {
            NativeError::Win32 { code, .. } => *code,
            NativeError::InvalidArgument(_) => 0,
        }
    }
}

/// `HRESULT_FROM_WIN32` facility prefix.
const FACILITY_WIN32_PREFIX: u32 = 0x8007_0000;

/// Undo `HRESULT_FROM_WIN32` so the caller sees the plain Win32 code.
///
/// HRESULTs outside the Win32 facility are returned bit-for-bit.
pub fn win32_code_from_hresult(hresult: i32) -> u32 {
    let value = hresult as u32;
    if value & 0xFFFF_0000 == FACILITY_WIN32_PREFIX {
        value & 0xFFFF
    } else {
        value
    }
}

/// Attach the call name to a `windows::core::Error` and recover the raw code.
#[cfg(windows)]
pub(crate) fn from_windows(call: &'static str, err: windows::core::Error) -> NativeError {
    let code = win32_code_from_hresult(err.code().0);
    log::debug!("{call} failed: {err}");
    NativeError::Win32 { call, code }
}

/// Read the calling thread's last-error code.
#[cfg(windows)]
pub fn last_error_code() -> u32 {
    unsafe { windows::Win32::Foundation::GetLastError() }.0
}

/// Reset the calling thread's last-error code to zero.
///
/// Needed before APIs whose success value can legitimately be zero.
#[cfg(windows)]
pub(crate) fn clear_last_error() {
    use windows::Win32::Foundation::{SetLastError, WIN32_ERROR};
    unsafe { SetLastError(WIN32_ERROR(0)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hresult_from_win32_is_unwrapped() {
        // ERROR_INVALID_HANDLE (6) as HRESULT_FROM_WIN32
        assert_eq!(win32_code_from_hresult(0x8007_0006_u32 as i32), 6);
        // ERROR_ACCESS_DENIED (5)
        assert_eq!(win32_code_from_hresult(0x8007_0005_u32 as i32), 5);
    }

    #[test]
    fn test_non_win32_hresult_passes_through() {
        // E_POINTER lives in FACILITY_NULL
        assert_eq!(win32_code_from_hresult(0x8000_4003_u32 as i32), 0x8000_4003);
        assert_eq!(win32_code_from_hresult(0), 0);
    }

    #[test]
    fn test_error_code_accessor() {
        let e = NativeError::win32("CloseHandle", 6);
        assert_eq!(e.code(), 6);
        assert_eq!(NativeError::InvalidArgument("x".into()).code(), 0);
    }

    #[test]
    fn test_error_display_names_the_call() {
        let e = NativeError::win32("GetWindowRect", 1400);
        let msg = e.to_string();
        assert!(msg.contains("GetWindowRect"));
        assert!(msg.contains("1400"));
        assert!(msg.contains("0x00000578"));
    }
}
