//! Scoped kernel-object handle.
//!
//! [`OwnedHandle`] wraps a raw `HANDLE` and calls `CloseHandle` on `Drop`,
//! so job, process and console handles are released on every exit path.
//! Use [`OwnedHandle::close`] when the caller needs to see a close failure,
//! and [`OwnedHandle::into_raw`] to hand ownership across the C ABI.
//!
//! The raw value is stored as `isize` rather than `HANDLE` so the wrapper is
//! `Send` (kernel handles are process-wide) and the type exists on every
//! target.

#[cfg(windows)]
use crate::errors::Result;

/// Raw value of `INVALID_HANDLE_VALUE`.
pub const INVALID_HANDLE_VALUE: isize = -1;

/// Owning wrapper around a kernel handle.
#[must_use = "dropping an OwnedHandle closes it immediately"]
#[derive(Debug, PartialEq, Eq)]
pub struct OwnedHandle {
    raw: isize,
}

impl OwnedHandle {
    /// Take ownership of a raw handle value.
    ///
    /// # Safety
    ///
    /// `raw` must be a handle owned by the caller that nothing else will
    /// close.  Null and `INVALID_HANDLE_VALUE` are accepted and never closed.
    pub unsafe fn from_raw(raw: isize) -> Self {
        Self { raw }
    }

    /// Raw handle value, still owned by `self`.
    pub fn as_raw(&self) -> isize {
        self.raw
    }

    /// `false` for null and `INVALID_HANDLE_VALUE`.
    pub fn is_valid(&self) -> bool {
        is_valid_raw(self.raw)
    }

    /// Release ownership without closing.  The caller must close the value.
    pub fn into_raw(self) -> isize {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }

    /// Close the handle now and report the OS result.
    #[cfg(windows)]
    pub fn close(self) -> Result<()> {
        let raw = self.into_raw();
        close_handle(raw)
    }

    #[cfg(windows)]
    pub(crate) fn as_handle(&self) -> windows::Win32::Foundation::HANDLE {
        to_handle(self.raw)
    }
}

#[cfg(windows)]
impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.is_valid() {
            return;
        }
        if let Err(e) = close_handle(self.raw) {
            log::warn!("dropping handle 0x{:X}: {e}", self.raw);
        }
    }
}

/// Whether a raw handle value refers to something closable.
pub fn is_valid_raw(raw: isize) -> bool {
    raw != 0 && raw != INVALID_HANDLE_VALUE
}

#[cfg(windows)]
pub(crate) fn to_handle(raw: isize) -> windows::Win32::Foundation::HANDLE {
    windows::Win32::Foundation::HANDLE(raw as *mut core::ffi::c_void)
}

/// Forward `CloseHandle` for a handle the caller manages itself.
///
/// A handle that was never opened (or was already closed) fails with the
/// OS error, typically `ERROR_INVALID_HANDLE` (6).
#[cfg(windows)]
pub fn close_handle(raw: isize) -> Result<()> {
    use crate::errors::from_windows;
    use windows::Win32::Foundation::CloseHandle;

    unsafe { CloseHandle(to_handle(raw)) }.map_err(|e| from_windows("CloseHandle", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_of_sentinels() {
        assert!(!is_valid_raw(0));
        assert!(!is_valid_raw(INVALID_HANDLE_VALUE));
        assert!(is_valid_raw(0x1234));
    }

    #[test]
    fn test_into_raw_returns_value() {
        let h = unsafe { OwnedHandle::from_raw(0) };
        assert!(!h.is_valid());
        assert_eq!(h.into_raw(), 0);
    }

    #[test]
    fn test_invalid_handle_drop_is_noop() {
        let h = unsafe { OwnedHandle::from_raw(INVALID_HANDLE_VALUE) };
        assert_eq!(h.as_raw(), -1);
        drop(h);
    }

    #[cfg(windows)]
    #[test]
    fn test_close_never_opened_handle_fails() {
        // 0x7FFF_FFF0 is far outside any handle table this process has.
        let err = close_handle(0x7FFF_FFF0).unwrap_err();
        assert_ne!(err.code(), 0);
    }
}
