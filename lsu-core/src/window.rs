//! Thread window enumeration and window queries via Win32 API.
//!
//! Each query forwards to the matching `user32` call.  Window handles are
//! non-owning [`WindowHandle`] values; results are owned, serializable
//! snapshots.

use serde::Serialize;

use crate::errors::{NativeError, Result};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Non-owning `HWND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WindowHandle(pub isize);

/// Window bounding rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// `GetWindowLongW` index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum StyleIndex {
    /// `GWL_STYLE`
    Style = -16,
    /// `GWL_EXSTYLE`
    ExStyle = -20,
    /// `GWL_ID`
    Id = -12,
}

impl StyleIndex {
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for StyleIndex {
    type Error = NativeError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            -16 => Ok(StyleIndex::Style),
            -20 => Ok(StyleIndex::ExStyle),
            -12 => Ok(StyleIndex::Id),
            other => Err(NativeError::InvalidArgument(format!(
                "unsupported window long index {other}"
            ))),
        }
    }
}

/// Style bits commonly inspected on thread windows.
pub mod style {
    pub const WS_POPUP: u32 = 0x8000_0000;
    pub const WS_CHILD: u32 = 0x4000_0000;
    pub const WS_VISIBLE: u32 = 0x1000_0000;
    pub const WS_DISABLED: u32 = 0x0800_0000;
    pub const WS_CAPTION: u32 = 0x00C0_0000;

    pub const WS_EX_TOPMOST: u32 = 0x0000_0008;
    pub const WS_EX_TOOLWINDOW: u32 = 0x0000_0080;
    pub const WS_EX_APPWINDOW: u32 = 0x0004_0000;
    pub const WS_EX_NOACTIVATE: u32 = 0x0800_0000;
}

/// Owned snapshot of one window belonging to a thread.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadWindowInfo {
    pub hwnd: WindowHandle,
    pub is_visible: bool,
    pub style: u32,
    pub ex_style: u32,
    pub rect: WindowRect,
}

impl ThreadWindowInfo {
    pub fn has_style(&self, bits: u32) -> bool {
        self.style & bits == bits
    }

    pub fn has_ex_style(&self, bits: u32) -> bool {
        self.ex_style & bits == bits
    }
}

// ---------------------------------------------------------------------------
// Public API (Windows)
// ---------------------------------------------------------------------------

#[cfg(windows)]
pub use self::win::{
    enum_thread_windows, is_window_visible, thread_window_info, thread_windows, window_long,
    window_rect,
};

#[cfg(windows)]
mod win {
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumThreadWindows, GetWindowLongW, GetWindowRect, IsWindowVisible, WINDOW_LONG_PTR_INDEX,
    };

    use super::*;
    use crate::errors::{clear_last_error, from_windows, last_error_code};

    fn to_hwnd(handle: WindowHandle) -> HWND {
        HWND(handle.0 as *mut core::ffi::c_void)
    }

    /// Trampoline handed to `EnumThreadWindows`; `lparam` carries `&mut F`.
    ///
    /// Panics must not unwind across the `extern "system"` boundary; a
    /// panicking callback stops the enumeration.
    unsafe extern "system" fn enum_callback<F>(hwnd: HWND, lparam: LPARAM) -> BOOL
    where
        F: FnMut(WindowHandle) -> bool,
    {
        let callback = unsafe { &mut *(lparam.0 as *mut F) };
        let handle = WindowHandle(hwnd.0 as isize);
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(handle))) {
            Ok(keep_going) => BOOL::from(keep_going),
            Err(_) => {
                log::error!("window enumeration callback panicked at 0x{:X}", handle.0);
                BOOL::from(false)
            }
        }
    }

    /// Forward `EnumThreadWindows`, calling `callback` once per window.
    ///
    /// Returning `false` from the callback stops the enumeration.  The result
    /// is the native BOOL: `Ok(false)` when the callback stopped early or the
    /// thread has no windows, `Err` when the OS set a last-error code.
    pub fn enum_thread_windows<F>(thread_id: u32, mut callback: F) -> Result<bool>
    where
        F: FnMut(WindowHandle) -> bool,
    {
        clear_last_error();
        let ok = unsafe {
            EnumThreadWindows(
                thread_id,
                Some(enum_callback::<F>),
                LPARAM(&mut callback as *mut F as isize),
            )
        };
        if ok.as_bool() {
            return Ok(true);
        }
        match last_error_code() {
            0 => Ok(false),
            code => {
                log::debug!("EnumThreadWindows({thread_id}) failed: {code}");
                Err(NativeError::win32("EnumThreadWindows", code))
            }
        }
    }

    /// Collect every window owned by `thread_id`.
    pub fn thread_windows(thread_id: u32) -> Result<Vec<WindowHandle>> {
        let mut handles = Vec::new();
        enum_thread_windows(thread_id, |hwnd| {
            handles.push(hwnd);
            true
        })?;
        Ok(handles)
    }

    /// Forward `IsWindowVisible`.  A window that does not exist is not
    /// visible.
    pub fn is_window_visible(hwnd: WindowHandle) -> bool {
        unsafe { IsWindowVisible(to_hwnd(hwnd)) }.as_bool()
    }

    /// Forward `GetWindowLongW`.
    ///
    /// A zero return is only an error when the OS set a last-error code;
    /// the code is cleared first so a genuine zero value is not misread.
    pub fn window_long(hwnd: WindowHandle, index: StyleIndex) -> Result<u32> {
        clear_last_error();
        let value =
            unsafe { GetWindowLongW(to_hwnd(hwnd), WINDOW_LONG_PTR_INDEX(index.as_raw())) } as u32;
        if value == 0 {
            let code = last_error_code();
            if code != 0 {
                log::debug!("GetWindowLongW(0x{:X}, {index:?}) failed: {code}", hwnd.0);
                return Err(NativeError::win32("GetWindowLongW", code));
            }
        }
        Ok(value)
    }

    /// Forward `GetWindowRect`.
    pub fn window_rect(hwnd: WindowHandle) -> Result<WindowRect> {
        let mut raw = RECT::default();
        unsafe { GetWindowRect(to_hwnd(hwnd), &mut raw) }
            .map_err(|e| from_windows("GetWindowRect", e))?;
        Ok(WindowRect {
            left: raw.left,
            top: raw.top,
            right: raw.right,
            bottom: raw.bottom,
        })
    }

    /// Snapshot every window of `thread_id`.
    ///
    /// Windows destroyed between enumeration and query are skipped.
    pub fn thread_window_info(thread_id: u32, visible_only: bool) -> Result<Vec<ThreadWindowInfo>> {
        let handles = thread_windows(thread_id)?;
        let mut infos = Vec::with_capacity(handles.len());
        for hwnd in handles {
            let is_visible = is_window_visible(hwnd);
            if visible_only && !is_visible {
                continue;
            }
            let snapshot = (|| -> Result<ThreadWindowInfo> {
                Ok(ThreadWindowInfo {
                    hwnd,
                    is_visible,
                    style: window_long(hwnd, StyleIndex::Style)?,
                    ex_style: window_long(hwnd, StyleIndex::ExStyle)?,
                    rect: window_rect(hwnd)?,
                })
            })();
            match snapshot {
                Ok(info) => infos.push(info),
                Err(e) => log::debug!("skipping window 0x{:X}: {e}", hwnd.0),
            }
        }
        Ok(infos)
    }

}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rect_serialization() {
        let r = WindowRect {
            left: 10,
            top: 20,
            right: 110,
            bottom: 70,
        };
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"left":10,"top":20,"right":110,"bottom":70}"#);
        assert_eq!(r.width(), 100);
        assert_eq!(r.height(), 50);
    }

    #[test]
    fn test_style_index_values() {
        assert_eq!(StyleIndex::Style.as_raw(), -16);
        assert_eq!(StyleIndex::ExStyle.as_raw(), -20);
        assert_eq!(StyleIndex::try_from(-12).unwrap(), StyleIndex::Id);
        assert!(StyleIndex::try_from(0).is_err());
    }

    #[test]
    fn test_thread_window_info_style_bits() {
        let info = ThreadWindowInfo {
            hwnd: WindowHandle(0x10),
            is_visible: true,
            style: style::WS_VISIBLE | style::WS_POPUP,
            ex_style: style::WS_EX_TOPMOST,
            rect: WindowRect::default(),
        };
        assert!(info.has_style(style::WS_VISIBLE));
        assert!(info.has_style(style::WS_VISIBLE | style::WS_POPUP));
        assert!(!info.has_style(style::WS_DISABLED));
        assert!(info.has_ex_style(style::WS_EX_TOPMOST));
        assert!(!info.has_ex_style(style::WS_EX_TOOLWINDOW));

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"hwnd\":16"));
        assert!(json.contains("\"is_visible\":true"));
    }
}
