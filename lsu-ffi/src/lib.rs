//! C ABI DLL for lsu-native -- loadable by C#, PowerShell, ctypes or any FFI
//! consumer.
//!
//! All exported functions follow the convention:
//! - Return `i32` status code: `LSU_OK=0`, `LSU_ERROR=-1`
//! - Handles are raw `isize` values owned by the caller; release them with
//!   `lsu_close_handle()`
//! - String outputs allocated by Rust, freed via `lsu_free_string()`
//! - Last error message via `lsu_last_error()`, raw Win32 code via
//!   `lsu_last_win32_error()`

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, CString};
use std::ptr;

use lsu_native::NativeError;
use serde::Serialize;

pub const LSU_OK: i32 = 0;
pub const LSU_ERROR: i32 = -1;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    static LAST_WIN32_ERROR: Cell<u32> = const { Cell::new(0) };
}

fn set_last_error(msg: &str, win32_code: u32) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
    LAST_WIN32_ERROR.with(|c| c.set(win32_code));
}

fn fail(err: &NativeError) -> i32 {
    log::debug!("ffi call failed: {err}");
    set_last_error(&err.to_string(), err.code());
    LSU_ERROR
}

fn fail_msg(msg: &str) -> i32 {
    set_last_error(msg, 0);
    LSU_ERROR
}

/// Serialize `value` into a heap C string stored at `out_json`.
///
/// # Safety
///
/// `out_json` must be non-null and valid for writes.
unsafe fn write_json<T: Serialize>(value: &T, out_json: *mut *mut c_char) -> i32 {
    match serde_json::to_string(value) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => {
                unsafe { *out_json = cstr.into_raw() };
                LSU_OK
            }
            Err(e) => fail_msg(&format!("CString conversion failed: {e}")),
        },
        Err(e) => fail_msg(&format!("JSON serialization failed: {e}")),
    }
}

/// Retrieve the last error message (thread-local).
///
/// Returns a pointer valid until the next failing lsu_* call on this thread.
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn lsu_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Raw Win32 error code of the last failing lsu_* call on this thread.
///
/// 0 when the failure was detected before reaching the OS.
#[no_mangle]
pub extern "C" fn lsu_last_win32_error() -> u32 {
    LAST_WIN32_ERROR.with(|c| c.get())
}

/// Free a string previously allocated by a lsu_* function.
///
/// # Safety
///
/// `ptr` must be a pointer returned by a lsu_* function or null.
#[no_mangle]
pub unsafe extern "C" fn lsu_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Window rectangle as returned by `lsu_get_window_rect`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LsuRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Composite console write result.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LsuWriteOutcome {
    /// Non-zero when `WriteConsoleInputW` succeeded.
    pub success: i32,
    pub events_written: u32,
    pub last_error: u32,
}

impl From<lsu_native::console::WriteOutcome> for LsuWriteOutcome {
    fn from(o: lsu_native::console::WriteOutcome) -> Self {
        Self {
            success: i32::from(o.success),
            events_written: o.events_written,
            last_error: o.last_error,
        }
    }
}

impl From<lsu_native::window::WindowRect> for LsuRect {
    fn from(r: lsu_native::window::WindowRect) -> Self {
        Self {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
        }
    }
}

/// Per-window callback for `lsu_enum_thread_windows`: `(hwnd, user_data)`.
/// Return non-zero to continue.
pub type LsuEnumWindowsProc = unsafe extern "system" fn(hwnd: isize, user_data: isize) -> i32;

#[cfg(windows)]
pub use self::win::*;

#[cfg(windows)]
mod win {
    use std::ffi::{c_void, CStr};
    use std::mem::ManuallyDrop;

    use lsu_native::console::{self, ConsoleInput};
    use lsu_native::handle::{close_handle, OwnedHandle};
    use lsu_native::job::{assign_process_raw, JobInfoClass, JobObject};
    use lsu_native::record::KeyEventRecord;
    use lsu_native::window::{self, StyleIndex, WindowHandle};
    use lsu_native::KeyEvent;

    use super::*;

    /// View a caller-owned job handle without taking ownership.
    fn borrow_job(raw: isize) -> ManuallyDrop<JobObject> {
        ManuallyDrop::new(JobObject::from_handle(unsafe { OwnedHandle::from_raw(raw) }))
    }

    /// Create a job object.  `name` may be null for an anonymous job.
    ///
    /// # Safety
    ///
    /// `name` must be null or a valid null-terminated UTF-8 C string.
    /// `out_handle` must be a valid pointer; the handle written there is
    /// owned by the caller.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_job_create(name: *const c_char, out_handle: *mut isize) -> i32 {
        if out_handle.is_null() {
            return fail_msg("out_handle is null");
        }

        let name = if name.is_null() {
            None
        } else {
            match unsafe { CStr::from_ptr(name) }.to_str() {
                Ok(s) => Some(s),
                Err(e) => return fail_msg(&format!("Invalid UTF-8: {e}")),
            }
        };

        match JobObject::create(name) {
            Ok(job) => {
                unsafe { *out_handle = job.into_handle().into_raw() };
                LSU_OK
            }
            Err(e) => fail(&e),
        }
    }

    /// Open an existing named job (`OpenJobObjectW`).
    ///
    /// # Safety
    ///
    /// `name` must be a valid NUL-terminated string; `out_handle` must be
    /// valid for a write.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_job_open(
        name: *const c_char,
        desired_access: u32,
        out_handle: *mut isize,
    ) -> i32 {
        if name.is_null() || out_handle.is_null() {
            return fail_msg("name or out_handle is null");
        }
        let name = match unsafe { CStr::from_ptr(name) }.to_str() {
            Ok(s) => s,
            Err(e) => return fail_msg(&format!("Invalid UTF-8: {e}")),
        };

        match JobObject::open_with_access(name, desired_access) {
            Ok(job) => {
                unsafe { *out_handle = job.into_handle().into_raw() };
                LSU_OK
            }
            Err(e) => fail(&e),
        }
    }

    /// Forward `QueryInformationJobObject`.
    ///
    /// # Safety
    ///
    /// `info` must be valid for writes of `len` bytes and aligned for the
    /// structure `class` selects.  `out_written` may be null.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_job_query(
        job: isize,
        class: i32,
        info: *mut c_void,
        len: u32,
        out_written: *mut u32,
    ) -> i32 {
        if info.is_null() {
            return fail_msg("info is null");
        }
        let class = match JobInfoClass::try_from(class) {
            Ok(c) => c,
            Err(e) => return fail(&e),
        };

        match unsafe { borrow_job(job).query_information_raw(class, info, len) } {
            Ok(written) => {
                if !out_written.is_null() {
                    unsafe { *out_written = written };
                }
                LSU_OK
            }
            Err(e) => fail(&e),
        }
    }

    /// Forward `SetInformationJobObject`.
    ///
    /// # Safety
    ///
    /// `info` must be valid for reads of `len` bytes.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_job_set(job: isize, class: i32, info: *const c_void, len: u32) -> i32 {
        if info.is_null() {
            return fail_msg("info is null");
        }
        let class = match JobInfoClass::try_from(class) {
            Ok(c) => c,
            Err(e) => return fail(&e),
        };

        match unsafe { borrow_job(job).set_information_raw(class, info, len) } {
            Ok(()) => LSU_OK,
            Err(e) => fail(&e),
        }
    }

    /// Forward `AssignProcessToJobObject`.
    #[no_mangle]
    pub extern "C" fn lsu_job_assign(job: isize, process: isize) -> i32 {
        match assign_process_raw(job, process) {
            Ok(()) => LSU_OK,
            Err(e) => fail(&e),
        }
    }

    /// Ids of the processes in a job as a JSON string.
    ///
    /// # Safety
    ///
    /// `out_json` must be a valid pointer; free the result with
    /// `lsu_free_string()`.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_job_process_ids(job: isize, out_json: *mut *mut c_char) -> i32 {
        if out_json.is_null() {
            return fail_msg("out_json is null");
        }
        match borrow_job(job).process_ids() {
            Ok(list) => unsafe { write_json(&list, out_json) },
            Err(e) => fail(&e),
        }
    }

    /// Forward `CloseHandle`.
    #[no_mangle]
    pub extern "C" fn lsu_close_handle(handle: isize) -> i32 {
        match close_handle(handle) {
            Ok(()) => LSU_OK,
            Err(e) => fail(&e),
        }
    }

    /// Forward `EnumThreadWindows`.
    ///
    /// `*out_completed` (optional) receives the native BOOL: 1 when every
    /// window was visited, 0 when the callback stopped early or the thread
    /// has no windows.
    ///
    /// # Safety
    ///
    /// `callback` must be safe to call with `user_data` for every window.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_enum_thread_windows(
        thread_id: u32,
        callback: Option<LsuEnumWindowsProc>,
        user_data: isize,
        out_completed: *mut i32,
    ) -> i32 {
        let Some(callback) = callback else {
            return fail_msg("callback is null");
        };

        let result = window::enum_thread_windows(thread_id, |hwnd: WindowHandle| unsafe {
            callback(hwnd.0, user_data) != 0
        });
        match result {
            Ok(all) => {
                if !out_completed.is_null() {
                    unsafe { *out_completed = i32::from(all) };
                }
                LSU_OK
            }
            Err(e) => fail(&e),
        }
    }

    /// Forward `IsWindowVisible`.  Returns 1 or 0, never an error.
    #[no_mangle]
    pub extern "C" fn lsu_is_window_visible(hwnd: isize) -> i32 {
        i32::from(window::is_window_visible(WindowHandle(hwnd)))
    }

    /// Forward `GetWindowLongW` for `GWL_STYLE` (-16), `GWL_EXSTYLE` (-20)
    /// or `GWL_ID` (-12).
    ///
    /// # Safety
    ///
    /// `out_value` must be a valid pointer.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_get_window_long(hwnd: isize, index: i32, out_value: *mut u32) -> i32 {
        if out_value.is_null() {
            return fail_msg("out_value is null");
        }
        let index = match StyleIndex::try_from(index) {
            Ok(i) => i,
            Err(e) => return fail(&e),
        };
        match window::window_long(WindowHandle(hwnd), index) {
            Ok(value) => {
                unsafe { *out_value = value };
                LSU_OK
            }
            Err(e) => fail(&e),
        }
    }

    /// Forward `GetWindowRect`.
    ///
    /// # Safety
    ///
    /// `out_rect` must be a valid pointer.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_get_window_rect(hwnd: isize, out_rect: *mut LsuRect) -> i32 {
        if out_rect.is_null() {
            return fail_msg("out_rect is null");
        }
        match window::window_rect(WindowHandle(hwnd)) {
            Ok(rect) => {
                unsafe { *out_rect = rect.into() };
                LSU_OK
            }
            Err(e) => fail(&e),
        }
    }

    /// Snapshot a thread's windows as a JSON array.
    ///
    /// # Safety
    ///
    /// `out_json` must be a valid pointer; free the result with
    /// `lsu_free_string()`.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_thread_windows(
        thread_id: u32,
        visible_only: i32,
        out_json: *mut *mut c_char,
    ) -> i32 {
        if out_json.is_null() {
            return fail_msg("out_json is null");
        }
        match window::thread_window_info(thread_id, visible_only != 0) {
            Ok(infos) => unsafe { write_json(&infos, out_json) },
            Err(e) => fail(&e),
        }
    }

    /// Open `CONIN$` for writing.
    ///
    /// # Safety
    ///
    /// `out_handle` must be a valid pointer; the handle is owned by the
    /// caller.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_open_console_input(out_handle: *mut isize) -> i32 {
        if out_handle.is_null() {
            return fail_msg("out_handle is null");
        }
        match ConsoleInput::open() {
            Ok(conin) => {
                unsafe { *out_handle = conin.into_handle().into_raw() };
                LSU_OK
            }
            Err(e) => fail(&e),
        }
    }

    /// Write `count` key events (native `KEY_EVENT_RECORD` layout) to a
    /// console input handle.
    ///
    /// The status code reflects argument validation only; the OS result is
    /// in `*out_outcome`.
    ///
    /// # Safety
    ///
    /// `events` must point to `count` valid records; `out_outcome` must be a
    /// valid pointer.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_write_key_events(
        handle: isize,
        events: *const KeyEventRecord,
        count: u32,
        out_outcome: *mut LsuWriteOutcome,
    ) -> i32 {
        if events.is_null() || out_outcome.is_null() {
            return fail_msg("null pointer argument");
        }
        let raw = unsafe { std::slice::from_raw_parts(events, count as usize) };
        let events: Vec<KeyEvent> = raw.iter().copied().map(KeyEvent::from).collect();

        let outcome = console::write_events_raw(handle, &events);
        unsafe { *out_outcome = outcome.into() };
        LSU_OK
    }

    /// Open `CONIN$` and write the fixed "L" key-up event.
    ///
    /// # Safety
    ///
    /// `out_outcome` must be a valid pointer.
    #[no_mangle]
    pub unsafe extern "C" fn lsu_write_char_to_conin(out_outcome: *mut LsuWriteOutcome) -> i32 {
        if out_outcome.is_null() {
            return fail_msg("out_outcome is null");
        }
        let outcome = console::write_char_to_console_input();
        unsafe { *out_outcome = outcome.into() };
        LSU_OK
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_close_unknown_handle_sets_win32_error() {
            assert_eq!(lsu_close_handle(0x7FFF_FFF0), LSU_ERROR);
            assert_ne!(lsu_last_win32_error(), 0);
            assert!(!lsu_last_error().is_null());
        }

        #[test]
        fn test_job_roundtrip_through_c_abi() {
            let mut job: isize = 0;
            assert_eq!(unsafe { lsu_job_create(ptr::null(), &mut job) }, LSU_OK);
            assert_ne!(job, 0);

            let mut json: *mut c_char = ptr::null_mut();
            assert_eq!(unsafe { lsu_job_process_ids(job, &mut json) }, LSU_OK);
            let text = unsafe { CStr::from_ptr(json) }.to_str().unwrap().to_owned();
            unsafe { lsu_free_string(json) };
            assert!(text.contains("\"assigned\":0"));

            assert_eq!(lsu_close_handle(job), LSU_OK);
        }

        #[test]
        fn test_open_missing_job_reports_win32_code() {
            let name = CString::new(format!("lsu-ffi-missing-{}", std::process::id())).unwrap();
            let mut job = 0isize;
            let rc = unsafe { lsu_job_open(name.as_ptr(), lsu_native::job::access::JOB_OBJECT_QUERY, &mut job) };
            assert_eq!(rc, LSU_ERROR);
            assert_eq!(job, 0);
            assert_ne!(lsu_last_win32_error(), 0);
        }

        #[test]
        fn test_invalid_info_class_rejected() {
            let mut buf = [0u64; 8];
            let rc = unsafe { lsu_job_query(0, 8, buf.as_mut_ptr().cast(), 64, ptr::null_mut()) };
            assert_eq!(rc, LSU_ERROR);
            assert_eq!(lsu_last_win32_error(), 0);
        }

        #[test]
        fn test_missing_window_rect() {
            let mut rect = LsuRect::default();
            assert_eq!(unsafe { lsu_get_window_rect(0x7FFF_FFF0, &mut rect) }, LSU_ERROR);
            assert_eq!(lsu_last_win32_error(), 1400);
            assert_eq!(lsu_is_window_visible(0x7FFF_FFF0), 0);
        }

        #[test]
        fn test_write_to_null_console_handle() {
            let ev = KeyEvent::letter_l_release().to_record().key_event;
            let mut out = LsuWriteOutcome::default();
            assert_eq!(unsafe { lsu_write_key_events(0, &ev, 1, &mut out) }, LSU_OK);
            assert_eq!(out.success, 0);
            assert_ne!(out.last_error, 0);
        }
    }
}
