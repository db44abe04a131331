//! Job objects via the Win32 `JobObjects` API.
//!
//! [`JobObject`] owns its job handle through [`OwnedHandle`]; the raw
//! query / set / assign calls are forwarded unchanged and return the OS
//! error code on failure.  A few typed helpers (`process_ids`,
//! `set_kill_on_close`, `assign_process_id`) are built only from those
//! forwarded calls.

use serde::Serialize;

use crate::errors::{NativeError, Result};

/// `ERROR_MORE_DATA`: the process id list did not fit the buffer.
pub const ERROR_MORE_DATA: u32 = 234;

/// `ERROR_ALREADY_EXISTS`: a named job was opened rather than created.
pub const ERROR_ALREADY_EXISTS: u32 = 183;

/// Job access rights for [`JobObject::open_with_access`].
pub mod access {
    pub const JOB_OBJECT_ASSIGN_PROCESS: u32 = 0x0001;
    pub const JOB_OBJECT_SET_ATTRIBUTES: u32 = 0x0002;
    pub const JOB_OBJECT_QUERY: u32 = 0x0004;
    pub const JOB_OBJECT_TERMINATE: u32 = 0x0008;
    pub const JOB_OBJECT_ALL_ACCESS: u32 = 0x001F_003F;
}

// ---------------------------------------------------------------------------
// Information classes
// ---------------------------------------------------------------------------

/// `JOBOBJECTINFOCLASS` selectors understood by the query/set calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum JobInfoClass {
    BasicAccountingInformation = 1,
    BasicLimitInformation = 2,
    BasicProcessIdList = 3,
    BasicUIRestrictions = 4,
    SecurityLimitInformation = 5,
    EndOfJobTimeInformation = 6,
    AssociateCompletionPortInformation = 7,
    ExtendedLimitInformation = 9,
    GroupInformation = 11,
}

impl JobInfoClass {
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for JobInfoClass {
    type Error = NativeError;

    fn try_from(value: i32) -> Result<Self> {
        Ok(match value {
            1 => JobInfoClass::BasicAccountingInformation,
            2 => JobInfoClass::BasicLimitInformation,
            3 => JobInfoClass::BasicProcessIdList,
            4 => JobInfoClass::BasicUIRestrictions,
            5 => JobInfoClass::SecurityLimitInformation,
            6 => JobInfoClass::EndOfJobTimeInformation,
            7 => JobInfoClass::AssociateCompletionPortInformation,
            9 => JobInfoClass::ExtendedLimitInformation,
            11 => JobInfoClass::GroupInformation,
            other => {
                return Err(NativeError::InvalidArgument(format!(
                    "unsupported job information class {other}"
                )))
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Process id list
// ---------------------------------------------------------------------------

/// Decoded `JOBOBJECT_BASIC_PROCESS_ID_LIST`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessIdList {
    /// Processes currently in the job (may exceed `process_ids.len()`).
    pub assigned: u32,
    pub process_ids: Vec<u32>,
}

/// Size of the two `u32` counters that precede the id array.
const ID_LIST_HEADER: usize = 8;

/// Decode a `JOBOBJECT_BASIC_PROCESS_ID_LIST` buffer.
///
/// Ids are pointer-sized (`ULONG_PTR`) on the native side; only the low
/// 32 bits carry a process id.
pub fn parse_process_id_list(bytes: &[u8]) -> Result<ProcessIdList> {
    if bytes.len() < ID_LIST_HEADER {
        return Err(NativeError::InvalidArgument(format!(
            "process id list buffer too short: {} bytes",
            bytes.len()
        )));
    }
    let assigned = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let in_list = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

    let width = std::mem::size_of::<usize>();
    let needed = ID_LIST_HEADER + in_list * width;
    if bytes.len() < needed {
        return Err(NativeError::InvalidArgument(format!(
            "process id list claims {in_list} entries but buffer holds {} bytes",
            bytes.len()
        )));
    }

    let process_ids = bytes[ID_LIST_HEADER..needed]
        .chunks_exact(width)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(ProcessIdList {
        assigned,
        process_ids,
    })
}

/// Bytes needed to hold a process id list with `count` entries.
pub fn process_id_list_size(count: usize) -> usize {
    ID_LIST_HEADER + count * std::mem::size_of::<usize>()
}

// ---------------------------------------------------------------------------
// JobObject (Windows)
// ---------------------------------------------------------------------------

#[cfg(windows)]
pub use self::win::{assign_process_raw, JobObject};

#[cfg(windows)]
mod win {
    use std::ffi::c_void;

    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::Security::SECURITY_ATTRIBUTES;
    use windows::Win32::System::JobObjects::{
        AssignProcessToJobObject, CreateJobObjectW, OpenJobObjectW, QueryInformationJobObject,
        SetInformationJobObject, JOBOBJECTINFOCLASS, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
        JOB_OBJECT_LIMIT, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    };
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_SET_QUOTA, PROCESS_TERMINATE};

    use super::*;
    use crate::errors::{from_windows, last_error_code};
    use crate::handle::{to_handle, OwnedHandle};

    /// Initial capacity for [`JobObject::process_ids`].
    const INITIAL_ID_CAPACITY: usize = 16;

    /// An owned job object.  Closing the last handle destroys the job (and,
    /// with kill-on-close set, terminates its processes).
    #[derive(Debug)]
    pub struct JobObject {
        handle: OwnedHandle,
    }

    fn to_wide_nul(s: &str) -> Result<Vec<u16>> {
        if s.contains('\0') {
            return Err(NativeError::InvalidArgument(
                "job name contains an interior NUL".into(),
            ));
        }
        Ok(s.encode_utf16().chain(std::iter::once(0)).collect())
    }

    fn buffer_len(len: usize) -> Result<u32> {
        u32::try_from(len)
            .map_err(|_| NativeError::InvalidArgument(format!("buffer of {len} bytes too large")))
    }

    impl JobObject {
        /// Create (or open, if `name` already exists) a job object with
        /// default security.
        pub fn create(name: Option<&str>) -> Result<Self> {
            Self::create_with_security(None, name)
        }

        /// Forward `CreateJobObjectW` with optional security attributes.
        pub fn create_with_security(
            security: Option<&SECURITY_ATTRIBUTES>,
            name: Option<&str>,
        ) -> Result<Self> {
            let wide = name.map(to_wide_nul).transpose()?;
            let name_ptr = wide
                .as_ref()
                .map_or(PCWSTR::null(), |w| PCWSTR(w.as_ptr()));

            let handle = unsafe {
                CreateJobObjectW(security.map(|s| s as *const SECURITY_ATTRIBUTES), name_ptr)
            }
            .map_err(|e| from_windows("CreateJobObjectW", e))?;

            if last_error_code() == ERROR_ALREADY_EXISTS {
                log::debug!("CreateJobObjectW opened existing job {name:?}");
            }

            Ok(Self {
                handle: unsafe { OwnedHandle::from_raw(handle.0 as isize) },
            })
        }

        /// Open an existing named job with query access.  Unlike
        /// [`JobObject::create`] this never creates a job; a missing name
        /// fails with the OS error code.
        pub fn open(name: &str) -> Result<Self> {
            Self::open_with_access(name, access::JOB_OBJECT_QUERY)
        }

        /// Forward `OpenJobObjectW` (handle not inheritable).
        pub fn open_with_access(name: &str, desired_access: u32) -> Result<Self> {
            let wide = to_wide_nul(name)?;
            let handle = unsafe { OpenJobObjectW(desired_access, false, PCWSTR(wide.as_ptr())) }
                .map_err(|e| from_windows("OpenJobObjectW", e))?;
            Ok(Self {
                handle: unsafe { OwnedHandle::from_raw(handle.0 as isize) },
            })
        }

        /// Adopt an existing job handle.
        pub fn from_handle(handle: OwnedHandle) -> Self {
            Self { handle }
        }

        pub fn handle(&self) -> &OwnedHandle {
            &self.handle
        }

        /// Release the job handle to the caller.
        pub fn into_handle(self) -> OwnedHandle {
            self.handle
        }

        fn raw(&self) -> HANDLE {
            self.handle.as_handle()
        }

        /// Forward `QueryInformationJobObject` into a caller buffer.
        ///
        /// Returns the number of bytes the OS wrote.
        pub fn query_information(&self, class: JobInfoClass, buf: &mut [u8]) -> Result<u32> {
            let len = buffer_len(buf.len())?;
            unsafe { self.query_information_raw(class, buf.as_mut_ptr().cast(), len) }
        }

        /// Pointer form of [`JobObject::query_information`] for typed,
        /// properly aligned native structures.
        ///
        /// # Safety
        ///
        /// `info` must be valid for writes of `len` bytes.
        pub unsafe fn query_information_raw(
            &self,
            class: JobInfoClass,
            info: *mut c_void,
            len: u32,
        ) -> Result<u32> {
            let mut written = 0u32;
            unsafe {
                QueryInformationJobObject(
                    self.raw(),
                    JOBOBJECTINFOCLASS(class.as_raw()),
                    info,
                    len,
                    Some(&mut written),
                )
            }
            .map_err(|e| from_windows("QueryInformationJobObject", e))?;
            Ok(written)
        }

        /// Forward `SetInformationJobObject` from a caller buffer.
        pub fn set_information(&self, class: JobInfoClass, buf: &[u8]) -> Result<()> {
            let len = buffer_len(buf.len())?;
            unsafe { self.set_information_raw(class, buf.as_ptr().cast(), len) }
        }

        /// Pointer form of [`JobObject::set_information`].
        ///
        /// # Safety
        ///
        /// `info` must be valid for reads of `len` bytes.
        pub unsafe fn set_information_raw(
            &self,
            class: JobInfoClass,
            info: *const c_void,
            len: u32,
        ) -> Result<()> {
            unsafe {
                SetInformationJobObject(self.raw(), JOBOBJECTINFOCLASS(class.as_raw()), info, len)
            }
            .map_err(|e| from_windows("SetInformationJobObject", e))
        }

        /// Forward `AssignProcessToJobObject`.
        pub fn assign_process(&self, process: &OwnedHandle) -> Result<()> {
            assign_process_raw(self.handle.as_raw(), process.as_raw())
        }

        /// Open `pid` with the rights assignment needs and add it to the job.
        pub fn assign_process_id(&self, pid: u32) -> Result<()> {
            let process = unsafe { OpenProcess(PROCESS_SET_QUOTA | PROCESS_TERMINATE, false, pid) }
                .map_err(|e| from_windows("OpenProcess", e))?;
            let process = unsafe { OwnedHandle::from_raw(process.0 as isize) };
            self.assign_process(&process)
        }

        /// Ids of the processes currently in the job.
        ///
        /// Grows the buffer while the OS reports `ERROR_MORE_DATA`.
        pub fn process_ids(&self) -> Result<ProcessIdList> {
            let mut capacity = INITIAL_ID_CAPACITY;
            loop {
                let size = process_id_list_size(capacity);
                // u64 backing keeps the ULONG_PTR array aligned.
                let mut backing = vec![0u64; size.div_ceil(8)];
                let bytes = unsafe {
                    std::slice::from_raw_parts_mut(backing.as_mut_ptr().cast::<u8>(), size)
                };

                match self.query_information(JobInfoClass::BasicProcessIdList, bytes) {
                    Ok(_) => return parse_process_id_list(bytes),
                    Err(e) if e.code() == ERROR_MORE_DATA => {
                        let assigned = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                        capacity = (assigned as usize).max(capacity * 2);
                        log::debug!("process id list grew to {capacity} entries");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        /// Set `JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE`, keeping other limits.
        pub fn set_kill_on_close(&self) -> Result<()> {
            let mut info = JOBOBJECT_EXTENDED_LIMIT_INFORMATION::default();
            let len = std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32;

            unsafe {
                self.query_information_raw(
                    JobInfoClass::ExtendedLimitInformation,
                    (&mut info as *mut JOBOBJECT_EXTENDED_LIMIT_INFORMATION).cast(),
                    len,
                )
            }?;
            let flags = info.BasicLimitInformation.LimitFlags.0;
            info.BasicLimitInformation.LimitFlags =
                JOB_OBJECT_LIMIT(flags | JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE.0);
            unsafe {
                self.set_information_raw(
                    JobInfoClass::ExtendedLimitInformation,
                    (&info as *const JOBOBJECT_EXTENDED_LIMIT_INFORMATION).cast(),
                    len,
                )
            }
        }
    }

    /// Forward `AssignProcessToJobObject` for raw handles the caller owns.
    pub fn assign_process_raw(job: isize, process: isize) -> Result<()> {
        unsafe { AssignProcessToJobObject(to_handle(job), to_handle(process)) }
            .map_err(|e| from_windows("AssignProcessToJobObject", e))
    }

    #[cfg(test)]
    mod tests {
        use std::process::{Child, Command, Stdio};

        use super::*;

        fn unique_job_name(tag: &str) -> String {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos();
            format!("lsu-native-test-{tag}-{}-{nanos}", std::process::id())
        }

        #[test]
        fn test_create_anonymous_job_is_empty() {
            let job = JobObject::create(None).unwrap();
            assert!(job.handle().is_valid());
            let list = job.process_ids().unwrap();
            assert_eq!(list.assigned, 0);
            assert!(list.process_ids.is_empty());
        }

        #[test]
        fn test_query_reports_bytes_written() {
            let job = JobObject::create(None).unwrap();
            let mut buf = vec![0u64; 32];
            let bytes = unsafe {
                std::slice::from_raw_parts_mut(buf.as_mut_ptr().cast::<u8>(), 32 * 8)
            };
            let written = job
                .query_information(JobInfoClass::BasicProcessIdList, bytes)
                .unwrap();
            assert_eq!(written as usize, process_id_list_size(0));
        }

        #[test]
        fn test_set_kill_on_close() {
            let job = JobObject::create(None).unwrap();
            job.set_kill_on_close().unwrap();

            let mut info = JOBOBJECT_EXTENDED_LIMIT_INFORMATION::default();
            let len = std::mem::size_of_val(&info) as u32;
            unsafe {
                job.query_information_raw(
                    JobInfoClass::ExtendedLimitInformation,
                    (&mut info as *mut JOBOBJECT_EXTENDED_LIMIT_INFORMATION).cast(),
                    len,
                )
            }
            .unwrap();
            let flags = info.BasicLimitInformation.LimitFlags.0;
            assert_ne!(flags & JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE.0, 0);
        }

        #[test]
        fn test_name_with_nul_rejected() {
            let err = JobObject::create(Some("bad\0name")).unwrap_err();
            assert!(matches!(err, NativeError::InvalidArgument(_)));
        }

        #[test]
        fn test_open_missing_job_fails() {
            let err = JobObject::open(&unique_job_name("missing")).unwrap_err();
            assert!(matches!(err, NativeError::Win32 { call: "OpenJobObjectW", .. }));
            assert_ne!(err.code(), 0);
        }

        #[test]
        fn test_open_existing_named_job() {
            let name = unique_job_name("named");
            let created = JobObject::create(Some(&name)).unwrap();
            let opened = JobObject::open(&name).unwrap();
            assert!(opened.handle().is_valid());
            assert_ne!(opened.handle().as_raw(), created.handle().as_raw());
            assert!(opened.process_ids().unwrap().process_ids.is_empty());
        }

        #[test]
        fn test_process_ids_grow_past_initial_capacity() {
            let job = JobObject::create(None).unwrap();
            job.set_kill_on_close().unwrap();

            let count = INITIAL_ID_CAPACITY + 4;
            let mut children: Vec<Child> = (0..count)
                .map(|_| {
                    Command::new("ping")
                        .args(["-n", "30", "127.0.0.1"])
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .spawn()
                        .unwrap()
                })
                .collect();
            for child in &children {
                job.assign_process_id(child.id()).unwrap();
            }

            let list = job.process_ids();
            for child in &mut children {
                let _ = child.kill();
                let _ = child.wait();
            }
            let list = list.unwrap();

            assert!(list.process_ids.len() >= count);
            assert_eq!(list.process_ids.len(), list.assigned as usize);
            for child in &children {
                assert!(list.process_ids.contains(&child.id()));
            }
        }

        #[test]
        fn test_assign_invalid_process_fails() {
            let job = JobObject::create(None).unwrap();
            let err = assign_process_raw(job.handle().as_raw(), 0).unwrap_err();
            assert_ne!(err.code(), 0);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_list(assigned: u32, ids: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&assigned.to_le_bytes());
        out.extend_from_slice(&(ids.len() as u32).to_le_bytes());
        for &id in ids {
            out.extend_from_slice(&(id as usize).to_le_bytes());
        }
        out
    }

    #[test]
    fn test_info_class_values() {
        assert_eq!(JobInfoClass::BasicLimitInformation.as_raw(), 2);
        assert_eq!(JobInfoClass::BasicProcessIdList.as_raw(), 3);
        assert_eq!(JobInfoClass::AssociateCompletionPortInformation.as_raw(), 7);
        assert_eq!(JobInfoClass::ExtendedLimitInformation.as_raw(), 9);
        assert_eq!(JobInfoClass::GroupInformation.as_raw(), 11);
    }

    #[test]
    fn test_info_class_try_from() {
        assert_eq!(
            JobInfoClass::try_from(6).unwrap(),
            JobInfoClass::EndOfJobTimeInformation
        );
        assert!(JobInfoClass::try_from(8).is_err());
        assert!(JobInfoClass::try_from(0).is_err());
    }

    #[test]
    fn test_parse_process_id_list() {
        let bytes = encode_list(3, &[4, 1200, 8812]);
        let list = parse_process_id_list(&bytes).unwrap();
        assert_eq!(list.assigned, 3);
        assert_eq!(list.process_ids, vec![4, 1200, 8812]);
    }

    #[test]
    fn test_parse_partial_list() {
        // More processes assigned than fit in the buffer.
        let bytes = encode_list(40, &[10, 11]);
        let list = parse_process_id_list(&bytes).unwrap();
        assert_eq!(list.assigned, 40);
        assert_eq!(list.process_ids.len(), 2);
    }

    #[test]
    fn test_parse_rejects_truncated_buffer() {
        assert!(parse_process_id_list(&[0u8; 4]).is_err());
        let mut bytes = encode_list(2, &[1, 2]);
        bytes.truncate(bytes.len() - 1);
        assert!(parse_process_id_list(&bytes).is_err());
    }

    #[test]
    fn test_process_id_list_size() {
        assert_eq!(process_id_list_size(0), 8);
        assert_eq!(
            process_id_list_size(4),
            8 + 4 * std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_process_id_list_serialization() {
        let list = ProcessIdList {
            assigned: 1,
            process_ids: vec![42],
        };
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"{"assigned":1,"process_ids":[42]}"#);
    }
}
