//! C-ABI binding surface over [`citi::Record`]: an opaque handle, a
//! thread-local last-error slot, and count-then-index accessors, mirroring
//! the `ctypes` contract the Python wrapper declares against this library.
//!
//! Every returned `*const c_char` borrows from the handle's string cache and
//! stays valid until the next call that mutates the same handle, or until
//! the handle is destroyed — never across threads, and never past either
//! event.

use citi::{CitiError, Record};
use once_cell::sync::OnceCell;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

/// Lazily materialized cache of a single handle's string- and array-typed
/// fields, rebuilt on every call that can change record content, so that
/// borrowed pointers returned to callers have somewhere stable to live.
#[derive(Default)]
struct Cache {
    version: Option<CString>,
    name: Option<CString>,
    comments: Vec<CString>,
    device_names: Vec<CString>,
    device_entries: Vec<Vec<CString>>,
    iv_name: Option<CString>,
    iv_format: Option<CString>,
    iv_samples: Vec<f64>,
    data_names: Vec<CString>,
    data_formats: Vec<CString>,
}

impl Cache {
    fn rebuild(record: &Record) -> Cache {
        Cache {
            version: to_cstring(&record.version),
            name: to_cstring(&record.name),
            comments: record.comments.iter().filter_map(|s| to_cstring(s)).collect(),
            device_names: record.devices.iter().filter_map(|d| to_cstring(&d.name)).collect(),
            device_entries: record
                .devices
                .iter()
                .map(|d| d.entries.iter().filter_map(|e| to_cstring(e)).collect())
                .collect(),
            iv_name: to_cstring(&record.independent_variable.name),
            iv_format: to_cstring(&record.independent_variable.format),
            iv_samples: record.independent_variable.samples.clone(),
            data_names: record.data.iter().filter_map(|a| to_cstring(&a.name)).collect(),
            data_formats: record.data.iter().filter_map(|a| to_cstring(&a.format)).collect(),
        }
    }
}

fn to_cstring(s: &str) -> Option<CString> {
    CString::new(s).ok()
}

/// The opaque handle returned to callers. Holds the record plus a lazily
/// rebuilt cache so borrowed pointers returned to callers have somewhere
/// to live.
pub struct Handle {
    record: Record,
    cache: RefCell<Cache>,
}

impl Handle {
    fn new(record: Record) -> Handle {
        let cache = Cache::rebuild(&record);
        Handle { record, cache: RefCell::new(cache) }
    }

    fn refresh_cache(&self) {
        *self.cache.borrow_mut() = Cache::rebuild(&self.record);
    }
}

thread_local! {
    static LAST_ERROR: Cell<i32> = const { Cell::new(0) };
}

fn set_last_error(code: i32) {
    LAST_ERROR.with(|slot| slot.set(code));
}

fn clear_last_error() {
    set_last_error(0);
}

/// Read the most recent error code set on this thread by any `citi_ffi`
/// call, or `0` if the last call succeeded.
#[no_mangle]
pub extern "C" fn get_last_error_code() -> i32 {
    LAST_ERROR.with(|slot| slot.get())
}

static DESCRIPTION_CACHE: OnceCell<std::sync::Mutex<HashMap<i32, CString>>> = OnceCell::new();

/// The fixed, null-terminated description string for an error code. The
/// returned pointer is valid for the life of the process.
#[no_mangle]
pub extern "C" fn get_error_description(code: i32) -> *const c_char {
    let map = DESCRIPTION_CACHE.get_or_init(|| std::sync::Mutex::new(HashMap::new()));
    let mut map = map.lock().unwrap();
    let entry = map
        .entry(code)
        .or_insert_with(|| CString::new(citi::error::description_for_code(code)).unwrap());
    entry.as_ptr()
}

unsafe fn handle_ref<'a>(ptr: *const Handle) -> Option<&'a Handle> {
    if ptr.is_null() {
        set_last_error(CitiError::NullArgument.code());
        None
    } else {
        Some(&*ptr)
    }
}

unsafe fn str_from_c(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        set_last_error(CitiError::NullArgument.code());
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s.to_string()),
        Err(_) => {
            set_last_error(CitiError::InvalidUtf8.code());
            None
        }
    }
}

/// A freshly defaulted record handle. Never fails.
#[no_mangle]
pub extern "C" fn record_default() -> *mut Handle {
    clear_last_error();
    Box::into_raw(Box::new(Handle::new(Record::default())))
}

/// Read and parse a CITI file from `path`. Returns null and sets the last
/// error on any I/O or parse failure.
///
/// # Safety
/// `path` must be a valid null-terminated C string, or null.
#[no_mangle]
pub unsafe extern "C" fn record_read(path: *const c_char) -> *mut Handle {
    let path = match str_from_c(path) {
        Some(p) => p,
        None => return ptr::null_mut(),
    };
    match Record::read_file(&path) {
        Ok(record) => {
            clear_last_error();
            Box::into_raw(Box::new(Handle::new(record)))
        }
        Err(err) => {
            log::warn!("record_read({path}): {err}");
            set_last_error(err.code());
            ptr::null_mut()
        }
    }
}

/// Destroy a handle previously returned by `record_default` or `record_read`.
///
/// # Safety
/// `handle` must be a pointer previously returned by this library and not
/// already destroyed, or null (a no-op).
#[no_mangle]
pub unsafe extern "C" fn record_destroy(handle: *mut Handle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_version(handle: *const Handle) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => match h.cache.borrow().version.as_ref() {
            Some(c) => {
                clear_last_error();
                c.as_ptr()
            }
            None => {
                set_last_error(CitiError::InteriorNullByte.code());
                ptr::null()
            }
        },
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live, non-null pointer; `value` a valid C string.
#[no_mangle]
pub unsafe extern "C" fn record_set_version(handle: *mut Handle, value: *const c_char) -> i32 {
    let value = match str_from_c(value) {
        Some(v) => v,
        None => return get_last_error_code(),
    };
    match handle.as_mut() {
        Some(h) => {
            h.record.version = value;
            h.refresh_cache();
            clear_last_error();
            0
        }
        None => {
            set_last_error(CitiError::NullArgument.code());
            CitiError::NullArgument.code()
        }
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_name(handle: *const Handle) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => match h.cache.borrow().name.as_ref() {
            Some(c) => {
                clear_last_error();
                c.as_ptr()
            }
            None => {
                set_last_error(CitiError::InteriorNullByte.code());
                ptr::null()
            }
        },
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live, non-null pointer; `value` a valid C string.
#[no_mangle]
pub unsafe extern "C" fn record_set_name(handle: *mut Handle, value: *const c_char) -> i32 {
    let value = match str_from_c(value) {
        Some(v) => v,
        None => return get_last_error_code(),
    };
    match handle.as_mut() {
        Some(h) => {
            h.record.name = value;
            h.refresh_cache();
            clear_last_error();
            0
        }
        None => {
            set_last_error(CitiError::NullArgument.code());
            CitiError::NullArgument.code()
        }
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_number_of_comments(handle: *const Handle) -> usize {
    match handle_ref(handle) {
        Some(h) => {
            clear_last_error();
            h.record.comments.len()
        }
        None => 0,
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_comment(handle: *const Handle, index: usize) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => match h.cache.borrow().comments.get(index) {
            Some(c) => {
                clear_last_error();
                c.as_ptr()
            }
            None => {
                set_last_error(CitiError::IndexOutOfBounds.code());
                ptr::null()
            }
        },
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_number_of_devices(handle: *const Handle) -> usize {
    match handle_ref(handle) {
        Some(h) => {
            clear_last_error();
            h.record.devices.len()
        }
        None => 0,
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_device_name(handle: *const Handle, index: usize) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => match h.cache.borrow().device_names.get(index) {
            Some(c) => {
                clear_last_error();
                c.as_ptr()
            }
            None => {
                set_last_error(CitiError::IndexOutOfBounds.code());
                ptr::null()
            }
        },
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_device_number_of_entries(handle: *const Handle, index: usize) -> usize {
    match handle_ref(handle) {
        Some(h) => match h.record.devices.get(index) {
            Some(d) => {
                clear_last_error();
                d.entries.len()
            }
            None => {
                set_last_error(CitiError::IndexOutOfBounds.code());
                0
            }
        },
        None => 0,
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_device_entry(handle: *const Handle, device_index: usize, entry_index: usize) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => match h.cache.borrow().device_entries.get(device_index).and_then(|entries| entries.get(entry_index)) {
            Some(c) => {
                clear_last_error();
                c.as_ptr()
            }
            None => {
                set_last_error(CitiError::IndexOutOfBounds.code());
                ptr::null()
            }
        },
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_independent_variable_name(handle: *const Handle) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => {
            clear_last_error();
            h.cache.borrow().iv_name.as_ref().map(|c| c.as_ptr()).unwrap_or(ptr::null())
        }
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_independent_variable_format(handle: *const Handle) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => {
            clear_last_error();
            h.cache.borrow().iv_format.as_ref().map(|c| c.as_ptr()).unwrap_or(ptr::null())
        }
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_independent_variable_length(handle: *const Handle) -> usize {
    match handle_ref(handle) {
        Some(h) => {
            clear_last_error();
            h.record.independent_variable.samples.len()
        }
        None => 0,
    }
}

/// The independent variable's samples, borrowed from the handle's cache.
/// Valid for `record_get_independent_variable_length(handle)` elements,
/// until the next mutating call on this handle or its destruction.
///
/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_independent_variable_array(handle: *const Handle) -> *const f64 {
    match handle_ref(handle) {
        Some(h) => {
            clear_last_error();
            h.cache.borrow().iv_samples.as_ptr()
        }
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_number_of_data_arrays(handle: *const Handle) -> usize {
    match handle_ref(handle) {
        Some(h) => {
            clear_last_error();
            h.record.data.len()
        }
        None => 0,
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_data_array_name(handle: *const Handle, index: usize) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => match h.cache.borrow().data_names.get(index) {
            Some(c) => {
                clear_last_error();
                c.as_ptr()
            }
            None => {
                set_last_error(CitiError::IndexOutOfBounds.code());
                ptr::null()
            }
        },
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_data_array_format(handle: *const Handle, index: usize) -> *const c_char {
    match handle_ref(handle) {
        Some(h) => match h.cache.borrow().data_formats.get(index) {
            Some(c) => {
                clear_last_error();
                c.as_ptr()
            }
            None => {
                set_last_error(CitiError::IndexOutOfBounds.code());
                ptr::null()
            }
        },
        None => ptr::null(),
    }
}

/// # Safety
/// `handle` must be a live pointer returned by this library, or null.
#[no_mangle]
pub unsafe extern "C" fn record_get_data_array_length(handle: *const Handle, index: usize) -> usize {
    match handle_ref(handle) {
        Some(h) => match h.record.data.get(index) {
            Some(array) => {
                clear_last_error();
                array.samples.len()
            }
            None => {
                set_last_error(CitiError::IndexOutOfBounds.code());
                0
            }
        },
        None => 0,
    }
}

/// Copy `(real, imaginary)` samples from data array `index` into the
/// caller-owned `out_real`/`out_imag` buffers. The caller is expected to
/// have sized both from `record_get_data_array_length(handle, index)`.
///
/// # Safety
/// `handle` must be a live pointer; `out_real` and `out_imag` must each
/// point to at least `record_get_data_array_length(handle, index)`
/// writable `f64` slots.
#[no_mangle]
pub unsafe extern "C" fn record_get_data_array(handle: *const Handle, index: usize, out_real: *mut f64, out_imag: *mut f64) -> i32 {
    let handle = match handle_ref(handle) {
        Some(h) => h,
        None => return get_last_error_code(),
    };
    if out_real.is_null() || out_imag.is_null() {
        set_last_error(CitiError::NullArgument.code());
        return CitiError::NullArgument.code();
    }
    let array = match handle.record.data.get(index) {
        Some(array) => array,
        None => {
            set_last_error(CitiError::IndexOutOfBounds.code());
            return CitiError::IndexOutOfBounds.code();
        }
    };
    let count = array.samples.len();
    let real_dest = std::slice::from_raw_parts_mut(out_real, count);
    let imag_dest = std::slice::from_raw_parts_mut(out_imag, count);
    for (i, (re, im)) in array.samples.iter().enumerate() {
        real_dest[i] = *re;
        imag_dest[i] = *im;
    }
    clear_last_error();
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_has_zero_counts() {
        let handle = record_default();
        unsafe {
            assert_eq!(record_get_number_of_comments(handle), 0);
            assert_eq!(record_get_number_of_devices(handle), 0);
            assert_eq!(record_get_number_of_data_arrays(handle), 0);
            assert_eq!(get_last_error_code(), 0);
            record_destroy(handle);
        }
    }

    #[test]
    fn null_handle_sets_null_argument_error() {
        unsafe {
            assert_eq!(record_get_number_of_comments(ptr::null()), 0);
            assert_eq!(get_last_error_code(), CitiError::NullArgument.code());
        }
    }

    #[test]
    fn missing_file_returns_null_and_sets_not_found() {
        let path = CString::new("/nonexistent/path/does-not-exist.cti").unwrap();
        unsafe {
            let handle = record_read(path.as_ptr());
            assert!(handle.is_null());
            assert_eq!(get_last_error_code(), -4);
        }
    }

    #[test]
    fn set_version_round_trips_through_the_getter() {
        let handle = record_default();
        let value = CString::new("A.02.00").unwrap();
        unsafe {
            assert_eq!(record_set_version(handle, value.as_ptr()), 0);
            let got = CStr::from_ptr(record_get_version(handle)).to_str().unwrap();
            assert_eq!(got, "A.02.00");
            record_destroy(handle);
        }
    }

    #[test]
    fn error_description_matches_the_catalog() {
        let ptr = get_error_description(-4);
        unsafe {
            assert_eq!(CStr::from_ptr(ptr).to_str().unwrap(), "File not found for reading");
        }
        let ptr = get_error_description(1);
        unsafe {
            assert_eq!(CStr::from_ptr(ptr).to_str().unwrap(), "Invalid error code");
        }
    }

    #[test]
    fn out_of_bounds_index_is_reported() {
        let handle = record_default();
        unsafe {
            assert!(record_get_comment(handle, 0).is_null());
            assert_eq!(get_last_error_code(), CitiError::IndexOutOfBounds.code());
            record_destroy(handle);
        }
    }

    #[test]
    fn independent_variable_array_borrows_the_cached_samples() {
        let record = Record::read_str(
            "CITIFILE A.01.00\nNAME A\nVAR FREQ MAG 2\nDATA S RI\nVAR_LIST_BEGIN\n1E9\n2E9\nVAR_LIST_END\nBEGIN\n0.1,0.2\n0.3,0.4\nEND\n",
        )
        .unwrap();
        let handle = Box::into_raw(Box::new(Handle::new(record)));
        unsafe {
            let len = record_get_independent_variable_length(handle);
            assert_eq!(len, 2);
            let ptr = record_get_independent_variable_array(handle);
            let samples = std::slice::from_raw_parts(ptr, len);
            assert_eq!(samples, [1e9, 2e9]);
            record_destroy(handle);
        }
    }

    #[test]
    fn data_array_is_copied_into_caller_buffers() {
        let record = Record::read_str(
            "CITIFILE A.01.00\nNAME A\nVAR FREQ MAG 2\nDATA S RI\nVAR_LIST_BEGIN\n1E9\n2E9\nVAR_LIST_END\nBEGIN\n0.1,0.2\n0.3,0.4\nEND\n",
        )
        .unwrap();
        let handle = Box::into_raw(Box::new(Handle::new(record)));
        unsafe {
            let len = record_get_data_array_length(handle, 0);
            let mut real = vec![0.0; len];
            let mut imag = vec![0.0; len];
            let rc = record_get_data_array(handle, 0, real.as_mut_ptr(), imag.as_mut_ptr());
            assert_eq!(rc, 0);
            assert_eq!(real, vec![0.1, 0.3]);
            assert_eq!(imag, vec![0.2, 0.4]);
            record_destroy(handle);
        }
    }

    #[test]
    fn interior_null_byte_in_name_is_reported_not_swallowed() {
        let mut record = Record::default();
        record.name = "bad\0name".to_string();
        let handle = Box::into_raw(Box::new(Handle::new(record)));
        unsafe {
            assert!(record_get_name(handle).is_null());
            assert_eq!(get_last_error_code(), CitiError::InteriorNullByte.code());
            record_destroy(handle);
        }
    }
}
