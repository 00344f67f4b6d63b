//! FFI bindings for Pulse Integrity
//!
//! This module provides C-compatible functions for calling the core from a host
//! UI layer. Inputs and outputs are JSON in null-terminated C strings. Returned
//! strings are allocated by Rust and must be freed with `pulse_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::biosignal::{
    BiosignalProcessor, ProcessorConfig, DEFAULT_SAMPLE_RATE, DEFAULT_WINDOW_SECONDS,
};
use crate::error::SignalError;
use crate::harness::{golden_baseline, load_vectors, VerificationHarness};
use crate::mastering::compute_master_metrics;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize a result to a C string, recording the error on failure
fn result_to_cstr<T: serde::Serialize>(result: Result<T, SignalError>) -> *mut c_char {
    match result.and_then(|value| Ok(serde_json::to_string(&value)?)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute mastering metrics from a JSON array of samples.
///
/// # Safety
/// - `samples_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_compute_master_metrics(samples_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(samples_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid samples string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str::<Vec<f64>>(&json_str)
        .map_err(SignalError::from)
        .and_then(|samples| compute_master_metrics(&samples));
    result_to_cstr(result)
}

/// Run the shipped golden baseline and return the status JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
#[no_mangle]
pub unsafe extern "C" fn pulse_verify_golden() -> *mut c_char {
    clear_last_error();
    let status = VerificationHarness::new().run(&golden_baseline());
    result_to_cstr(Ok(status))
}

/// Run a JSON array of golden vectors and return the status JSON.
///
/// # Safety
/// - `vectors_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_verify(vectors_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(vectors_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid vectors string pointer");
            return ptr::null_mut();
        }
    };

    let result = load_vectors(&json_str)
        .map_err(SignalError::from)
        .map(|vectors| VerificationHarness::new().run(&vectors));
    result_to_cstr(result)
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a BiosignalProcessor
pub struct PulseProcessorHandle {
    processor: BiosignalProcessor,
}

/// Create a new processor. Non-positive arguments select the defaults (60 Hz, 10 s).
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `pulse_processor_free`.
/// - Returns NULL if the window is too large; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_new(
    sample_rate: i32,
    window_seconds: i32,
) -> *mut PulseProcessorHandle {
    clear_last_error();

    let sample_rate = if sample_rate <= 0 {
        DEFAULT_SAMPLE_RATE
    } else {
        sample_rate as u32
    };
    let window_seconds = if window_seconds <= 0 {
        DEFAULT_WINDOW_SECONDS
    } else {
        window_seconds as u32
    };

    let config = ProcessorConfig {
        sample_rate,
        window_seconds,
    };
    match BiosignalProcessor::try_from_config(config) {
        Ok(processor) => Box::into_raw(Box::new(PulseProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_free(processor: *mut PulseProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Feed one sample and return the BioMetrics JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `pulse_processor_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_processor_process(
    processor: *mut PulseProcessorHandle,
    sample: f64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;
    let metrics = handle.processor.process(sample);
    result_to_cstr(Ok(metrics))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a pulse function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a pulse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next pulse function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        pulse_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_master_metrics() {
        let samples = CString::new("[0.5, -0.5, 0.5, -0.5]").unwrap();
        unsafe {
            let json = take_string(pulse_compute_master_metrics(samples.as_ptr()));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["checksum"], "0x1388");
            assert_eq!(value["crestFactor"], 1.0);
        }
    }

    #[test]
    fn test_ffi_master_metrics_empty_sets_error() {
        let samples = CString::new("[]").unwrap();
        unsafe {
            let result = pulse_compute_master_metrics(samples.as_ptr());
            assert!(result.is_null());

            let err = pulse_last_error();
            assert!(!err.is_null());
            let msg = CStr::from_ptr(err).to_str().unwrap();
            assert!(msg.contains("Empty sample set"));
        }
    }

    #[test]
    fn test_ffi_verify_golden() {
        unsafe {
            let json = take_string(pulse_verify_golden());
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["passed"], true);
            assert_eq!(value["results"]["CASE_02_PANIC"], true);
        }
    }

    #[test]
    fn test_ffi_verify_rejects_bad_json() {
        let vectors = CString::new("{not json").unwrap();
        unsafe {
            assert!(pulse_verify(vectors.as_ptr()).is_null());
            assert!(!pulse_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = pulse_processor_new(0, 0);
            assert!(!processor.is_null());

            let mut last = String::new();
            for t in 0..120 {
                let sample = if t % 30 == 0 { 1.0 } else { 0.0 };
                last = take_string(pulse_processor_process(processor, sample));
            }
            let value: serde_json::Value = serde_json::from_str(&last).unwrap();
            assert_eq!(value["bpm"], 120);

            pulse_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_processor_rejects_oversized_window() {
        unsafe {
            let processor = pulse_processor_new(i32::MAX, i32::MAX);
            assert!(processor.is_null());
            let msg = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert!(msg.contains("Invalid configuration"));
        }
    }

    #[test]
    fn test_ffi_null_processor() {
        unsafe {
            assert!(pulse_processor_process(ptr::null_mut(), 0.0).is_null());
            let msg = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert_eq!(msg, "Null processor pointer");
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = CStr::from_ptr(pulse_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}
