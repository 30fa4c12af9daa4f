//! C-ABI wrapper around `courier-core`.
//!
//! # Overview
//! Exposes the callback surface of `NetworkService` through `extern "C"`
//! functions. A service owns its own multi-threaded tokio runtime, so C
//! callers never see async Rust; they pass a completion callback and get a
//! cancel handle back.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Every started call invokes its completion callback at most once, on a
//!   runtime worker thread, with an `FfiOutcome` the callee owns. It fires
//!   exactly once unless `courier_service_free` runs first: freeing a service
//!   aborts its in-flight calls and their callbacks never fire.
//! - Calls that fail before reaching the network return a null cancel handle.
//!   Their callback still fires with the failure.
//! - String arguments must be valid UTF-8. Invalid strings are rejected the
//!   same way null ones are.
//! - Tri-state `auto_validate` arguments: -1 = service default, 0 = off,
//!   1 = on.
//! - The C caller owns all returned pointers and must call the matching
//!   `courier_*_free` function to release them.

pub mod types;

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::time::Duration;

use courier_core::{
    NetworkService, Parameters, ProgressObserver, ReqwestTransport, ServiceConfig, TransferConfig,
};

use types::*;

/// Read a non-null C string argument. `None` if it is not valid UTF-8.
unsafe fn c_str<'a>(s: *const c_char) -> Option<&'a str> {
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

fn transfer_config(upload_mode: bool, auto_validate: i32) -> TransferConfig {
    let mut config = TransferConfig::new();
    if upload_mode {
        config = config.upload();
    }
    match auto_validate {
        0 => config.auto_validate(false),
        1 => config.auto_validate(true),
        _ => config,
    }
}

/// Report a failure that happened before a call could be handed to the
/// service. Runs the callback on the calling thread.
fn fail_now(cb: FfiCompletion, user_data: *mut c_void, outcome: *mut FfiOutcome) -> *mut FfiCancelHandle {
    cb(outcome, user_data);
    ptr::null_mut()
}

fn into_handle(handle: Option<courier_core::CancelHandle>) -> *mut FfiCancelHandle {
    match handle {
        Some(inner) => Box::into_raw(Box::new(FfiCancelHandle { inner })),
        None => ptr::null_mut(),
    }
}

// ---------------------------------------------------------------------------
// Service lifecycle
// ---------------------------------------------------------------------------

/// Create a service configured from the `COURIER_*` environment variables.
///
/// Returns null if the configuration is invalid, the runtime cannot start,
/// or an internal panic occurs. Free with `courier_service_free`.
#[unsafe(no_mangle)]
pub extern "C" fn courier_service_new() -> *mut FfiService {
    catch_unwind(|| {
        let config = match ServiceConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("invalid service configuration: {e}");
                return ptr::null_mut();
            }
        };
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("courier-worker")
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!("failed to start runtime: {e}");
                return ptr::null_mut();
            }
        };
        let transport = match ReqwestTransport::new(&config) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!("failed to build transport: {e}");
                return ptr::null_mut();
            }
        };
        let inner = NetworkService::builder(transport)
            .config(&config)
            .build(runtime.handle().clone());
        tracing::debug!(auto_validate = config.auto_validate, "service created");
        Box::into_raw(Box::new(FfiService { inner, runtime }))
    })
    .unwrap_or(ptr::null_mut())
}

/// Free a service. In-flight calls are aborted without invoking their
/// callbacks. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_service_free(service: *mut FfiService) {
    if !service.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let FfiService { inner, runtime } = *unsafe { Box::from_raw(service) };
            drop(inner);
            runtime.shutdown_background();
        }));
    }
}

/// Set the service-wide validation flag. No-op on null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_set_auto_validation(service: *const FfiService, enabled: bool) {
    if !service.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &*service }.inner.set_auto_validation(enabled);
        }));
    }
}

/// Current service-wide validation flag. False on null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_auto_validation(service: *const FfiService) -> bool {
    if service.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { &*service }.inner.auto_validation()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Create an endpoint for `base_url + path`.
///
/// Returns null if `base_url` or `path` is null or not UTF-8. The target is
/// not checked until a call is made. Free with `courier_endpoint_free`.
#[unsafe(no_mangle)]
pub extern "C" fn courier_endpoint_new(
    method: FfiHttpMethod,
    base_url: *const c_char,
    path: *const c_char,
) -> *mut FfiEndpoint {
    catch_unwind(|| {
        if base_url.is_null() || path.is_null() {
            return ptr::null_mut();
        }
        let (Some(base_url), Some(path)) = (unsafe { c_str(base_url) }, unsafe { c_str(path) }) else {
            tracing::debug!("endpoint rejected: argument is not UTF-8");
            return ptr::null_mut();
        };
        let inner = courier_core::Endpoint::new(method.into(), base_url, path);
        Box::into_raw(Box::new(FfiEndpoint { inner }))
    })
    .unwrap_or(ptr::null_mut())
}

/// Free an endpoint. Safe to call with null, and while calls made from it
/// are still in flight.
#[unsafe(no_mangle)]
pub extern "C" fn courier_endpoint_free(endpoint: *mut FfiEndpoint) {
    if !endpoint.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(endpoint) });
        }));
    }
}

/// Replace the endpoint's path. Returns false on null or non-UTF-8
/// arguments, leaving the path unchanged.
#[unsafe(no_mangle)]
pub extern "C" fn courier_endpoint_set_path(endpoint: *const FfiEndpoint, path: *const c_char) -> bool {
    if endpoint.is_null() || path.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| {
        let Some(path) = (unsafe { c_str(path) }) else {
            return false;
        };
        unsafe { &*endpoint }.inner.set_path(path);
        true
    }))
    .unwrap_or(false)
}

/// Apply `edit` to the endpoint's parameters, creating them if absent.
/// The read and the write happen under one lock, so concurrent setters on
/// the same endpoint never drop each other's changes.
fn edit_params(endpoint: *const FfiEndpoint, edit: impl FnOnce(Parameters) -> Parameters) -> bool {
    if endpoint.is_null() {
        return false;
    }
    catch_unwind(AssertUnwindSafe(|| {
        unsafe { &*endpoint }.inner.update_params(|params| {
            let current = params.take().unwrap_or_default();
            *params = Some(edit(current));
        });
        true
    }))
    .unwrap_or(false)
}

/// Set the request body to a copy of `len` bytes at `body`. A null `body`
/// clears it. Returns false if `endpoint` is null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_endpoint_set_body(
    endpoint: *const FfiEndpoint,
    body: *const u8,
    len: usize,
) -> bool {
    let bytes = if body.is_null() {
        None
    } else {
        Some(bytes::Bytes::copy_from_slice(unsafe {
            std::slice::from_raw_parts(body, len)
        }))
    };
    edit_params(endpoint, |mut params| {
        params.body = bytes;
        params
    })
}

/// Append a header. Repeated fields are all sent. Returns false on null or
/// non-UTF-8 arguments.
#[unsafe(no_mangle)]
pub extern "C" fn courier_endpoint_add_header(
    endpoint: *const FfiEndpoint,
    value: *const c_char,
    field: *const c_char,
) -> bool {
    if value.is_null() || field.is_null() {
        return false;
    }
    let (Some(value), Some(field)) = (unsafe { c_str(value) }, unsafe { c_str(field) }) else {
        return false;
    };
    edit_params(endpoint, |params| params.with_header(value, field))
}

/// Set a per-request timeout. Zero clears it.
#[unsafe(no_mangle)]
pub extern "C" fn courier_endpoint_set_timeout_ms(endpoint: *const FfiEndpoint, timeout_ms: u64) -> bool {
    edit_params(endpoint, |mut params| {
        params.timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        params
    })
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Run `endpoint` and deliver the raw body to `cb`.
///
/// The endpoint is snapshotted before this returns, so it may be changed or
/// freed right away. Returns a cancel handle, or null if the call never
/// started. Returns null without invoking anything if `cb` is null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_request(
    service: *const FfiService,
    endpoint: *const FfiEndpoint,
    upload_mode: bool,
    auto_validate: i32,
    cb: Option<FfiCompletion>,
    user_data: *mut c_void,
) -> *mut FfiCancelHandle {
    let Some(cb) = cb else {
        return ptr::null_mut();
    };
    catch_unwind(AssertUnwindSafe(|| {
        if service.is_null() {
            return fail_now(cb, user_data, FfiOutcome::null_arg("service"));
        }
        if endpoint.is_null() {
            return fail_now(cb, user_data, FfiOutcome::null_arg("endpoint"));
        }
        let (service, endpoint) = unsafe { (&*service, &*endpoint) };
        let user_data = UserData::new(user_data);
        let handle = service.inner.request_data_with(
            &endpoint.inner,
            transfer_config(upload_mode, auto_validate),
            move |outcome| cb(FfiOutcome::from_body(outcome), user_data.get()),
        );
        into_handle(handle)
    }))
    .unwrap_or_else(|_| fail_now(cb, user_data, FfiOutcome::panic("panic in courier_request")))
}

/// Download `url` to the file at `dest` and report completion to `cb`.
///
/// `progress` may be null. A destination that already exists is left
/// untouched and reported as success.
#[unsafe(no_mangle)]
pub extern "C" fn courier_download(
    service: *const FfiService,
    url: *const c_char,
    dest: *const c_char,
    auto_validate: i32,
    progress: Option<FfiProgress>,
    cb: Option<FfiCompletion>,
    user_data: *mut c_void,
) -> *mut FfiCancelHandle {
    let Some(cb) = cb else {
        return ptr::null_mut();
    };
    catch_unwind(AssertUnwindSafe(|| {
        if service.is_null() {
            return fail_now(cb, user_data, FfiOutcome::null_arg("service"));
        }
        if url.is_null() || dest.is_null() {
            let name = if url.is_null() { "url" } else { "dest" };
            return fail_now(cb, user_data, FfiOutcome::null_arg(name));
        }
        let Some(url) = (unsafe { c_str(url) }) else {
            return fail_now(cb, user_data, FfiOutcome::invalid_utf8("url"));
        };
        let Some(dest) = (unsafe { c_str(dest) }).map(PathBuf::from) else {
            return fail_now(cb, user_data, FfiOutcome::invalid_utf8("dest"));
        };
        let service = unsafe { &*service };
        let user_data = UserData::new(user_data);
        let mut config = transfer_config(false, auto_validate);
        if let Some(progress) = progress {
            config = config.progress(ProgressObserver::new(move |f| progress(f, user_data.get())));
        }
        let handle = service.inner.download_with(url, dest, config, move |outcome| {
            cb(FfiOutcome::from_download(outcome), user_data.get())
        });
        into_handle(handle)
    }))
    .unwrap_or_else(|_| fail_now(cb, user_data, FfiOutcome::panic("panic in courier_download")))
}

/// GET `url` into memory and deliver the body to `cb`. An empty body is
/// delivered as a null `body`.
#[unsafe(no_mangle)]
pub extern "C" fn courier_fetch(
    service: *const FfiService,
    url: *const c_char,
    auto_validate: i32,
    cb: Option<FfiCompletion>,
    user_data: *mut c_void,
) -> *mut FfiCancelHandle {
    let Some(cb) = cb else {
        return ptr::null_mut();
    };
    catch_unwind(AssertUnwindSafe(|| {
        if service.is_null() {
            return fail_now(cb, user_data, FfiOutcome::null_arg("service"));
        }
        if url.is_null() {
            return fail_now(cb, user_data, FfiOutcome::null_arg("url"));
        }
        let Some(url) = (unsafe { c_str(url) }) else {
            return fail_now(cb, user_data, FfiOutcome::invalid_utf8("url"));
        };
        let service = unsafe { &*service };
        let user_data = UserData::new(user_data);
        let handle = service.inner.fetch_with(
            url,
            transfer_config(false, auto_validate),
            move |outcome| cb(FfiOutcome::from_fetch(outcome), user_data.get()),
        );
        into_handle(handle)
    }))
    .unwrap_or_else(|_| fail_now(cb, user_data, FfiOutcome::panic("panic in courier_fetch")))
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancel the call behind `handle`. Idempotent. Has no effect once the
/// callback has fired. No-op on null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_cancel(handle: *const FfiCancelHandle) {
    if !handle.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &*handle }.inner.cancel();
        }));
    }
}

/// Free a cancel handle. Does not cancel the call. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_cancel_handle_free(handle: *mut FfiCancelHandle) {
    if !handle.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(handle) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiOutcome` handed to a completion callback. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn courier_free_outcome(outcome: *mut FfiOutcome) {
    if outcome.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let outcome = unsafe { Box::from_raw(outcome) };
        if !outcome.message.is_null() {
            drop(unsafe { CString::from_raw(outcome.message) });
        }
        if !outcome.body.is_null() {
            drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(outcome.body, outcome.body_len)) });
        }
    });
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    /// Copy the interesting parts of an outcome and free it.
    #[derive(Debug)]
    struct Seen {
        code: FfiErrorCode,
        status: i32,
        body: Vec<u8>,
        message: Option<String>,
    }

    fn take(outcome: *mut FfiOutcome) -> Seen {
        let o = unsafe { &*outcome };
        let body = if o.body.is_null() {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(o.body, o.body_len) }.to_vec()
        };
        let message = (!o.message.is_null())
            .then(|| unsafe { CStr::from_ptr(o.message) }.to_string_lossy().into_owned());
        let seen = Seen {
            code: o.error_code,
            status: o.status,
            body,
            message,
        };
        courier_free_outcome(outcome);
        seen
    }

    extern "C" fn send_to_channel(outcome: *mut FfiOutcome, user_data: *mut c_void) {
        let tx = unsafe { &*(user_data as *const mpsc::Sender<Seen>) };
        let _ = tx.send(take(outcome));
    }

    extern "C" fn ignore_progress(_fraction: f64, _user_data: *mut c_void) {}

    fn channel() -> (mpsc::Sender<Seen>, mpsc::Receiver<Seen>) {
        mpsc::channel()
    }

    fn user_data(tx: &mpsc::Sender<Seen>) -> *mut c_void {
        tx as *const mpsc::Sender<Seen> as *mut c_void
    }

    /// Start the mock server on its own runtime thread and return its base URL.
    fn start_server() -> String {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
        });
        format!("http://{addr}")
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn service_new_and_free() {
        let service = courier_service_new();
        assert!(!service.is_null());
        assert!(courier_auto_validation(service));
        courier_set_auto_validation(service, false);
        assert!(!courier_auto_validation(service));
        courier_service_free(service);
    }

    #[test]
    fn free_null_is_safe() {
        courier_service_free(ptr::null_mut());
        courier_endpoint_free(ptr::null_mut());
        courier_cancel_handle_free(ptr::null_mut());
        courier_free_outcome(ptr::null_mut());
        courier_cancel(ptr::null());
    }

    #[test]
    fn endpoint_new_null_returns_null() {
        let path = CString::new("/ping").unwrap();
        assert!(courier_endpoint_new(FfiHttpMethod::Get, ptr::null(), path.as_ptr()).is_null());
    }

    #[test]
    fn endpoint_setters_update_parameters() {
        let base = CString::new("https://api.example.com").unwrap();
        let path = CString::new("/a").unwrap();
        let endpoint = courier_endpoint_new(FfiHttpMethod::Post, base.as_ptr(), path.as_ptr());

        let new_path = CString::new("/b").unwrap();
        let value = CString::new("v").unwrap();
        let field = CString::new("X-Field").unwrap();
        assert!(courier_endpoint_set_path(endpoint, new_path.as_ptr()));
        assert!(courier_endpoint_set_body(endpoint, b"abc".as_ptr(), 3));
        assert!(courier_endpoint_add_header(endpoint, value.as_ptr(), field.as_ptr()));
        assert!(courier_endpoint_set_timeout_ms(endpoint, 1500));

        let request = unsafe { &*endpoint }.inner.to_request().unwrap();
        assert_eq!(request.url.as_str(), "https://api.example.com/b");
        assert_eq!(request.body.as_deref(), Some(&b"abc"[..]));
        assert_eq!(request.headers, [("X-Field".to_string(), "v".to_string())]);
        assert_eq!(request.timeout, Some(Duration::from_millis(1500)));
        courier_endpoint_free(endpoint);
    }

    #[test]
    fn setters_reject_null_endpoint() {
        assert!(!courier_endpoint_set_timeout_ms(ptr::null(), 10));
        assert!(!courier_endpoint_set_body(ptr::null(), ptr::null(), 0));
    }

    #[test]
    fn concurrent_header_appends_all_land() {
        let base = CString::new("https://api.example.com").unwrap();
        let path = CString::new("/a").unwrap();
        let endpoint = courier_endpoint_new(FfiHttpMethod::Post, base.as_ptr(), path.as_ptr());
        let addr = endpoint as usize;

        let writers: Vec<_> = (0..4)
            .map(|t| {
                std::thread::spawn(move || {
                    let endpoint = addr as *const FfiEndpoint;
                    let field = CString::new("X-Seq").unwrap();
                    for i in 0..500 {
                        let value = CString::new(format!("{t}-{i}")).unwrap();
                        assert!(courier_endpoint_add_header(endpoint, value.as_ptr(), field.as_ptr()));
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let request = unsafe { &*endpoint }.inner.to_request().unwrap();
        assert_eq!(request.headers.len(), 2000);
        courier_endpoint_free(endpoint);
    }

    fn not_utf8() -> &'static CStr {
        CStr::from_bytes_with_nul(b"/a\xffb\0").unwrap()
    }

    #[test]
    fn endpoint_new_rejects_invalid_utf8() {
        let base = CString::new("https://api.example.com").unwrap();
        assert!(courier_endpoint_new(FfiHttpMethod::Delete, base.as_ptr(), not_utf8().as_ptr()).is_null());
        assert!(courier_endpoint_new(FfiHttpMethod::Delete, not_utf8().as_ptr(), base.as_ptr()).is_null());
    }

    #[test]
    fn setters_reject_invalid_utf8_and_keep_state() {
        let base = CString::new("https://api.example.com").unwrap();
        let path = CString::new("/a").unwrap();
        let endpoint = courier_endpoint_new(FfiHttpMethod::Get, base.as_ptr(), path.as_ptr());
        let field = CString::new("X-Field").unwrap();

        assert!(!courier_endpoint_set_path(endpoint, not_utf8().as_ptr()));
        assert!(!courier_endpoint_add_header(endpoint, not_utf8().as_ptr(), field.as_ptr()));
        assert!(!courier_endpoint_add_header(endpoint, field.as_ptr(), not_utf8().as_ptr()));

        let request = unsafe { &*endpoint }.inner.to_request().unwrap();
        assert_eq!(request.url.as_str(), "https://api.example.com/a");
        assert!(request.headers.is_empty());
        courier_endpoint_free(endpoint);
    }

    #[test]
    fn calls_with_invalid_utf8_fail_without_handle() {
        let service = courier_service_new();
        let url = CString::new("https://api.example.com/x").unwrap();
        let (tx, rx) = channel();

        let handle = courier_fetch(service, not_utf8().as_ptr(), -1, Some(send_to_channel), user_data(&tx));
        assert!(handle.is_null());
        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::InvalidUtf8);
        assert_eq!(seen.status, -1);
        assert_eq!(seen.message.as_deref(), Some("argument is not UTF-8: url"));

        let handle = courier_download(
            service,
            url.as_ptr(),
            not_utf8().as_ptr(),
            -1,
            None,
            Some(send_to_channel),
            user_data(&tx),
        );
        assert!(handle.is_null());
        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::InvalidUtf8);
        assert_eq!(seen.message.as_deref(), Some("argument is not UTF-8: dest"));
        courier_service_free(service);
    }

    #[test]
    fn request_with_null_service_reports_null_arg() {
        let (tx, rx) = channel();
        let handle = courier_request(
            ptr::null(),
            ptr::null(),
            false,
            -1,
            Some(send_to_channel),
            user_data(&tx),
        );
        assert!(handle.is_null());
        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::NullArg);
        assert_eq!(seen.status, -1);
        assert_eq!(seen.message.as_deref(), Some("null argument: service"));
    }

    #[test]
    fn request_without_callback_does_nothing() {
        let handle = courier_request(ptr::null(), ptr::null(), false, -1, None, ptr::null_mut());
        assert!(handle.is_null());
    }

    #[test]
    fn malformed_target_fails_without_handle() {
        let service = courier_service_new();
        let base = CString::new("not a url").unwrap();
        let path = CString::new("/ping").unwrap();
        let endpoint = courier_endpoint_new(FfiHttpMethod::Get, base.as_ptr(), path.as_ptr());
        let (tx, rx) = channel();

        let handle = courier_request(service, endpoint, false, -1, Some(send_to_channel), user_data(&tx));

        assert!(handle.is_null());
        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::MalformedTarget);
        assert_eq!(seen.status, -1);
        courier_endpoint_free(endpoint);
        courier_service_free(service);
    }

    #[test]
    fn request_round_trip_against_mock_server() {
        let base = CString::new(start_server()).unwrap();
        let service = courier_service_new();
        let path = CString::new("/ping").unwrap();
        let endpoint = courier_endpoint_new(FfiHttpMethod::Get, base.as_ptr(), path.as_ptr());
        let (tx, rx) = channel();

        let handle = courier_request(service, endpoint, false, -1, Some(send_to_channel), user_data(&tx));
        courier_endpoint_free(endpoint);

        assert!(!handle.is_null());
        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::Ok);
        assert_eq!(seen.status, 200);
        let json: serde_json::Value = serde_json::from_slice(&seen.body).unwrap();
        assert_eq!(json["ok"], true);
        courier_cancel_handle_free(handle);
        courier_service_free(service);
    }

    #[test]
    fn validation_failure_carries_status_and_body() {
        let base = CString::new(start_server()).unwrap();
        let service = courier_service_new();
        let path = CString::new("/status/404").unwrap();
        let endpoint = courier_endpoint_new(FfiHttpMethod::Get, base.as_ptr(), path.as_ptr());
        let (tx, rx) = channel();

        let handle = courier_request(service, endpoint, false, -1, Some(send_to_channel), user_data(&tx));

        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::Validation);
        assert_eq!(seen.status, 404);
        let json: serde_json::Value = serde_json::from_slice(&seen.body).unwrap();
        assert_eq!(json["error"], "not found");
        assert!(seen.message.is_some());
        courier_cancel_handle_free(handle);
        courier_endpoint_free(endpoint);
        courier_service_free(service);
    }

    #[test]
    fn per_call_opt_out_passes_error_status() {
        let base = CString::new(start_server()).unwrap();
        let service = courier_service_new();
        let path = CString::new("/status/500").unwrap();
        let endpoint = courier_endpoint_new(FfiHttpMethod::Get, base.as_ptr(), path.as_ptr());
        let (tx, rx) = channel();

        let handle = courier_request(service, endpoint, false, 0, Some(send_to_channel), user_data(&tx));

        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::Ok);
        assert_eq!(seen.status, 500);
        courier_cancel_handle_free(handle);
        courier_endpoint_free(endpoint);
        courier_service_free(service);
    }

    #[test]
    fn fetch_empty_body_is_null() {
        let base = start_server();
        let service = courier_service_new();
        let url = CString::new(format!("{base}/empty")).unwrap();
        let (tx, rx) = channel();

        let handle = courier_fetch(service, url.as_ptr(), -1, Some(send_to_channel), user_data(&tx));

        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::Ok);
        assert_eq!(seen.status, 200);
        assert!(seen.body.is_empty());
        courier_cancel_handle_free(handle);
        courier_service_free(service);
    }

    #[test]
    fn download_writes_destination() {
        let base = start_server();
        let service = courier_service_new();
        let dir = std::env::temp_dir().join(format!("courier-ffi-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let dest_path = dir.join("data.bin");
        let _ = std::fs::remove_file(&dest_path);
        let url = CString::new(format!("{base}/files/data.bin")).unwrap();
        let dest = CString::new(dest_path.to_str().unwrap()).unwrap();
        let (tx, rx) = channel();

        let handle = courier_download(
            service,
            url.as_ptr(),
            dest.as_ptr(),
            -1,
            Some(ignore_progress),
            Some(send_to_channel),
            user_data(&tx),
        );

        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::Ok, "{:?}", seen.message);
        assert!(seen.body.is_empty());
        assert_eq!(std::fs::read(&dest_path).unwrap(), mock_server::file_contents("data.bin"));
        let _ = std::fs::remove_dir_all(&dir);
        courier_cancel_handle_free(handle);
        courier_service_free(service);
    }

    #[test]
    fn cancel_reports_cancelled() {
        let base = CString::new(start_server()).unwrap();
        let service = courier_service_new();
        let path = CString::new("/slow").unwrap();
        let endpoint = courier_endpoint_new(FfiHttpMethod::Get, base.as_ptr(), path.as_ptr());
        let (tx, rx) = channel();

        let handle = courier_request(service, endpoint, false, -1, Some(send_to_channel), user_data(&tx));
        assert!(!handle.is_null());
        std::thread::sleep(Duration::from_millis(100));
        courier_cancel(handle);
        courier_cancel(handle);

        let seen = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(seen.code, FfiErrorCode::Cancelled);
        assert_eq!(seen.status, -1);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        courier_cancel_handle_free(handle);
        courier_endpoint_free(endpoint);
        courier_service_free(service);
    }
}
