//! C FFI layer for hosts written in other languages.
//!
//! A host creates one renderer handle from its settings, pushes document
//! preambles on it, renders, and resets the preambles after each document.
//! A handle must not be used from two threads at once.

use crate::config::Options;
use crate::preamble::LocalPreambles;
use crate::render::Renderer;
use libc::{c_char, c_int};
use std::ffi::{CStr, CString};
use std::ptr;

/// Opaque handle to a renderer and its document-local preambles.
pub struct PelicanKatexRenderer {
    renderer: Renderer,
    preambles: LocalPreambles,
}

/// Result type for FFI operations.
#[repr(C)]
pub struct PelicanKatexResult {
    /// Pointer to result string (caller must free with pelican_katex_free_string)
    pub data: *mut c_char,
    /// Error message if data is null (caller must free with pelican_katex_free_string)
    pub error: *mut c_char,
}

impl PelicanKatexResult {
    /// Markup that cannot cross the C boundary intact becomes an error.
    fn ok(data: String) -> Self {
        match CString::new(data) {
            Ok(data) => Self {
                data: data.into_raw(),
                error: ptr::null_mut(),
            },
            Err(err) => Self::err(format!(
                "Rendered output contains a NUL byte at offset {}",
                err.nul_position()
            )),
        }
    }

    /// NUL bytes in error text are written as `\0`.
    fn err(error: String) -> Self {
        let error = CString::new(error).unwrap_or_else(|err| {
            let escaped = String::from_utf8_lossy(&err.into_vec()).replace('\0', "\\0");
            CString::new(escaped).unwrap_or_default()
        });
        Self {
            data: ptr::null_mut(),
            error: error.into_raw(),
        }
    }
}

/// Read a nullable C string. `Ok(None)` for null, `Err` for invalid UTF-8.
unsafe fn opt_str<'a>(s: *const c_char) -> Result<Option<&'a str>, ()> {
    if s.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(s).to_str().map(Some).map_err(|_| ())
}

/// Create a renderer from TOML settings.
///
/// Returns null if the settings are not valid UTF-8, cannot be parsed, or
/// name an unknown backend. A null `settings` pointer uses the defaults.
///
/// # Safety
///
/// - `settings` must be a valid null-terminated string, or null.
/// - The returned handle must be freed with `pelican_katex_free_renderer`.
#[no_mangle]
pub unsafe extern "C" fn pelican_katex_renderer_new(
    settings: *const c_char,
) -> *mut PelicanKatexRenderer {
    let settings = match opt_str(settings) {
        Ok(s) => s.unwrap_or(""),
        Err(()) => return ptr::null_mut(),
    };

    let renderer = match Renderer::from_settings(settings) {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(
                target = "pelican_katex::ffi",
                op = "ffi::renderer_new",
                error = %err,
                "Rejected renderer settings"
            );
            return ptr::null_mut();
        }
    };

    Box::into_raw(Box::new(PelicanKatexRenderer {
        renderer,
        preambles: LocalPreambles::new(),
    }))
}

/// Append a document-local preamble fragment.
///
/// Returns 0 on success, -1 on a null pointer or invalid UTF-8.
///
/// # Safety
///
/// - `handle` must be a valid pointer from `pelican_katex_renderer_new`.
/// - `text` must be a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn pelican_katex_push_preamble(
    handle: *mut PelicanKatexRenderer,
    text: *const c_char,
) -> c_int {
    if handle.is_null() {
        return -1;
    }
    match opt_str(text) {
        Ok(Some(text)) => {
            (*handle).preambles.push(text);
            0
        }
        _ => -1,
    }
}

/// Drop all document-local preamble fragments.
///
/// # Safety
///
/// - `handle` must be a valid pointer from `pelican_katex_renderer_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn pelican_katex_reset_preamble(handle: *mut PelicanKatexRenderer) {
    if !handle.is_null() {
        (*handle).preambles.reset();
    }
}

/// The effective preamble: global preamble followed by local fragments.
///
/// Returns null when there is none, or when it contains a NUL byte and so
/// cannot be represented as a C string.
///
/// # Safety
///
/// - `handle` must be a valid pointer from `pelican_katex_renderer_new`.
/// - A non-null result must be freed with `pelican_katex_free_string`.
#[no_mangle]
pub unsafe extern "C" fn pelican_katex_get_preamble(
    handle: *const PelicanKatexRenderer,
) -> *mut c_char {
    if handle.is_null() {
        return ptr::null_mut();
    }
    let handle = &*handle;
    match handle
        .preambles
        .effective(handle.renderer.config().preamble.as_deref())
    {
        Some(preamble) => match CString::new(preamble) {
            Ok(preamble) => preamble.into_raw(),
            Err(err) => {
                tracing::warn!(
                    target = "pelican_katex::ffi",
                    op = "ffi::get_preamble",
                    nul_position = err.nul_position(),
                    "Preamble contains a NUL byte"
                );
                ptr::null_mut()
            }
        },
        None => ptr::null_mut(),
    }
}

/// Render LaTeX to markup.
///
/// `options_json` holds per-call options as a JSON object, e.g.
/// `{"displayMode": true}`, or is null.
///
/// # Safety
///
/// - `handle` must be a valid pointer from `pelican_katex_renderer_new`.
/// - `latex` must be a valid null-terminated string.
/// - `options_json` must be a valid null-terminated string, or null.
/// - The result must be freed with `pelican_katex_free_result`.
#[no_mangle]
pub unsafe extern "C" fn pelican_katex_render(
    handle: *const PelicanKatexRenderer,
    latex: *const c_char,
    options_json: *const c_char,
) -> PelicanKatexResult {
    if handle.is_null() {
        return PelicanKatexResult::err("Null renderer pointer".to_string());
    }
    let handle = &*handle;

    let latex = match opt_str(latex) {
        Ok(Some(s)) => s,
        Ok(None) => return PelicanKatexResult::err("Null input pointer".to_string()),
        Err(()) => return PelicanKatexResult::err("Invalid UTF-8 input".to_string()),
    };

    let options = match opt_str(options_json) {
        Ok(None) => None,
        Ok(Some(json)) => match serde_json::from_str::<Options>(json) {
            Ok(options) => Some(options),
            Err(e) => return PelicanKatexResult::err(format!("Invalid options: {}", e)),
        },
        Err(()) => return PelicanKatexResult::err("Invalid UTF-8 options".to_string()),
    };

    match handle
        .renderer
        .render_latex_with(latex, options.as_ref(), &handle.preambles)
    {
        Ok(html) => PelicanKatexResult::ok(html),
        Err(e) => PelicanKatexResult::err(e.to_string()),
    }
}

/// Free a string returned by pelican_katex functions.
///
/// # Safety
///
/// - `s` must be a pointer returned by a pelican_katex function, or null.
#[no_mangle]
pub unsafe extern "C" fn pelican_katex_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Free a result struct.
///
/// # Safety
///
/// - `result` must be a valid PelicanKatexResult.
#[no_mangle]
pub unsafe extern "C" fn pelican_katex_free_result(result: PelicanKatexResult) {
    pelican_katex_free_string(result.data);
    pelican_katex_free_string(result.error);
}

/// Free a renderer handle, stopping its render server if one is running.
///
/// # Safety
///
/// - `handle` must be a pointer returned by `pelican_katex_renderer_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn pelican_katex_free_renderer(handle: *mut PelicanKatexRenderer) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Get the library version.
///
/// The returned string is static and must not be freed.
#[no_mangle]
pub extern "C" fn pelican_katex_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

/// ```c
/// // pelican_katex.h
/// #ifndef PELICAN_KATEX_H
/// #define PELICAN_KATEX_H
///
/// typedef struct PelicanKatexRenderer PelicanKatexRenderer;
///
/// typedef struct {
///     char* data;
///     char* error;
/// } PelicanKatexResult;
///
/// PelicanKatexRenderer* pelican_katex_renderer_new(const char* settings_toml);
/// int pelican_katex_push_preamble(PelicanKatexRenderer* handle, const char* text);
/// void pelican_katex_reset_preamble(PelicanKatexRenderer* handle);
/// char* pelican_katex_get_preamble(const PelicanKatexRenderer* handle);
/// PelicanKatexResult pelican_katex_render(const PelicanKatexRenderer* handle,
///                                         const char* latex,
///                                         const char* options_json);
/// void pelican_katex_free_string(char* s);
/// void pelican_katex_free_result(PelicanKatexResult result);
/// void pelican_katex_free_renderer(PelicanKatexRenderer* handle);
/// const char* pelican_katex_version(void);
///
/// #endif
/// ```
const _: () = ();

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn take(s: *mut c_char) -> Option<String> {
        if s.is_null() {
            return None;
        }
        let owned = CStr::from_ptr(s).to_str().unwrap().to_string();
        pelican_katex_free_string(s);
        Some(owned)
    }

    #[test]
    fn test_preamble_lifecycle() {
        unsafe {
            let settings = c("[katex]\npreamble = 'global'\n");
            let handle = pelican_katex_renderer_new(settings.as_ptr());
            assert!(!handle.is_null());

            assert_eq!(take(pelican_katex_get_preamble(handle)).as_deref(), Some("global"));

            assert_eq!(pelican_katex_push_preamble(handle, c("a").as_ptr()), 0);
            assert_eq!(pelican_katex_push_preamble(handle, c("b").as_ptr()), 0);
            assert_eq!(
                take(pelican_katex_get_preamble(handle)).as_deref(),
                Some("global\na\nb")
            );

            pelican_katex_reset_preamble(handle);
            pelican_katex_reset_preamble(handle);
            assert_eq!(take(pelican_katex_get_preamble(handle)).as_deref(), Some("global"));

            pelican_katex_free_renderer(handle);
        }
    }

    #[test]
    fn test_no_preamble_is_null() {
        unsafe {
            let handle = pelican_katex_renderer_new(ptr::null());
            assert!(!handle.is_null());
            assert!(pelican_katex_get_preamble(handle).is_null());
            assert_eq!(pelican_katex_push_preamble(handle, ptr::null()), -1);
            pelican_katex_free_renderer(handle);
        }
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        unsafe {
            let settings = c("backend = 'unsupported'\n");
            assert!(pelican_katex_renderer_new(settings.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_invalid_options() {
        unsafe {
            let handle = pelican_katex_renderer_new(ptr::null());
            let result = pelican_katex_render(handle, c("x").as_ptr(), c("[1, 2]").as_ptr());

            assert!(result.data.is_null());
            let error = CStr::from_ptr(result.error).to_str().unwrap().to_string();
            assert!(error.starts_with("Invalid options"));

            pelican_katex_free_result(result);
            pelican_katex_free_renderer(handle);
        }
    }

    #[cfg(feature = "mathml")]
    #[test]
    fn test_render() {
        unsafe {
            let handle = pelican_katex_renderer_new(ptr::null());
            let result = pelican_katex_render(
                handle,
                c("x^2").as_ptr(),
                c(r#"{"displayMode": true}"#).as_ptr(),
            );

            assert!(result.error.is_null());
            let html = take(result.data).unwrap();
            assert!(html.contains("display=\"block\""));

            pelican_katex_free_renderer(handle);
        }
    }

    #[test]
    fn test_nul_in_output_becomes_error() {
        unsafe {
            let result = PelicanKatexResult::ok("<math>a\0b</math>".to_string());

            assert!(result.data.is_null());
            let error = CStr::from_ptr(result.error).to_str().unwrap().to_string();
            assert_eq!(error, "Rendered output contains a NUL byte at offset 7");

            pelican_katex_free_result(result);
        }
    }

    #[test]
    fn test_nul_in_error_is_escaped() {
        unsafe {
            let result = PelicanKatexResult::err("bad \0 input".to_string());

            assert!(result.data.is_null());
            assert_eq!(take(result.error).as_deref(), Some("bad \\0 input"));
        }
    }

    #[test]
    fn test_nul_in_global_preamble_is_null() {
        unsafe {
            let settings = c("preamble = \"a\\u0000b\"\n");
            let handle = pelican_katex_renderer_new(settings.as_ptr());
            assert!(!handle.is_null());

            assert!(pelican_katex_get_preamble(handle).is_null());

            pelican_katex_free_renderer(handle);
        }
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(pelican_katex_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
