//! Version metadata for C callers.

use std::os::raw::c_char;

use crate::error::cstring_from_str_lossy;

/// Returns the funclib crate version.
///
/// The returned string is heap-allocated and must be freed with `funclib_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn funclib_version() -> *mut c_char {
    cstring_from_str_lossy(env!("CARGO_PKG_VERSION")).into_raw()
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;
    use crate::error::funclib_string_free;

    #[test]
    fn reports_crate_version() {
        let version = funclib_version();
        assert!(!version.is_null());

        let text = unsafe { CStr::from_ptr(version) }.to_str().unwrap();
        assert_eq!(text, env!("CARGO_PKG_VERSION"));

        funclib_string_free(version);
    }
}
