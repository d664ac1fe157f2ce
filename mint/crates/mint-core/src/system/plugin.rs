//! Plugin loading and the C plugin ABI.
//!
//! A plugin is a dynamic library exporting C-linkage functions named
//! `<name>_<arity>` (exact arity) or `<name>_v<n>` (variadic with at least
//! `n` fixed arguments). Each export takes one [`CursorHandle`] pointer and
//! manipulates the value stack through it to consume arguments and push a
//! result.
//!
//! Resolution order for a call of arity `s`: `name_s` first, then
//! `name_v1 ‥ name_vs`.

use crate::ast::cursor::Cursor;
use crate::ast::runtime::Runtime;
use crate::error::{MintError, MintResult};
use mint_util::Symbol;
use std::ffi::{c_void, CString};

/// The single argument of every plugin export.
///
/// Opaque to plugins except through the accessor functions the host binary
/// re-exports; layout stability is the contract.
#[repr(C)]
pub struct CursorHandle {
    pub runtime: *mut Runtime,
    pub cursor: *mut Cursor,
}

/// C-linkage entry point exported by plugins.
pub type PluginFunction = unsafe extern "C" fn(*mut CursorHandle);

/// An opaque handle to a loaded dynamic library.
pub struct Plugin {
    name: String,
    handle: *mut c_void,
}

// The raw library handle is process-global state guarded by the processor
// lock; the loader APIs themselves are thread-safe on every supported
// platform.
unsafe impl Send for Plugin {}
unsafe impl Sync for Plugin {}

impl Plugin {
    /// Load a dynamic library by path or name.
    pub fn load(path: &str) -> Result<Plugin, String> {
        let handle = platform::open(path)?;
        Ok(Plugin {
            name: path.to_string(),
            handle,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve `<name>_<signature>`, falling back through the variadic
    /// forms.
    pub fn resolve(&self, name: Symbol, signature: i32) -> Option<PluginFunction> {
        let exact = format!("{}_{}", name.as_str(), signature);
        if let Some(function) = self.symbol(&exact) {
            return Some(function);
        }
        for fixed in 1..=signature {
            let variadic = format!("{}_v{}", name.as_str(), fixed);
            if let Some(function) = self.symbol(&variadic) {
                return Some(function);
            }
        }
        None
    }

    /// Dispatch a resolved export with the cursor handle.
    ///
    /// A missing export raises UNHANDLED at the call site.
    pub fn call(
        &self,
        runtime: &mut Runtime,
        cursor: &mut Cursor,
        name: Symbol,
        signature: i32,
    ) -> MintResult<()> {
        let function = self.resolve(name, signature).ok_or_else(|| {
            MintError::Unhandled(format!(
                "plugin '{}' exports no '{}' accepting {} argument(s)",
                self.name, name, signature
            ))
        })?;

        let mut handle = CursorHandle {
            runtime: runtime as *mut Runtime,
            cursor: cursor as *mut Cursor,
        };
        // The plugin only touches VM state through the handle, under the
        // processor lock the caller already holds.
        unsafe { function(&mut handle as *mut CursorHandle) };
        Ok(())
    }

    fn symbol(&self, name: &str) -> Option<PluginFunction> {
        let symbol = CString::new(name).ok()?;
        let address = platform::lookup(self.handle, &symbol)?;
        // Transmuting a data pointer to a function pointer is the defined
        // contract of the platform loaders for code symbols.
        Some(unsafe { std::mem::transmute::<*mut c_void, PluginFunction>(address) })
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        platform::close(self.handle);
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::{c_void, CStr, CString};

    pub fn open(path: &str) -> Result<*mut c_void, String> {
        let path = CString::new(path).map_err(|_| "path contains a NUL byte".to_string())?;
        let handle = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_LAZY | libc::RTLD_LOCAL) };
        if handle.is_null() {
            let message = unsafe {
                let error = libc::dlerror();
                if error.is_null() {
                    "unknown dlopen failure".to_string()
                } else {
                    CStr::from_ptr(error).to_string_lossy().into_owned()
                }
            };
            return Err(message);
        }
        Ok(handle)
    }

    pub fn lookup(handle: *mut c_void, symbol: &CStr) -> Option<*mut c_void> {
        let address = unsafe { libc::dlsym(handle, symbol.as_ptr()) };
        if address.is_null() {
            None
        } else {
            Some(address)
        }
    }

    pub fn close(handle: *mut c_void) {
        if !handle.is_null() {
            unsafe { libc::dlclose(handle) };
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::ffi::{c_void, CStr, CString};
    use windows_sys::Win32::Foundation::HMODULE;
    use windows_sys::Win32::System::LibraryLoader::{
        FreeLibrary, GetProcAddress, LoadLibraryA,
    };

    pub fn open(path: &str) -> Result<*mut c_void, String> {
        let path = CString::new(path).map_err(|_| "path contains a NUL byte".to_string())?;
        let handle = unsafe { LoadLibraryA(path.as_ptr() as *const u8) };
        if handle == 0 {
            return Err(format!("cannot load library '{}'", path.to_string_lossy()));
        }
        Ok(handle as *mut c_void)
    }

    pub fn lookup(handle: *mut c_void, symbol: &CStr) -> Option<*mut c_void> {
        let address =
            unsafe { GetProcAddress(handle as HMODULE, symbol.as_ptr() as *const u8) };
        address.map(|function| function as *mut c_void)
    }

    pub fn close(handle: *mut c_void) {
        if !handle.is_null() {
            unsafe { FreeLibrary(handle as HMODULE) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_reports_an_error() {
        assert!(Plugin::load("/nonexistent/libmint_test_plugin.so").is_err());
    }

    #[test]
    fn cursor_handle_is_ffi_shaped() {
        // Two pointers, C layout.
        assert_eq!(
            std::mem::size_of::<CursorHandle>(),
            2 * std::mem::size_of::<usize>()
        );
    }
}
