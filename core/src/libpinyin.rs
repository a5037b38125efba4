//! Adapter for the system libpinyin C library.
//!
//! Only built with the `system-libpinyin` feature, which links `-lpinyin`.
//! Instances are raw engine handles; the caller uses them with the rest of
//! the libpinyin API and gives them back through the backend.

use std::ffi::{c_char, c_int, CString};
use std::path::Path;
use std::ptr::{self, NonNull};

use tracing::debug;

use crate::engine::{ConversionContext, ConversionEngine, Family};
use crate::error::EngineError;
use crate::options::EngineOptions;
use crate::scheme::KeyboardScheme;

#[repr(C)]
pub struct RawContext {
    _private: [u8; 0],
}

#[repr(C)]
pub struct RawInstance {
    _private: [u8; 0],
}

#[link(name = "pinyin")]
extern "C" {
    fn pinyin_init(systemdir: *const c_char, userdir: *const c_char) -> *mut RawContext;
    fn pinyin_fini(context: *mut RawContext);
    fn pinyin_alloc_instance(context: *mut RawContext) -> *mut RawInstance;
    fn pinyin_free_instance(instance: *mut RawInstance);
    fn pinyin_set_double_pinyin_scheme(context: *mut RawContext, scheme: c_int) -> bool;
    fn pinyin_set_chewing_scheme(context: *mut RawContext, scheme: c_int) -> bool;
    fn pinyin_set_options(context: *mut RawContext, options: u32) -> bool;
    fn pinyin_save(context: *mut RawContext) -> bool;
}

fn path_to_cstring(path: &Path) -> Result<CString, EngineError> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("path {:?} contains a NUL byte", path),
        ))
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LibPinyinEngine;

impl ConversionEngine for LibPinyinEngine {
    type Context = LibPinyinContext;

    fn init_context(
        &self,
        family: Family,
        data_dir: &Path,
        user_dir: Option<&Path>,
    ) -> Result<LibPinyinContext, EngineError> {
        let data = path_to_cstring(data_dir)?;
        let user = user_dir.map(path_to_cstring).transpose()?;
        let user_ptr = user.as_ref().map_or(ptr::null(), |dir| dir.as_ptr());

        // SAFETY: both strings outlive the call; libpinyin copies the paths.
        let raw = unsafe { pinyin_init(data.as_ptr(), user_ptr) };
        let raw = NonNull::new(raw).ok_or(EngineError::NullHandle("context"))?;
        debug!(%family, ?data_dir, ?user_dir, "libpinyin context ready");
        Ok(LibPinyinContext { raw })
    }
}

pub struct LibPinyinContext {
    raw: NonNull<RawContext>,
}

impl LibPinyinContext {
    pub fn as_ptr(&self) -> *mut RawContext {
        self.raw.as_ptr()
    }
}

impl ConversionContext for LibPinyinContext {
    type Instance = LibPinyinInstance;

    fn alloc_instance(&mut self) -> Result<LibPinyinInstance, EngineError> {
        // SAFETY: `raw` is a live context until this value is dropped.
        let raw = unsafe { pinyin_alloc_instance(self.raw.as_ptr()) };
        let raw = NonNull::new(raw).ok_or(EngineError::NullHandle("instance"))?;
        Ok(LibPinyinInstance { raw })
    }

    fn free_instance(&mut self, instance: LibPinyinInstance) {
        // SAFETY: the instance came from `pinyin_alloc_instance` and is consumed here.
        unsafe { pinyin_free_instance(instance.raw.as_ptr()) }
    }

    fn set_keyboard_scheme(&mut self, scheme: KeyboardScheme) -> Result<(), EngineError> {
        // SAFETY: live context, plain integer argument.
        let accepted = unsafe {
            match scheme {
                KeyboardScheme::DoublePinyin(s) => {
                    pinyin_set_double_pinyin_scheme(self.raw.as_ptr(), s.raw())
                }
                KeyboardScheme::Chewing(s) => pinyin_set_chewing_scheme(self.raw.as_ptr(), s.raw()),
            }
        };
        if accepted {
            Ok(())
        } else {
            Err(EngineError::Rejected("keyboard scheme"))
        }
    }

    fn set_options(&mut self, options: EngineOptions) -> Result<(), EngineError> {
        // SAFETY: live context, plain integer argument.
        if unsafe { pinyin_set_options(self.raw.as_ptr(), options.bits()) } {
            Ok(())
        } else {
            Err(EngineError::Rejected("options"))
        }
    }

    fn save(&mut self) -> Result<(), EngineError> {
        // SAFETY: live context.
        if unsafe { pinyin_save(self.raw.as_ptr()) } {
            Ok(())
        } else {
            Err(EngineError::Rejected("save"))
        }
    }
}

impl Drop for LibPinyinContext {
    fn drop(&mut self) {
        // SAFETY: the context is never used after this point.
        unsafe { pinyin_fini(self.raw.as_ptr()) }
    }
}

/// Raw `pinyin_instance_t` handle.
pub struct LibPinyinInstance {
    raw: NonNull<RawInstance>,
}

impl LibPinyinInstance {
    pub fn as_ptr(&self) -> *mut RawInstance {
        self.raw.as_ptr()
    }
}
