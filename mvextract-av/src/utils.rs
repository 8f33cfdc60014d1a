//! # libav helpers

use ffmpeg_sys_next::*;
use libc::{c_char, c_int};
use mvextract::prelude::v1::*;
use std::ffi::{CStr, CString};

pub trait AsMutPtr {
    type Mut;

    fn as_mut_ptr(&mut self) -> &mut *mut Self::Mut;
}

impl<T: AsMutPtr> AsMutPtr for Option<T> {
    type Mut = T::Mut;

    fn as_mut_ptr(&mut self) -> &mut *mut Self::Mut {
        // SAFETY: `Option<&mut T>` has the same layout as a nullable `*mut T`.
        unsafe { std::mem::transmute(self) }
    }
}

impl<T> AsMutPtr for &mut T {
    type Mut = T;

    fn as_mut_ptr(&mut self) -> &mut *mut Self::Mut {
        unsafe { std::mem::transmute(self) }
    }
}

/// Describe a libav error code.
pub fn av_err(code: c_int) -> String {
    let mut buf = [0 as c_char; 128];

    if unsafe { av_strerror(code, buf.as_mut_ptr(), buf.len() as _) } < 0 {
        return format!("unknown error {code}");
    }

    let msg = unsafe { CStr::from_ptr(buf.as_ptr()) };
    format!("{} ({code})", msg.to_string_lossy())
}

/// Owned `AVDictionary` of options.
#[derive(Default)]
pub struct Dictionary(Option<&'static mut AVDictionary>);

impl Drop for Dictionary {
    fn drop(&mut self) {
        unsafe { av_dict_free(self.0.as_mut_ptr()) };
    }
}

impl Dictionary {
    pub fn set(&mut self, key: &CStr, value: &str) -> Result<()> {
        let value = CString::new(value)?;

        match unsafe { av_dict_set(self.0.as_mut_ptr(), key.as_ptr(), value.as_ptr(), 0) } {
            e if e < 0 => Err(anyhow!("Failed to set option {:?} ({})", key, av_err(e))),
            _ => Ok(()),
        }
    }

    pub fn get(&self, key: &CStr) -> Option<String> {
        let dict = self.0.as_deref()?;

        unsafe { av_dict_get(dict, key.as_ptr(), std::ptr::null(), 0).as_ref() }
            .and_then(|e| unsafe { e.value.as_ref() })
            .map(|v| unsafe { CStr::from_ptr(v) }.to_string_lossy().into_owned())
    }

    /// Pointer to pass to libav functions that consume and replace the dictionary.
    pub fn as_mut_ptr(&mut self) -> &mut *mut AVDictionary {
        self.0.as_mut_ptr()
    }
}

/// Short name of a codec.
pub fn codec_name(id: AVCodecID) -> String {
    unsafe { avcodec_get_name(id).as_ref() }
        .map(|n| unsafe { CStr::from_ptr(n) }.to_string_lossy().into_owned())
        .unwrap_or_default()
}
