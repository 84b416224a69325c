//! Platform character strings as seen by the .NET hosting ABI.
//!
//! The hosting layer calls its character type `char_t`: UTF-16 code units on
//! Windows, bytes everywhere else. Every pointer that crosses the exported
//! surface or the `host_interface_t` structure uses this type.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

#[cfg(windows)]
pub type PalChar = u16;

#[cfg(not(windows))]
pub type PalChar = u8;

/// Separator used by hostpolicy for serialized path lists.
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';

#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';

/// Owned, NUL-terminated `char_t` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalString {
    units: Box<[PalChar]>,
}

impl PalString {
    pub fn new(value: impl AsRef<OsStr>) -> Self {
        let mut units = encode(value.as_ref());
        units.push(0);
        Self {
            units: units.into_boxed_slice(),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(path.as_os_str())
    }

    pub fn as_ptr(&self) -> *const PalChar {
        self.units.as_ptr()
    }

    /// Code units without the terminator.
    pub fn as_units(&self) -> &[PalChar] {
        &self.units[..self.units.len() - 1]
    }

    pub fn to_os_string(&self) -> OsString {
        decode(self.as_units())
    }
}

#[cfg(windows)]
fn encode(value: &OsStr) -> Vec<PalChar> {
    use std::os::windows::ffi::OsStrExt;
    value.encode_wide().collect()
}

#[cfg(not(windows))]
fn encode(value: &OsStr) -> Vec<PalChar> {
    use std::os::unix::ffi::OsStrExt;
    value.as_bytes().to_vec()
}

#[cfg(windows)]
fn decode(units: &[PalChar]) -> OsString {
    use std::os::windows::ffi::OsStringExt;
    OsString::from_wide(units)
}

#[cfg(not(windows))]
fn decode(units: &[PalChar]) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(units.to_vec())
}

/// Borrows a NUL-terminated `char_t` string. Null yields `None`.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub unsafe fn units_from_ptr<'a>(ptr: *const PalChar) -> Option<&'a [PalChar]> {
    if ptr.is_null() {
        return None;
    }

    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    Some(std::slice::from_raw_parts(ptr, len))
}

/// Copies a NUL-terminated `char_t` string into an owned path.
///
/// # Safety
///
/// Same contract as [`units_from_ptr`].
pub unsafe fn path_from_ptr(ptr: *const PalChar) -> Option<PathBuf> {
    units_from_ptr(ptr).map(|units| PathBuf::from(decode(units)))
}

/// Returns true when the last path component of `requested` equals
/// `file_name`, ignoring ASCII case. Both separators are honored so a Windows
/// style path matches on any host.
pub fn file_name_matches(requested: &[PalChar], file_name: &str) -> bool {
    let start = requested
        .iter()
        .rposition(|&unit| unit == PalChar::from(b'\\') || unit == PalChar::from(b'/'))
        .map_or(0, |pos| pos + 1);
    let tail = &requested[start..];

    tail.len() == file_name.len()
        && tail.iter().zip(file_name.bytes()).all(|(&unit, expected)| {
            u8::try_from(unit).is_ok_and(|byte| byte.eq_ignore_ascii_case(&expected))
        })
}
