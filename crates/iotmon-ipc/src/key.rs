use std::ffi::CString;
use std::io;
use std::path::Path;

use crate::error::ResourceError;

/// Derives a System V IPC key from a filesystem path and a small integer id
/// with `ftok(3)`. The path must name an existing file.
pub(crate) fn derive(path: &Path, id: i32) -> Result<libc::key_t, ResourceError> {
    let bad_key = |source| ResourceError::KeyDerivation {
        path: path.display().to_string(),
        id,
        source,
    };
    let c_path = CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|e| bad_key(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
    let key = unsafe { libc::ftok(c_path.as_ptr(), id) };
    if key == -1 {
        return Err(bad_key(io::Error::last_os_error()));
    }
    Ok(key)
}

/// Maps a failed `*get(2)` call to the create-vs-attach error taxonomy.
pub(crate) fn open_error(path: &Path, id: i32, create: bool) -> ResourceError {
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EEXIST) if create => ResourceError::AlreadyExists {
            path: path.display().to_string(),
            id,
        },
        Some(libc::ENOENT) if !create => ResourceError::NotFound {
            path: path.display().to_string(),
            id,
        },
        _ => ResourceError::Sys(err),
    }
}
