use std::path::Path;

/// Adds the read and execute bits to a written image.
#[cfg(any(unix, target_os = "redox"))]
pub fn set_executable_permissions(path: &Path) -> std::io::Result<()> {
    use ::std::{
        fs::{metadata, set_permissions},
        os::unix::prelude::*,
    };
    let mut perm = metadata(path)?.permissions();
    perm.set_mode(perm.mode() | 0o755);
    set_permissions(path, perm)
}

#[cfg(not(any(unix, target_os = "redox")))]
pub fn set_executable_permissions(_: &Path) -> std::io::Result<()> { Ok(()) }
