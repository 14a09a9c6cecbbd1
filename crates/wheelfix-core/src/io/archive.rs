//! Wheel archive inspection.

use std::fs::File;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid wheel archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// True for shared-object member names: `lib.so` or versioned `lib.so.1.2`.
pub fn is_shared_object(member: &str) -> bool {
    let base = member.rsplit('/').next().unwrap_or(member);
    base.ends_with(".so") || base.contains(".so.")
}

/// Shared-library member names of a wheel, in archive order.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not a zip archive.
pub fn native_libraries(wheel: &Path) -> Result<Vec<String>, ArchiveError> {
    let archive = zip::ZipArchive::new(File::open(wheel)?)?;
    Ok((0..archive.len())
        .filter_map(|i| archive.name_for_index(i))
        .filter(|name| !name.ends_with('/') && is_shared_object(name))
        .map(ToString::to_string)
        .collect())
}
