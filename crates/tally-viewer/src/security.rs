use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFilename;

/// Resolves a requested result file name inside the outputs folder.
///
/// Purely lexical: anything that could leave the folder (parent segments,
/// separators of either platform, drive prefixes) is refused before the
/// filesystem is touched.
pub fn resolve_result_file(outputs_dir: &Path, name: &str) -> Result<PathBuf, InvalidFilename> {
    if name.trim().is_empty() {
        return Err(InvalidFilename);
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(InvalidFilename);
    }
    if name.contains(':') || name.contains('\0') {
        return Err(InvalidFilename);
    }
    Ok(outputs_dir.join(name))
}
