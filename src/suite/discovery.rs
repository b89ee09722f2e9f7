use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{DefcheckError, DefcheckResult};

fn is_suite_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

/// Finds suite files under `root`. A file path is returned as-is.
///
/// The list is sorted so suites always run in the same order.
pub fn discover_suite_files<P: AsRef<Path>>(root: P) -> DefcheckResult<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.exists() {
        return Err(DefcheckError::io(
            "read",
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        ));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| DefcheckError::walk(root, e))?;
        if !entry.file_type().is_file() || !is_suite_file(entry.path()) {
            continue;
        }
        files.push(entry.path().to_path_buf());
    }
    files.sort();
    debug!(root = %root.display(), suites = files.len(), "discovered suites");
    Ok(files)
}
