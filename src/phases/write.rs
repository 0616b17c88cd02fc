//! Committing staged output
//!
//! Include outputs are rendered into a `MemoryFS` first, so a component that
//! fails halfway never touches the disk. Once every include rendered, the
//! staged files are committed:
//!
//! 1.  **Compare**: a file whose on-disk bytes already equal the staged bytes
//!     is left alone, so unchanged output keeps its mtime and is not counted
//!     as a write.
//!
//! 2.  **Write aside**: changed content goes to a temp file in the
//!     destination directory.
//!
//! 3.  **Rename**: the temp file replaces the destination in one step, so a
//!     reader never sees a half-written file.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::filesystem::MemoryFS;

/// Mode of generated files on Unix (temp files start out owner-only)
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o644;

/// What a commit did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Files created or replaced
    pub written: usize,
    /// Files whose content was already up to date
    pub unchanged: usize,
}

/// Commit every staged file below `output_dir`.
pub fn execute(staged: &MemoryFS, output_dir: &Path) -> Result<WriteStats> {
    let mut stats = WriteStats::default();
    for (relative_path, file) in staged.files() {
        let full_path = output_dir.join(relative_path);

        if fs::read(&full_path).is_ok_and(|current| current == file.content) {
            stats.unchanged += 1;
            continue;
        }

        let parent = full_path.parent().unwrap_or(output_dir);
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create temp file in '{}': {}", parent.display(), e),
        })?;
        temp.write_all(&file.content).map_err(|e| Error::Filesystem {
            message: format!("Failed to write '{}': {}", full_path.display(), e),
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(OUTPUT_MODE))
                .map_err(|e| Error::Filesystem {
                    message: format!(
                        "Failed to set permissions on '{}': {}",
                        full_path.display(),
                        e
                    ),
                })?;
        }

        temp.persist(&full_path).map_err(|e| Error::Filesystem {
            message: format!("Failed to replace '{}': {}", full_path.display(), e.error),
        })?;
        stats.written += 1;
    }

    Ok(stats)
}
