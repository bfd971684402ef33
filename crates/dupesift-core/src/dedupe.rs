//! Collapsing descriptors that point at the same underlying file.

use ahash::AHashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::types::FileEntry;

/// Drop entries whose path is already represented, keeping first-seen order.
///
/// The lowercased path string is only a coarse collision key: on a
/// case-sensitive filesystem `Readme` and `readme` are distinct files, so a
/// collision is settled by asking the OS whether the two paths resolve to the
/// same file. A probe failure means one of the paths vanished mid-scan, in
/// which case the later entry is dropped like a duplicate.
pub fn remove_duplicate_paths(files: Vec<FileEntry>) -> Vec<FileEntry> {
    let mut first_seen: AHashMap<String, PathBuf> = AHashMap::with_capacity(files.len());
    let mut result = Vec::with_capacity(files.len());
    for file in files {
        let key = file.path().to_string_lossy().to_lowercase();
        match first_seen.get(&key) {
            Some(original) => match same_file::is_same_file(file.path(), original) {
                Ok(true) | Err(_) => {
                    debug!(path = %file.path().display(), "Dropping duplicate path");
                    continue;
                }
                Ok(false) => {}
            },
            None => {
                first_seen.insert(key, file.path().to_path_buf());
            }
        }
        result.push(file);
    }
    result
}
