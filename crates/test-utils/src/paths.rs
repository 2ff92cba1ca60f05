//! Path utilities for test output.

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_test_dir_is_removed_on_drop() {
        let dir = temp_test_dir();
        let path = dir.path().to_path_buf();
        assert!(path.is_dir());
        drop(dir);
        assert!(!path.exists());
    }
}
