/*
 * This module provides utility functions for path manipulation, focusing on
 * retrieving and ensuring the existence of application-specific directories.
 * The configuration file and log live in the local config directory, the
 * persisted grocery slots in the local data directory.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const STORE_SUBFOLDER_NAME: &str = "store";

fn ensure_dir(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path) {
            log::error!("PathUtils: Failed to create directory {path:?}: {e}");
            return None;
        }
        log::debug!("PathUtils: Created directory: {path:?}");
    } else {
        log::trace!("PathUtils: Directory already exists: {path:?}");
    }
    Some(path.to_path_buf())
}

/*
 * Retrieves the application's local configuration directory, creating it
 * if necessary. Returns `None` when no home directory can be determined or
 * the directory cannot be created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|dirs| ensure_dir(dirs.config_local_dir()))
}

/*
 * Retrieves the directory holding the persisted store slots,
 * `<data_local_dir>/store`, creating it if necessary.
 */
pub fn get_default_store_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get store dir for '{app_name}'");
    ProjectDirs::from("", "", app_name)
        .and_then(|dirs| ensure_dir(&dirs.data_local_dir().join(STORE_SUBFOLDER_NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleanup(path: &Path) {
        if path.exists() {
            if let Err(e) = fs::remove_dir_all(path) {
                eprintln!("Test cleanup error for {}: {}", path.display(), e);
            }
        }
    }

    #[test]
    fn test_get_base_app_config_local_dir_creates_and_reuses() {
        // Using a highly unique app name to avoid collision with actual user configs.
        let unique_app_name = format!("TestApp_PathUtils_Config_{}", rand::random::<u128>());

        let Some(first) = get_base_app_config_local_dir(&unique_app_name) else {
            // No home directory in this environment.
            return;
        };
        assert!(first.is_dir());
        assert!(
            first
                .to_string_lossy()
                .to_lowercase()
                .contains(&unique_app_name.to_lowercase()),
            "Path should contain the app name. Path: {first:?}"
        );

        let second = get_base_app_config_local_dir(&unique_app_name);
        assert_eq!(second.as_ref(), Some(&first));

        cleanup(&first);
    }

    #[test]
    fn test_get_default_store_dir_ends_with_store() {
        let unique_app_name = format!("TestApp_PathUtils_Store_{}", rand::random::<u128>());

        let Some(store_dir) = get_default_store_dir(&unique_app_name) else {
            return;
        };
        assert!(store_dir.is_dir());
        assert_eq!(
            store_dir.file_name().unwrap_or_default(),
            STORE_SUBFOLDER_NAME
        );

        if let Some(parent) = store_dir.parent() {
            cleanup(parent);
        }
    }
}
