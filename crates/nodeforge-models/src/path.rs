//! Path normalization for lock keys.
//!
//! `normalize` is the single source of truth for "are these two paths the
//! same lock key" across the whole coordinator: the lock manager, the
//! sweeper, and the API layer's request validation all call it instead of
//! comparing raw strings.

use crate::error::ModelError;

const FOLDER_LOCK_PREFIX: &str = "folder_lock:";

/// Normalize a filesystem path into a lock key.
///
/// Steps, applied in order: reject null/empty/whitespace-only input, trim
/// surrounding whitespace, strip trailing `/`/`\`, fold `\` to `/`, and
/// lowercase with invariant (non-locale) casing.
pub fn normalize(path: &str) -> Result<String, ModelError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ModelError::EmptyFilePath);
    }

    let without_trailing = trimmed.trim_end_matches(['/', '\\']);
    if without_trailing.is_empty() {
        return Err(ModelError::EmptyFilePath);
    }

    let forward_slashed = without_trailing.replace('\\', "/");
    let normalized = forward_slashed.to_lowercase();

    if normalized.len() > 1024 {
        return Err(ModelError::FilePathTooLong);
    }

    Ok(normalized)
}

/// Key for a whole-folder lock: `normalize`'s output namespaced so a folder
/// lock on a path can never collide with a file lock on the same string.
pub fn folder_lock_key(path: &str) -> Result<String, ModelError> {
    Ok(format!("{FOLDER_LOCK_PREFIX}{}", normalize(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(normalize("").is_err());
        assert!(normalize("   ").is_err());
        assert!(normalize("///").is_err());
    }

    #[test]
    fn strips_trailing_separators_case_and_backslashes() {
        assert_eq!(normalize("Y:\\Data\\Shot01").unwrap(), "y:/data/shot01");
        assert_eq!(normalize("y:/data/shot01/").unwrap(), "y:/data/shot01");
        assert_eq!(normalize("  y:/Data/Shot01//  ").unwrap(), "y:/data/shot01");
    }

    #[test]
    fn folder_lock_key_namespaces_the_normalized_path() {
        let key = folder_lock_key("Y:\\Data\\Shot01/").unwrap();
        assert_eq!(key, "folder_lock:y:/data/shot01");
        assert_ne!(key, normalize("Y:\\Data\\Shot01/").unwrap());
    }

    #[test]
    fn folder_lock_key_rejects_the_same_inputs_as_normalize() {
        assert!(folder_lock_key("").is_err());
        assert!(folder_lock_key("   ").is_err());
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("Y:\\Data\\Shot01/").unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    proptest::proptest! {
        #[test]
        fn idempotent_for_any_nonempty_ascii(s in "[ -~]{1,200}") {
            if let Ok(once) = normalize(&s) {
                let twice = normalize(&once).unwrap();
                proptest::prop_assert_eq!(once, twice);
            }
        }
    }
}
