use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

/// Reference voice samples available for imitation.
///
/// The directory is listed on every call, so samples added or removed while
/// the server runs show up without a restart.
#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    voices_dir: PathBuf,
}

impl VoiceCatalog {
    pub fn new(voices_dir: PathBuf) -> Self {
        Self { voices_dir }
    }

    /// Sorted `.wav` file names in the catalog directory.
    pub fn list_voices(&self) -> Result<Vec<String>, AppError> {
        if !self.voices_dir.exists() {
            return Ok(Vec::new());
        }

        let mut voices = BTreeSet::new();
        for entry in std::fs::read_dir(&self.voices_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            if path.extension().map(|e| e == "wav").unwrap_or(false) {
                if let Some(name) = path.file_name() {
                    voices.insert(name.to_string_lossy().to_string());
                }
            }
        }

        Ok(voices.into_iter().collect())
    }

    /// Path of a voice sample. Existence is checked later, at synthesis time.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, AppError> {
        if !is_bare_file_name(name) {
            return Err(AppError::Validation(format!(
                "Invalid reference audio name: {}",
                name
            )));
        }
        Ok(self.voices_dir.join(name))
    }
}

/// True when `name` is a single normal path component, e.g. `10_michael.wav`.
pub fn is_bare_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_dir_lists_nothing() {
        let catalog = VoiceCatalog::new(PathBuf::from("/nonexistent/voices/dir"));
        assert!(catalog.list_voices().unwrap().is_empty());
    }

    #[test]
    fn test_lists_sorted_wav_files_only() {
        let dir = TempDir::new().unwrap();
        for name in ["20_shira.wav", "10_michael.wav", "notes.txt", "clip.WAV.bak"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let catalog = VoiceCatalog::new(dir.path().to_path_buf());
        assert_eq!(
            catalog.list_voices().unwrap(),
            vec!["10_michael.wav".to_string(), "20_shira.wav".to_string()]
        );
    }

    #[test]
    fn test_listing_follows_directory_changes() {
        let dir = TempDir::new().unwrap();
        let catalog = VoiceCatalog::new(dir.path().to_path_buf());
        assert!(catalog.list_voices().unwrap().is_empty());

        fs::write(dir.path().join("a.wav"), b"").unwrap();
        assert_eq!(catalog.list_voices().unwrap(), vec!["a.wav".to_string()]);

        fs::remove_file(dir.path().join("a.wav")).unwrap();
        assert!(catalog.list_voices().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_does_not_check_existence() {
        let catalog = VoiceCatalog::new(PathBuf::from("voices"));
        assert_eq!(
            catalog.resolve("does_not_exist.wav").unwrap(),
            PathBuf::from("voices/does_not_exist.wav")
        );
    }

    #[test]
    fn test_resolve_rejects_paths() {
        let catalog = VoiceCatalog::new(PathBuf::from("voices"));
        for name in ["../secret.wav", "a/b.wav", "/etc/passwd", "..", "."] {
            assert!(
                matches!(catalog.resolve(name), Err(AppError::Validation(_))),
                "{} should be rejected",
                name
            );
        }
    }
}
