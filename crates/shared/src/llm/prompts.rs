use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptLoadError {
    #[error("failed to read system prompt from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("system prompt file {0} is empty")]
    Empty(PathBuf),
}

/// Loads the system instruction prepended to every completion request.
/// There is no built-in fallback; callers treat a failure as fatal.
pub fn load_system_prompt(path: impl AsRef<Path>) -> Result<String, PromptLoadError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| PromptLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PromptLoadError::Empty(path.to_path_buf()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::{PromptLoadError, load_system_prompt};

    fn scratch_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("system-prompt-{}.txt", Uuid::new_v4()));
        fs::write(&path, contents).expect("scratch prompt should write");
        path
    }

    #[test]
    fn loads_trimmed_prompt_and_is_repeatable() {
        let path = scratch_file("\nYou are a concise voice assistant.\n\n");

        let first = load_system_prompt(&path).expect("prompt should load");
        let second = load_system_prompt(&path).expect("prompt should load again");
        fs::remove_file(&path).ok();

        assert_eq!(first, "You are a concise voice assistant.");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join(format!("missing-{}.txt", Uuid::new_v4()));
        let err = load_system_prompt(&path).expect_err("missing prompt must fail");
        assert!(matches!(err, PromptLoadError::Read { .. }));
    }

    #[test]
    fn whitespace_only_file_is_rejected() {
        let path = scratch_file("   \n\t");
        let err = load_system_prompt(&path).expect_err("blank prompt must fail");
        fs::remove_file(&path).ok();
        assert!(matches!(err, PromptLoadError::Empty(_)));
    }
}
