//! Lookup of external tools on the executable search path.
//!
//! The stream resolver (yt-dlp) is optional: without it remote URLs cannot be
//! opened, but local playback keeps working.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Located URL-resolving tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    name: String,
    path: PathBuf,
}

impl Resolver {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Search `PATH` for the resolver executable.
    pub fn locate(name: &str) -> Option<Self> {
        match find_executable(name) {
            Some(path) => {
                debug!(resolver = name, path = %path.display(), "stream resolver found");
                Some(Self::new(name, path))
            }
            None => {
                warn!(resolver = name, "stream resolver not found in PATH");
                None
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Message shown whenever remote playback is attempted without a resolver.
pub fn missing_message(name: &str) -> String {
    format!(
        "{name} is required for streaming from URLs (YouTube, Twitch, etc.).\n\
         Please install {name} and make sure it is in your system PATH."
    )
}

/// Resolve an executable name the way a shell would.
///
/// Names containing a path separator are checked as given.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path_var = env::var_os("PATH")?;
    find_in_path(name, &path_var)
}

/// Search a `PATH`-style list of directories for `name`.
pub fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    let extensions = executable_extensions();
    env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| {
            extensions
                .iter()
                .map(move |ext| dir.join(format!("{name}{ext}")))
        })
        .find(|path| is_executable(path))
}

#[cfg(windows)]
fn executable_extensions() -> Vec<String> {
    let mut extensions = vec![String::new()];
    let pathext = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    extensions.extend(
        pathext
            .split(';')
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_lowercase()),
    );
    extensions
}

#[cfg(not(windows))]
fn executable_extensions() -> Vec<String> {
    vec![String::new()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    fn touch(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn finds_first_executable_match() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch(first.path(), "yt-dlp", 0o644);
        let expected = touch(second.path(), "yt-dlp", 0o755);

        let path_var = env::join_paths([first.path(), second.path()]).unwrap();
        assert_eq!(find_in_path("yt-dlp", &path_var), Some(expected));
    }

    #[test]
    fn missing_tool_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path_var = env::join_paths([dir.path()]).unwrap();
        assert_eq!(find_in_path("yt-dlp", &path_var), None);
    }

    #[test]
    fn explicit_paths_skip_the_search() {
        let dir = tempfile::tempdir().unwrap();
        let tool = touch(dir.path(), "mpv", 0o755);
        assert_eq!(find_executable(tool.to_str().unwrap()), Some(tool));
        assert_eq!(
            find_executable(dir.path().join("absent").to_str().unwrap()),
            None
        );
    }

    #[test]
    fn missing_message_names_the_tool() {
        let message = missing_message("yt-dlp");
        assert!(message.starts_with("yt-dlp is required"));
        assert!(message.contains("PATH"));
    }
}
