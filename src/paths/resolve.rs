//! Project root discovery and environment plumbing for subprocesses

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::error::PathError;

/// Name of the configuration directory at the project root.
pub const CONFIG_DIR: &str = ".pocket";

/// Environment variable that selects the initial working directory,
/// relative to the project root. Lets the same runner binary be invoked
/// from nested directories.
pub const CONTEXT_ENV: &str = "POK_CONTEXT";

/// Resolves the project root and path expressions into concrete
/// root-relative paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Locate the project root by ascending from the current directory
    /// until a `.git` entry is found.
    pub fn discover() -> Result<Self, PathError> {
        let start = env::current_dir().map_err(PathError::CurrentDir)?;
        Self::discover_from(start)
    }

    /// Locate the project root by ascending from `start`.
    pub fn discover_from(start: impl Into<PathBuf>) -> Result<Self, PathError> {
        let start = start.into();
        let mut dir = start.as_path();
        loop {
            if dir.join(".git").exists() {
                return Ok(PathResolver {
                    root: dir.to_path_buf(),
                });
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(PathError::NoProjectRoot(start)),
            }
        }
    }

    /// Use a configured root instead of discovering one.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        PathResolver { root: root.into() }
    }

    /// Absolute path of the project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path built by joining the root and the given components.
    pub fn from_root(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Directory where managed tools are linked (`<root>/.pocket/bin`).
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR).join("bin")
    }

    /// Initial working directory, relative to the root, from the
    /// `POK_CONTEXT` environment variable. `"."` when unset or empty.
    pub fn initial_cwd(&self) -> String {
        match env::var(CONTEXT_ENV) {
            Ok(v) if !v.is_empty() && v != "." => v,
            _ => ".".to_string(),
        }
    }
}

/// Build a `PATH` value with `dir` prepended to the existing value.
pub fn prepend_path(existing: Option<&OsStr>, dir: &Path) -> OsString {
    let mut value = OsString::from(dir);
    if let Some(rest) = existing {
        if !rest.is_empty() {
            value.push(path_list_separator());
            value.push(rest);
        }
    }
    value
}

fn path_list_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

/// Color variables injected into subprocesses so tools keep their colored
/// output when piped through the runner. Only applies when the output sink
/// is a terminal and `NO_COLOR` is unset.
pub fn color_env(is_tty: bool, no_color_set: bool) -> Vec<(&'static str, &'static str)> {
    if !is_tty || no_color_set {
        return Vec::new();
    }
    vec![("FORCE_COLOR", "1"), ("CLICOLOR_FORCE", "1")]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn from_root_joins_components() {
        let r = PathResolver::with_root("/proj");
        assert_eq!(r.from_root("svc/a"), PathBuf::from("/proj/svc/a"));
    }

    #[test]
    fn bin_dir_lives_under_config_dir() {
        let r = PathResolver::with_root("/proj");
        assert_eq!(r.bin_dir(), PathBuf::from("/proj/.pocket/bin"));
    }

    #[test]
    fn discover_finds_git_marker_in_ancestor() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let r = PathResolver::discover_from(&nested).unwrap();
        assert_eq!(r.root(), tmp.path());
    }

    #[test]
    fn discover_fails_without_marker() {
        let tmp = TempDir::new().unwrap();
        let err = PathResolver::discover_from(tmp.path());
        assert!(matches!(err, Err(PathError::NoProjectRoot(_))));
    }

    #[test]
    fn prepend_path_keeps_existing_entries() {
        let sep = path_list_separator();
        let got = prepend_path(Some(OsStr::new("/usr/bin")), Path::new("/custom/bin"));
        assert_eq!(got, OsString::from(format!("/custom/bin{sep}/usr/bin")));
    }

    #[test]
    fn prepend_path_without_existing_value() {
        let got = prepend_path(None, Path::new("/custom/bin"));
        assert_eq!(got, OsString::from("/custom/bin"));
    }

    #[test]
    fn color_env_only_for_tty_without_no_color() {
        assert!(color_env(true, true).is_empty());
        assert!(color_env(false, false).is_empty());
        assert!(color_env(false, true).is_empty());
        let vars = color_env(true, false);
        assert!(vars.contains(&("FORCE_COLOR", "1")));
        assert!(vars.contains(&("CLICOLOR_FORCE", "1")));
    }
}
