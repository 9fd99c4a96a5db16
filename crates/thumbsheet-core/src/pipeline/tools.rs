//! External tool discovery.
//!
//! Resolution order: an explicitly configured path, a bundled copy next to
//! the running executable, well-known package-manager install locations,
//! then the directories on `PATH`.

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Package-manager install locations checked before `PATH`.
pub const WELL_KNOWN_DIRS: &[&str] = &[
    "/opt/homebrew/bin",
    "/usr/local/bin",
    "/usr/bin",
    "/snap/bin",
    r"C:\ProgramData\chocolatey\bin",
];

/// Locate `name`, preferring `explicit` when given.
///
/// An explicit path that does not exist is an error rather than a reason to
/// fall back, so a typo in configuration is not silently ignored.
pub fn locate(name: &str, explicit: Option<&Path>) -> PipelineResult<PathBuf> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(PipelineError::ToolNotFound(format!(
                "{name} (configured path {} does not exist)",
                path.display()
            )))
        };
    }

    let path_var = std::env::var_os("PATH");
    let path_dirs = path_var
        .as_deref()
        .map(|p| std::env::split_paths(p).collect::<Vec<_>>())
        .unwrap_or_default();

    let found = locate_in(name, &search_dirs(&path_dirs));
    match &found {
        Ok(path) => tracing::debug!("Using {name} at {:?}", path),
        Err(_) => tracing::debug!("{name} not found in bundled, well-known, or PATH locations"),
    }
    found
}

/// Directories searched in order, given the `PATH` entries.
pub fn search_dirs(path_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir.join("bin"));
        dirs.push(exe_dir);
    }
    dirs.extend(WELL_KNOWN_DIRS.iter().map(PathBuf::from));
    dirs.extend(path_dirs.iter().cloned());
    dirs
}

/// First `dir/name` (or `dir/name.exe` on Windows) that is a file.
pub fn locate_in(name: &str, dirs: &[PathBuf]) -> PipelineResult<PathBuf> {
    dirs.iter()
        .flat_map(|dir| candidate_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| PipelineError::ToolNotFound(name.to_string()))
}

fn candidate_names(name: &str) -> Vec<String> {
    if cfg!(windows) && !name.ends_with(".exe") {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(b.path().join("sometool"), b"").unwrap();
        std::fs::write(a.path().join("sometool"), b"").unwrap();

        let found = locate_in(
            "sometool",
            &[a.path().to_path_buf(), b.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(found, a.path().join("sometool"));
    }

    #[test]
    fn test_skips_directories_with_the_same_name() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::create_dir(a.path().join("sometool")).unwrap();
        std::fs::write(b.path().join("sometool"), b"").unwrap();

        let found = locate_in(
            "sometool",
            &[a.path().to_path_buf(), b.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(found, b.path().join("sometool"));
    }

    #[test]
    fn test_missing_tool() {
        let a = tempfile::tempdir().unwrap();
        let err = locate_in("no-such-tool-xyz", &[a.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, PipelineError::ToolNotFound(_)));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        assert!(locate("ffmpeg", Some(Path::new("/nope/ffmpeg"))).is_err());

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("my-ffmpeg");
        std::fs::write(&tool, b"").unwrap();
        assert_eq!(locate("ffmpeg", Some(&tool)).unwrap(), tool);
    }

    #[test]
    fn test_path_entries_come_last() {
        let path_dir = PathBuf::from("/from/path");
        let dirs = search_dirs(&[path_dir.clone()]);
        assert_eq!(dirs.last(), Some(&path_dir));
        let well_known = dirs
            .iter()
            .position(|d| d == Path::new("/usr/local/bin"))
            .unwrap();
        assert!(well_known < dirs.len() - 1);
    }
}
