//! Command handlers.

pub mod classify;
pub mod config;
pub mod run;
pub mod scan;
pub mod trim;

use std::path::PathBuf;

/// Canonicalize every root, failing on the first one that does not exist.
pub(crate) fn resolve_roots(roots: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    roots
        .iter()
        .map(|root| {
            if !root.is_dir() {
                anyhow::bail!(
                    "Not a directory: {:?}\n\n  Hint: Check the path and try again.",
                    root
                );
            }
            Ok(root.canonicalize()?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_roots_rejects_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(resolve_roots(&[missing]).is_err());
    }

    #[test]
    fn test_resolve_roots_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        std::fs::write(&file, b"x").unwrap();
        assert!(resolve_roots(&[file]).is_err());
    }

    #[test]
    fn test_resolve_roots_canonicalizes() {
        let dir = tempfile::tempdir().unwrap();
        let roots = resolve_roots(&[dir.path().join(".")]).unwrap();
        assert_eq!(roots, vec![dir.path().canonicalize().unwrap()]);
    }
}
