//! Workspace confinement for file and shell tools.
//!
//! Resolution is purely lexical: `.` and `..` segments are folded without
//! touching the filesystem, so containment is decided before any I/O
//! happens and symlink state cannot race the check.

use std::path::{Component, Path, PathBuf};

use burrow_core::{BurrowError, Result};

/// Resolves tool-supplied paths against a workspace root and, when
/// restriction is on, rejects anything that lands outside it.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    restrict: bool,
}

impl Sandbox {
    pub fn new(root: impl Into<PathBuf>, restrict: bool) -> Self {
        Self {
            root: normalize(&root.into()),
            restrict,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a raw path from a tool argument. Relative paths are joined
    /// onto the workspace root; the folded result must stay under the root
    /// when restriction is enabled.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf> {
        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let resolved = normalize(&joined);

        if self.restrict && !resolved.starts_with(&self.root) {
            return Err(BurrowError::PathEscape(raw.to_string()));
        }
        Ok(resolved)
    }
}

/// Fold `.` and `..` segments lexically. A `..` at the top is dropped
/// rather than kept, matching what the containment check needs: a path
/// that climbs out of the root simply stops matching the root prefix.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Sandbox {
        Sandbox::new("/tmp/burrow-ws", true)
    }

    #[test]
    fn relative_path_resolves_under_root() {
        let path = sandbox().resolve("a/b.txt").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/burrow-ws/a/b.txt"));
    }

    #[test]
    fn dotdot_escape_is_rejected() {
        let err = sandbox().resolve("../../etc/passwd").unwrap_err();
        assert!(matches!(err, BurrowError::PathEscape(_)));
    }

    #[test]
    fn interior_dotdot_stays_inside() {
        let path = sandbox().resolve("a/../b.txt").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/burrow-ws/b.txt"));
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let err = sandbox().resolve("/etc/passwd").unwrap_err();
        assert!(matches!(err, BurrowError::PathEscape(_)));
    }

    #[test]
    fn absolute_path_inside_root_is_allowed() {
        let path = sandbox().resolve("/tmp/burrow-ws/notes.md").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/burrow-ws/notes.md"));
    }

    #[test]
    fn sneaky_absolute_dotdot_is_rejected() {
        let err = sandbox().resolve("/tmp/burrow-ws/../secrets").unwrap_err();
        assert!(matches!(err, BurrowError::PathEscape(_)));
    }

    #[test]
    fn unrestricted_allows_anything() {
        let sb = Sandbox::new("/tmp/burrow-ws", false);
        let path = sb.resolve("/etc/hosts").unwrap();
        assert_eq!(path, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn current_dir_segments_are_folded() {
        let path = sandbox().resolve("./a/./b").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/burrow-ws/a/b"));
    }
}
