use std::path::{Path, PathBuf};
use stowage::{BucketError, Result, confine};

/// Lexically confines `name` and joins it under `root`, returning the object key and its path.
///
/// `..` segments are collapsed without ever climbing above the root. The joined path is then
/// checked on disk so that a symlink cannot lead outside of it.
pub(crate) fn resolve_object(root: &Path, name: &str) -> Result<(String, PathBuf)> {
    let key = confine("", name);
    if key.is_empty() {
        return Err(BucketError::NotFound {
            message: name.to_owned().into(),
            context: Some("Target must be a file".into()),
        });
    }

    let path = resolve_path(root, &key)?;
    Ok((key, path))
}

/// Joins an already confined key under `root` and verifies the result stays inside it.
pub(crate) fn resolve_path(root: &Path, key: &str) -> Result<PathBuf> {
    let joined =
        key.split('/').filter(|s| !s.is_empty()).fold(root.to_path_buf(), |p, s| p.join(s));

    match joined.canonicalize() {
        Ok(canonical) => validate_canonical(root, &canonical).map(|()| joined),
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
            ) =>
        {
            validate_ancestors(root, &joined).map(|()| joined)
        },
        Err(e) => Err(BucketError::Io {
            source: e.into(),
            context: Some(format!("Failed to resolve {}", joined.display()).into()),
        }),
    }
}

fn validate_canonical(root: &Path, canonical: &Path) -> Result<()> {
    if canonical.starts_with(root) {
        Ok(())
    } else {
        Err(BucketError::PathEscape {
            message: canonical.display().to_string().into(),
            context: Some("Path resolves outside the bucket root".into()),
        })
    }
}

/// Validates a path that does not exist yet through its first existing ancestor.
///
/// The ancestor is canonicalized, so a symlinked directory pointing outside the root is caught
/// before anything gets created below it.
fn validate_ancestors(root: &Path, joined: &Path) -> Result<()> {
    let mut current = joined.parent();

    while let Some(path) = current {
        if path == root {
            return Ok(());
        }

        if path.exists() {
            return match path.canonicalize() {
                Ok(canonical) => validate_canonical(root, &canonical),
                Err(e) => Err(BucketError::Io {
                    source: e.into(),
                    context: Some("Failed to verify parent directory".into()),
                }),
            };
        }

        current = path.parent();
    }

    Err(BucketError::PathEscape {
        message: joined.display().to_string().into(),
        context: Some("No parent directory found within the bucket root".into()),
    })
}

/// Turns a path below `root` back into a slash-separated object name.
pub(crate) fn object_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let segments: Vec<String> =
        rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    (!segments.is_empty()).then(|| segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn canonical_root() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        (temp, root)
    }

    #[test]
    fn traversal_is_confined() {
        let (_temp, root) = canonical_root();
        let (key, path) = resolve_object(&root, "../../etc/passwd").unwrap();
        assert_eq!(key, "etc/passwd");
        assert_eq!(path, root.join("etc").join("passwd"));
    }

    #[test]
    fn empty_name_is_not_an_object() {
        let (_temp, root) = canonical_root();
        assert!(resolve_object(&root, "/./").unwrap_err().is_not_found());
    }

    #[test]
    fn object_names_use_slashes() {
        let (_temp, root) = canonical_root();
        let path = root.join("a").join("b.txt");
        assert_eq!(object_name(&root, &path).as_deref(), Some("a/b.txt"));
        assert_eq!(object_name(&root, &root), None);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_cannot_escape() {
        let (_temp, root) = canonical_root();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        let err = resolve_object(&root, "link/new/file.txt").unwrap_err();
        assert!(matches!(err, BucketError::PathEscape { .. }), "{err}");
    }
}
