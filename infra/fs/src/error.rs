use std::io::ErrorKind;
use std::sync::Arc;
use stowage::BucketError;

/// Maps a filesystem failure on `name` into the bucket error taxonomy.
///
/// Both a missing entry and a missing parent directory mean the object does not exist.
pub(crate) fn normalize_io(err: std::io::Error, name: &str) -> BucketError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => BucketError::not_found(name.to_owned()),
        _ => BucketError::Io {
            source: Arc::new(err),
            context: Some(format!("Filesystem operation failed: {name}").into()),
        },
    }
}
