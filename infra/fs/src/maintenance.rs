use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Marker every staged file name carries: `<name>.stowtmp.<instance>-<n>`.
pub(crate) const TMP_MARKER: &str = ".stowtmp.";

const STALE_AFTER: Duration = Duration::from_secs(300);

pub(crate) async fn purge_tmp(staging: &Path) {
    if !staging.is_dir() {
        return;
    }

    let staging = staging.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&staging, now, STALE_AFTER)).await {
        Ok((removed, failed)) if removed > 0 || failed > 0 => {
            info!(removed, failed, "Cleaned up temporary files");
        },
        Err(e) => {
            error!(error = %e, "Temp file cleanup task panicked");
        },
        _ => {},
    }
}

fn remove_stale(staging: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    WalkDir::new(staging)
        .max_depth(1)
        .into_iter()
        .flatten()
        .filter(|e| is_tmp(e) && is_stale(e, now, threshold))
        .for_each(|entry| match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Stale temp file removal failed");
                failed += 1;
            },
        });

    (removed, failed)
}

fn is_tmp(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.file_name().to_str().is_some_and(|name| name.contains(TMP_MARKER))
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn only_stale_temp_files_are_removed() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path();
        let old = SystemTime::now() - Duration::from_secs(600);

        let stale = staging.join("a.txt.stowtmp.1");
        File::create(&stale).unwrap().set_modified(old).unwrap();
        let fresh = staging.join("b.txt.stowtmp.2");
        File::create(&fresh).unwrap();
        let foreign = staging.join("notes.txt");
        File::create(&foreign).unwrap().set_modified(old).unwrap();

        let (removed, failed) = remove_stale(staging, SystemTime::now(), STALE_AFTER);
        assert_eq!((removed, failed), (1, 0));
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(foreign.exists());
    }
}
