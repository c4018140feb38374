//! Settle check: a best-effort guard against benchmarking a recording that is still uploading.
//!
//! The size is read, read again after one interval, and if it moved the check waits one more
//! interval. An upload slower than the total window still races the run; an explicit
//! upload-complete marker from the uploader would close that gap.

use std::time::Duration;

use session_worker_core::{Session, SessionStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Size unchanged across the first interval.
    Stable,
    /// Size changed; one extra interval was waited.
    Grew,
    /// Recording disappeared during the check.
    Missing,
}

pub async fn settle(
    store: &dyn SessionStore,
    session: &Session,
    interval: Duration,
) -> Result<Settle, StoreError> {
    let Some(first) = store.video_size(session)? else {
        return Ok(Settle::Missing);
    };
    tokio::time::sleep(interval).await;
    let Some(second) = store.video_size(session)? else {
        return Ok(Settle::Missing);
    };
    if second == first {
        return Ok(Settle::Stable);
    }
    tracing::debug!(
        event = "settle.grew",
        domain = "bench",
        session = session.name(),
        first_bytes = first,
        second_bytes = second
    );
    tokio::time::sleep(interval).await;
    Ok(Settle::Grew)
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_worker_core::{FsSessionStore, SessionState};
    use std::io::Write as _;

    #[tokio::test]
    async fn stable_file_settles_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let sdir = dir.path().join("s1");
        std::fs::create_dir_all(&sdir).unwrap();
        std::fs::write(sdir.join("video.mp4"), b"1234").unwrap();
        let store = FsSessionStore::new(dir.path());
        let session = Session::new(&sdir, SessionState::Pending);
        let got = settle(&store, &session, Duration::from_millis(10)).await.unwrap();
        assert_eq!(got, Settle::Stable);
    }

    #[tokio::test]
    async fn growing_file_waits_once_more() {
        let dir = tempfile::tempdir().unwrap();
        let sdir = dir.path().join("s1");
        std::fs::create_dir_all(&sdir).unwrap();
        let video = sdir.join("video.mp4");
        std::fs::write(&video, b"1234").unwrap();
        let store = FsSessionStore::new(dir.path());
        let session = Session::new(&sdir, SessionState::Pending);

        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let mut f = std::fs::OpenOptions::new().append(true).open(&video).unwrap();
            f.write_all(b"more bytes").unwrap();
        });
        let got = settle(&store, &session, Duration::from_millis(300)).await.unwrap();
        writer.join().unwrap();
        assert_eq!(got, Settle::Grew);
    }

    #[tokio::test]
    async fn missing_video_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path());
        let session = Session::new(dir.path().join("gone"), SessionState::Pending);
        let got = settle(&store, &session, Duration::from_millis(1)).await.unwrap();
        assert_eq!(got, Settle::Missing);
    }
}
