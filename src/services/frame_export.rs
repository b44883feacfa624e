use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{fs, sync::watch};
use tracing::warn;

use crate::{dao::save_state::write_atomically, engine::Frame};

/// Frame published by the round loop, numbered in export order.
#[derive(Debug, Clone)]
pub struct ExportedFrame {
    /// Monotonic export counter, starting at 1.
    pub sequence: u64,
    /// Encoded image.
    pub frame: Arc<Frame>,
}

/// Publishes the latest engine frame to a well-known file and to in-process readers.
#[derive(Clone)]
pub struct FrameExporter {
    inner: Arc<FrameInner>,
}

struct FrameInner {
    path: PathBuf,
    latest: watch::Sender<Option<ExportedFrame>>,
    sequence: AtomicU64,
}

impl FrameExporter {
    /// Exporter writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (latest, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(FrameInner {
                path: path.into(),
                latest,
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// File the frames are written to.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Store `frame` as the latest one.
    ///
    /// A failed file write is logged; readers in the process still see the frame.
    pub async fn publish(&self, frame: Frame) -> ExportedFrame {
        if let Err(err) = write_atomically(&self.inner.path, &frame.bytes).await {
            warn!(path = %self.inner.path.display(), error = %err, "failed to export frame");
        }

        let exported = ExportedFrame {
            sequence: self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            frame: Arc::new(frame),
        };
        self.inner.latest.send_replace(Some(exported.clone()));
        exported
    }

    /// Latest published frame.
    pub fn latest(&self) -> Option<ExportedFrame> {
        self.inner.latest.borrow().clone()
    }

    /// Receive a notification on each publish.
    pub fn subscribe(&self) -> watch::Receiver<Option<ExportedFrame>> {
        self.inner.latest.subscribe()
    }

    /// Forget the previous session's frame and remove its file.
    pub async fn reset(&self) {
        self.inner.latest.send_replace(None);
        match fs::remove_file(&self.inner.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.inner.path.display(), error = %err, "could not remove existing frame file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    fn frame(bytes: &[u8]) -> Frame {
        Frame {
            content_type: "image/x-portable-pixmap",
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn publish_writes_the_file_and_notifies() {
        let exporter = FrameExporter::new(scratch_dir("frames").join("temp").join("frame.ppm"));
        let mut watcher = exporter.subscribe();

        let first = exporter.publish(frame(b"one")).await;
        let second = exporter.publish(frame(b"two")).await;

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert!(watcher.has_changed().unwrap());
        assert_eq!(fs::read(exporter.path()).await.unwrap(), b"two");
        assert_eq!(exporter.latest().unwrap().frame.bytes, b"two");
    }

    #[tokio::test]
    async fn reset_clears_frame_and_file() {
        let exporter = FrameExporter::new(scratch_dir("frames").join("frame.ppm"));
        exporter.publish(frame(b"stale")).await;

        exporter.reset().await;
        exporter.reset().await;

        assert!(exporter.latest().is_none());
        assert!(!exporter.path().exists());
    }
}
