//! Coalescing writer for the index file.
//!
//! Index upserts arrive far more often than the index needs to hit the disk
//! (every message append rewrites it). The writer owns the index path and
//! runs as a background task:
//!
//! - [`IndexWriter::submit`] replaces the pending document. The first submit
//!   after a quiet period opens a window; when the window elapses the most
//!   recent document is written once.
//! - [`IndexWriter::flush`] writes any pending document immediately.
//! - [`IndexWriter::shutdown`] flushes and stops the task. It must be called
//!   before the process exits or the last update may be lost.
//!
//! A zero window makes every submit a synchronous write.

use super::atomic_file;
use scribe_core::error::{Result, ScribeError};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

enum Command {
    Submit {
        contents: Vec<u8>,
        ack: Option<oneshot::Sender<Result<()>>>,
    },
    Flush {
        ack: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        ack: oneshot::Sender<Result<()>>,
    },
}

pub struct IndexWriter {
    tx: mpsc::UnboundedSender<Command>,
    window: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IndexWriter {
    /// Spawns the writer task. Must be called inside a tokio runtime.
    pub fn spawn(path: PathBuf, window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(WriterTask::new(path, window).run(rx));
        Self {
            tx,
            window,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Queues `contents` as the next index document.
    ///
    /// Returns once the document is queued, or once it is written when the
    /// window is zero.
    pub async fn submit(&self, contents: Vec<u8>) -> Result<()> {
        if self.window.is_zero() {
            let (ack, done) = oneshot::channel();
            self.send(Command::Submit {
                contents,
                ack: Some(ack),
            })?;
            return done.await.map_err(|_| stopped())?;
        }

        self.send(Command::Submit {
            contents,
            ack: None,
        })
    }

    /// Writes any pending document now.
    ///
    /// Reports the outcome of that write. With nothing pending, reports the
    /// error of the last failed background write, if any.
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush { ack })?;
        done.await.map_err(|_| stopped())?
    }

    /// Final flush, then stops the task. Later submits fail.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Shutdown { ack })?;
        let result = done.await.map_err(|_| stopped())?;

        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.await
                .map_err(|e| ScribeError::internal(format!("index writer task failed: {e}")))?;
        }
        result
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| stopped())
    }
}

fn stopped() -> ScribeError {
    ScribeError::internal("index writer stopped")
}

struct WriterTask {
    path: PathBuf,
    window: Duration,
    pending: Option<Vec<u8>>,
    deadline: Option<Instant>,
    last_error: Option<ScribeError>,
}

impl WriterTask {
    fn new(path: PathBuf, window: Duration) -> Self {
        Self {
            path,
            window,
            pending: None,
            deadline: None,
            last_error: None,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            let command = match self.deadline {
                Some(at) => tokio::select! {
                    command = rx.recv() => command,
                    _ = tokio::time::sleep_until(at) => {
                        self.deadline = None;
                        // Failure is recorded for the next flush; no retry here.
                        let _ = self.write_pending().await;
                        continue;
                    }
                },
                None => rx.recv().await,
            };

            match command {
                Some(Command::Submit { contents, ack }) => {
                    self.pending = Some(contents);
                    match ack {
                        Some(ack) => {
                            self.deadline = None;
                            let _ = ack.send(self.write_pending().await);
                        }
                        None => {
                            if self.deadline.is_none() {
                                self.deadline = Some(Instant::now() + self.window);
                            }
                        }
                    }
                }
                Some(Command::Flush { ack }) => {
                    let _ = ack.send(self.flush().await);
                }
                Some(Command::Shutdown { ack }) => {
                    let result = self.flush().await;
                    tracing::debug!(path = %self.path.display(), "index writer stopped");
                    let _ = ack.send(result);
                    return;
                }
                None => {
                    // Every handle was dropped without shutdown.
                    let _ = self.flush().await;
                    return;
                }
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        self.deadline = None;
        if self.pending.is_some() {
            self.write_pending().await
        } else {
            match self.last_error.take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    async fn write_pending(&mut self) -> Result<()> {
        let Some(contents) = self.pending.as_ref() else {
            return Ok(());
        };

        match atomic_file::write_atomic(&self.path, contents).await {
            Ok(()) => {
                tracing::debug!(
                    path = %self.path.display(),
                    bytes = contents.len(),
                    "index written"
                );
                self.pending = None;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "index write failed");
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn read(path: &std::path::Path) -> Option<String> {
        atomic_file::read_optional(path)
            .await
            .unwrap()
            .map(|b| String::from_utf8(b).unwrap())
    }

    #[tokio::test]
    async fn test_submits_within_window_coalesce() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let writer = IndexWriter::spawn(path.clone(), Duration::from_secs(3600));

        writer.submit(b"1".to_vec()).await.unwrap();
        writer.submit(b"2".to_vec()).await.unwrap();
        writer.submit(b"3".to_vec()).await.unwrap();
        assert_eq!(read(&path).await, None);

        writer.flush().await.unwrap();
        assert_eq!(read(&path).await.as_deref(), Some("3"));

        writer.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_window_elapses_without_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let writer = IndexWriter::spawn(path.clone(), Duration::from_millis(20));

        writer.submit(b"a".to_vec()).await.unwrap();
        writer.submit(b"b".to_vec()).await.unwrap();

        let mut written = None;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            written = read(&path).await;
            if written.is_some() {
                break;
            }
        }
        assert_eq!(written.as_deref(), Some("b"));
        writer.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_flushes_last_update() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let writer = IndexWriter::spawn(path.clone(), Duration::from_secs(3600));

        writer.submit(b"final".to_vec()).await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(read(&path).await.as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let dir = TempDir::new().unwrap();
        let writer = IndexWriter::spawn(dir.path().join("index.json"), Duration::ZERO);
        writer.shutdown().await.unwrap();

        let err = writer.submit(b"late".to_vec()).await.unwrap_err();
        assert!(matches!(err, ScribeError::Internal(ref m) if m == "index writer stopped"));
    }

    #[tokio::test]
    async fn test_zero_window_writes_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let writer = IndexWriter::spawn(path.clone(), Duration::ZERO);

        writer.submit(b"now".to_vec()).await.unwrap();
        assert_eq!(read(&path).await.as_deref(), Some("now"));
        writer.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_reported_by_flush() {
        let dir = TempDir::new().unwrap();
        // The parent "directory" is a regular file, so every write fails.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let writer = IndexWriter::spawn(blocker.join("index.json"), Duration::from_secs(3600));

        writer.submit(b"doc".to_vec()).await.unwrap();
        assert!(writer.flush().await.is_err());
        // Still pending, so the retry on the next flush fails again.
        assert!(writer.flush().await.is_err());
        assert!(writer.shutdown().await.is_err());
    }
}
