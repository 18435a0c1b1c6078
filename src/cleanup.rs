use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinSet};

/// Deletes served files a fixed time after they were handed to the response.
///
/// Each deletion is a task in a `JoinSet`; it sleeps for `delay` unless
/// [`flush`](Self::flush) fires it early. Failures are logged and dropped.
///
/// Tasks run on the runtime the scheduler was created on, not on the caller's.
/// actix workers each own a runtime that is torn down at shutdown; the main
/// runtime outlives them, so pending deletions survive until `flush`.
pub struct CleanupScheduler {
    delay: Duration,
    runtime: Handle,
    tasks: Mutex<JoinSet<()>>,
    flush_tx: watch::Sender<u64>,
}

impl CleanupScheduler {
    /// Bind to the current tokio runtime. Panics outside of one.
    pub fn new(delay: Duration) -> Self {
        Self::with_runtime(delay, Handle::current())
    }

    pub fn with_runtime(delay: Duration, runtime: Handle) -> Self {
        let (flush_tx, _) = watch::channel(0);
        Self {
            delay,
            runtime,
            tasks: Mutex::new(JoinSet::new()),
            flush_tx,
        }
    }

    /// Queue `path` for deletion. Callable from any thread or runtime.
    pub fn schedule(&self, path: PathBuf) -> AbortHandle {
        let delay = self.delay;
        // Subscribed before spawning: a flush right after this call must reach the task.
        let mut flush_rx = self.flush_tx.subscribe();

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        while tasks.try_join_next().is_some() {}

        log::debug!("[CLEANUP] {} scheduled in {:?}", path.display(), delay);
        tasks.spawn_on(
            async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = flush_rx.changed() => {}
                }
                remove_file(&path).await;
            },
            &self.runtime,
        )
    }

    /// Number of deletions that have not finished yet.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Run every pending deletion now and wait for all of them.
    pub async fn flush(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        self.flush_tx.send_modify(|generation| *generation += 1);
        while tasks.join_next().await.is_some() {}
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::info!("[CLEANUP] Removed {}", path.display()),
        Err(e) => log::warn!("[CLEANUP] Could not delete file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, b"data").unwrap();
        p
    }

    async fn wait_until_idle(scheduler: &CleanupScheduler) {
        for _ in 0..100 {
            if scheduler.pending() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deletes_after_delay() {
        let tmp = tempfile::tempdir().unwrap();
        let file = touch(tmp.path(), "a.mp4");
        let scheduler = CleanupScheduler::new(Duration::from_secs(60));

        scheduler.schedule(file.clone());
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(file.exists());
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        wait_until_idle(&scheduler).await;
        assert_eq!(scheduler.pending(), 0);
        assert!(!file.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_deleted_before_the_delay() {
        let tmp = tempfile::tempdir().unwrap();
        let file = touch(tmp.path(), "b.mp4");
        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));

        scheduler.schedule(file.clone());
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(file.exists());
        assert_eq!(scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn flush_deletes_files_scheduled_from_a_dropped_runtime() {
        let tmp = tempfile::tempdir().unwrap();
        let file = touch(tmp.path(), "worker.mp4");
        let scheduler = Arc::new(CleanupScheduler::new(Duration::from_secs(3600)));

        // Stand-in for an actix worker: its own runtime, gone before shutdown flush.
        let worker_scheduler = scheduler.clone();
        let worker_file = file.clone();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                worker_scheduler.schedule(worker_file);
            });
            drop(rt);
        })
        .join()
        .unwrap();

        assert_eq!(scheduler.pending(), 1);
        scheduler.flush().await;
        assert!(!file.exists());
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn flush_runs_pending_deletions_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "a.mp4");
        let b = touch(tmp.path(), "b.mp3");
        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));

        scheduler.schedule(a.clone());
        scheduler.schedule(b.clone());
        assert_eq!(scheduler.pending(), 2);

        scheduler.flush().await;
        assert!(!a.exists());
        assert!(!b.exists());
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));
        scheduler.schedule(tmp.path().join("gone.mp4"));
        scheduler.flush().await;
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn aborted_deletion_keeps_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = touch(tmp.path(), "keep.mp4");
        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));

        let handle = scheduler.schedule(file.clone());
        handle.abort();
        scheduler.flush().await;
        assert!(file.exists());
    }

    #[tokio::test]
    async fn schedule_after_flush_waits_for_its_own_delay() {
        let tmp = tempfile::tempdir().unwrap();
        let scheduler = CleanupScheduler::new(Duration::from_secs(3600));
        scheduler.flush().await;

        let file = touch(tmp.path(), "later.mp4");
        scheduler.schedule(file.clone());
        tokio::task::yield_now().await;
        assert!(file.exists());
        assert_eq!(scheduler.pending(), 1);
    }
}
