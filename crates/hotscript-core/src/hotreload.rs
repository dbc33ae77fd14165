//! The script host: owns the published [`Solution`] and rebuilds it when
//! scripts change.
//!
//! Local changes arrive from a `notify` watcher, remote changes from a polling
//! task. Both feed one [`Debouncer`], so a burst of triggers from either side
//! ends in a single rebuild. A rebuild constructs a fresh solution on the
//! blocking pool and swaps it in; calls already running against the old
//! generation keep their `Arc` and finish there.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::evaluator::stdlib;
use crate::options::ScriptOptions;
use crate::solution::Solution;
use crate::{HotScriptError, Result};

/// Build a solution from scratch: stdlib, loading callback, every project,
/// loaded callback. Blocking.
pub fn load_solution(options: &ScriptOptions) -> Result<Solution> {
    let mut solution = Solution::new(&options.pkg_root);
    solution.use_symbols(&stdlib::symbols())?;
    if let Some(callback) = &options.loading_cb {
        callback(&solution)?;
    }
    for project in &options.projects {
        solution.load(project)?;
    }
    if let Some(callback) = &options.loaded_cb {
        callback(&solution)?;
    }
    Ok(solution)
}

/// Runs an action once triggers have been quiet for `delay`.
#[derive(Clone)]
pub(crate) struct Debouncer {
    pending: Arc<AtomicI64>,
    delay: Duration,
}

impl Debouncer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            pending: Arc::new(AtomicI64::new(0)),
            delay,
        }
    }

    pub(crate) fn trigger<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending = self.pending.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                action().await;
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }
}

struct HostInner {
    options: ScriptOptions,
    current: ArcSwap<Solution>,
    generation: AtomicU64,
    reload_lock: tokio::sync::Mutex<()>,
    shutdown: watch::Sender<bool>,
    watcher: parking_lot::Mutex<Option<RecommendedWatcher>>,
}

impl HostInner {
    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn reload(&self) -> Result<u64> {
        let _guard = self.reload_lock.lock().await;
        if self.is_shut_down() {
            return Err(HotScriptError::ShutDown);
        }

        let options = self.options.clone();
        let solution = tokio::task::spawn_blocking(move || load_solution(&options)).await??;
        if self.is_shut_down() {
            debug!("discarding solution built after shutdown");
            return Err(HotScriptError::ShutDown);
        }

        self.current.store(Arc::new(solution));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("published script generation {}", generation);
        Ok(generation)
    }

    /// Reload on behalf of a watcher; failures keep the current generation.
    async fn hot_reload(self: Arc<Self>) {
        match self.reload().await {
            Ok(_) => {}
            Err(HotScriptError::ShutDown) => {}
            Err(err) => error!(
                "hot reload failed, still serving generation {}: {}",
                self.generation.load(Ordering::SeqCst),
                err
            ),
        }
    }

    fn schedule_reload(self: &Arc<Self>, debouncer: &Debouncer) {
        let inner = self.clone();
        debouncer.trigger(move || inner.hot_reload());
    }
}

/// Owns the current solution generation and keeps it up to date.
pub struct ScriptHost {
    inner: Arc<HostInner>,
}

impl ScriptHost {
    /// Load every project. A failure here is fatal; once started, failed
    /// reloads only log.
    pub async fn start(options: ScriptOptions) -> Result<Self> {
        options.validate()?;

        let load_options = options.clone();
        let solution = tokio::task::spawn_blocking(move || load_solution(&load_options)).await??;
        info!(
            "script host started with {} packages",
            solution.library().packages().count()
        );

        let (shutdown, _) = watch::channel(false);
        let host = Self {
            inner: Arc::new(HostInner {
                options,
                current: ArcSwap::from_pointee(solution),
                generation: AtomicU64::new(1),
                reload_lock: tokio::sync::Mutex::new(()),
                shutdown,
                watcher: parking_lot::Mutex::new(None),
            }),
        };

        if host.inner.options.auto_hotfix {
            let debouncer = Debouncer::new(host.inner.options.local_detecting_delay);
            host.watch_local(&debouncer)?;
            host.poll_remote(&debouncer);
        }
        Ok(host)
    }

    /// The currently published solution.
    pub fn solution(&self) -> Arc<Solution> {
        self.inner.current.load_full()
    }

    /// Starts at 1 and grows with every published reload.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> &ScriptOptions {
        &self.inner.options
    }

    /// Rebuild now, returning the new generation. The current solution stays
    /// published on failure.
    pub async fn hotfix(&self) -> Result<u64> {
        self.inner.reload().await
    }

    /// Stop watching and polling. A reload already running is discarded.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        self.inner.watcher.lock().take();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }

    fn watch_local(&self, debouncer: &Debouncer) -> Result<()> {
        let dirs: Vec<PathBuf> = self
            .inner
            .options
            .projects
            .iter()
            .filter_map(|project| project.local_path.clone())
            .collect();
        if dirs.is_empty() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = tx.send(event);
        })?;
        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::Recursive)?;
            info!("watching {} for script changes", dir.display());
        }
        *self.inner.watcher.lock() = Some(watcher);

        let inner = self.inner.clone();
        let debouncer = debouncer.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    event = rx.recv() => match event {
                        None => break,
                        Some(Ok(event)) if matches!(event.kind, EventKind::Access(_)) => {}
                        Some(Ok(event)) => {
                            debug!("script change: {:?} {:?}", event.kind, event.paths);
                            inner.schedule_reload(&debouncer);
                        }
                        Some(Err(err)) => warn!("script watcher error: {}", err),
                    },
                }
            }
            debug!("local script watcher stopped");
        });
        Ok(())
    }

    fn poll_remote(&self, debouncer: &Debouncer) {
        if !self.inner.options.projects.iter().any(|p| p.remote_url.is_some()) {
            return;
        }

        let inner = self.inner.clone();
        let debouncer = debouncer.clone();
        let interval = self.inner.options.remote_checking_interval;
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let solution = inner.current.load_full();
                match tokio::task::spawn_blocking(move || solution.remote_changed()).await {
                    Ok(Ok(true)) => inner.schedule_reload(&debouncer),
                    Ok(Ok(false)) => debug!("remote scripts unchanged"),
                    Ok(Err(err)) => warn!("checking remote scripts failed: {}", err),
                    Err(err) => error!("remote check task failed: {}", err),
                }
            }
            debug!("remote script poller stopped");
        });
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_debouncer_coalesces_bursts() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let runs = runs.clone();
            debouncer.trigger(move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(debouncer.pending(), 5);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_debouncer_separate_bursts() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let runs = runs.clone();
            debouncer.trigger(move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
