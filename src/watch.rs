//! Long-running vault synchronization service (requires the `service`
//! feature).
//!
//! [`WatchService`] owns a [`VaultIndexer`] on a dedicated worker task and
//! feeds it [`IndexTask`]s from two sources: filesystem notifications,
//! debounced and filtered to markdown documents, and explicit requests such
//! as [`WatchService::trigger_rescan`]. Tasks are delivered over a single
//! channel, so incremental edits and rescans never run concurrently.
//!
//! The service's own write-backs re-trigger the watcher; the resulting
//! passes find the store already consistent and produce no further writes,
//! so the feedback loop settles after one echo.

use std::{
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use parking_lot::Mutex;
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    config::SyncConfig,
    error::KinshipError,
    event::Event,
    indexer::{IndexTask, VaultIndexer},
    properties::VaultPath,
    store::FileStore,
};

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

pub struct WatchService {
    root: PathBuf,
    tasks: UnboundedSender<IndexTask>,
    worker: JoinHandle<()>,
    debouncer: Mutex<Option<Debouncer<RecommendedWatcher, FileIdMap>>>,
    cancel_rescan: Arc<AtomicBool>,
}

impl WatchService {
    /// Build the store and indexer for `root` and start the worker task.
    /// Change notifications are delivered on `event_tx`; an initial full
    /// rescan is queued immediately.
    pub fn new(
        root: impl AsRef<Path>,
        config: SyncConfig,
        event_tx: UnboundedSender<Event>,
    ) -> Result<Self, KinshipError> {
        let root = root.as_ref().to_path_buf();
        let store = Arc::new(FileStore::new(&root)?);
        let mut indexer = VaultIndexer::new(store, config);
        indexer.attach_subscriber(event_tx);
        let cancel_rescan = indexer.cancel_handle();

        let (tasks, mut task_rx) = unbounded_channel::<IndexTask>();
        let worker = tokio::spawn(async move {
            while let Some(task) = task_rx.recv().await {
                if let Err(e) = indexer.process(task).await {
                    tracing::error!("[watch] Index task failed: {e}");
                }
            }
            tracing::debug!("[watch] Task channel closed, worker exiting");
        });

        let service = WatchService {
            root,
            tasks,
            worker,
            debouncer: Mutex::new(None),
            cancel_rescan,
        };
        service.trigger_rescan()?;
        Ok(service)
    }

    /// Start filesystem watching over the vault root.
    pub fn enable_watching(&self) -> Result<(), KinshipError> {
        let mut guard = self.debouncer.lock();
        if guard.is_some() {
            return Err(KinshipError::Service(format!(
                "already watching vault at {:?}",
                self.root
            )));
        }

        let task_tx = self.tasks.clone();
        let root = self.root.clone();
        let mut debouncer = new_debouncer(
            DEBOUNCE_WINDOW,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events.iter() {
                        let removed = matches!(event.event.kind, EventKind::Remove(_));
                        if !removed
                            && !matches!(
                                event.event.kind,
                                EventKind::Create(_) | EventKind::Modify(_)
                            )
                        {
                            continue;
                        }
                        for path in &event.paths {
                            let Some(vault_path) = vault_path_for(&root, path) else {
                                continue;
                            };
                            let task = if removed {
                                IndexTask::Removed(vault_path)
                            } else {
                                IndexTask::Incremental(vault_path)
                            };
                            tracing::debug!("[watch] Enqueuing {task:?}");
                            if task_tx.send(task).is_err() {
                                tracing::warn!("[watch] Worker gone, dropping change event");
                                return;
                            }
                        }
                    }
                }
                Err(errors) => {
                    tracing::error!("[watch] Notify debouncer returned errors: {errors:?}");
                }
            },
        )?;
        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)?;
        tracing::info!("[watch] Watching vault at {:?}", self.root);
        *guard = Some(debouncer);
        Ok(())
    }

    /// Stop filesystem watching. Queued tasks still drain.
    pub fn disable_watching(&self) -> Result<(), KinshipError> {
        if let Some(mut debouncer) = self.debouncer.lock().take() {
            let unwatch_res = debouncer.watcher().unwatch(&self.root);
            tracing::debug!("[watch] Unwatch(path: {:?}) = {unwatch_res:?}", self.root);
            unwatch_res?;
        }
        Ok(())
    }

    /// Queue a full rescan behind any pending tasks.
    pub fn trigger_rescan(&self) -> Result<(), KinshipError> {
        self.tasks
            .send(IndexTask::FullRescan)
            .map_err(|_| KinshipError::Service("indexer worker has shut down".to_string()))
    }

    /// Request cancellation of an in-flight rescan at its next batch
    /// boundary.
    pub fn cancel_rescan(&self) {
        self.cancel_rescan
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Queue a single document for reconciliation, bypassing the watcher.
    pub fn queue(&self, task: IndexTask) -> Result<(), KinshipError> {
        self.tasks
            .send(task)
            .map_err(|_| KinshipError::Service("indexer worker has shut down".to_string()))
    }

    /// Stop watching and abort the worker.
    pub fn shutdown(self) {
        let _ = self.disable_watching();
        self.worker.abort();
    }
}

/// Map an absolute filesystem path to a vault-relative markdown path.
/// Non-markdown files, dotfiles, and paths outside the root are skipped.
fn vault_path_for(root: &Path, path: &Path) -> Option<VaultPath> {
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    if relative.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(true)
    }) {
        return None;
    }
    Some(VaultPath::from(relative.to_string_lossy().replace('\\', "/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_path_filtering() {
        let root = Path::new("/vault");
        assert_eq!(
            vault_path_for(root, Path::new("/vault/Notes/a.md")),
            Some(VaultPath::from("Notes/a.md"))
        );
        assert_eq!(vault_path_for(root, Path::new("/vault/img.png")), None);
        assert_eq!(
            vault_path_for(root, Path::new("/vault/.obsidian/workspace.md")),
            None
        );
        assert_eq!(vault_path_for(root, Path::new("/elsewhere/a.md")), None);
    }
}
