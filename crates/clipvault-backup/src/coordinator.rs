//! Backup coordinator.
//!
//! Orchestrates the two whole-file operations:
//!
//! - **restore**: read source → detection chain → catalog resolution →
//!   merge against a store snapshot → fan-out commit → report.
//! - **backup**: store snapshot → native serializer → sink.
//!
//! Errors are turned into an [`ErrorReport`] and published on the event bus
//! here; nothing below this layer talks to the caller directly. Restores are
//! serialized so the merge never observes a half-committed store.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, trace, warn};

use clipvault_core::defaults::EVENT_BUS_CAPACITY;
use clipvault_core::{
    BackupItemType, BackupStats, BackupStore, CatalogEntry, CatalogKind, Clip, Error, Result,
};
use clipvault_formats::{ExportSnapshot, ParsedBackup, ProcessorRegistry, SourceBuffer};

use crate::config::{BackupConfig, RestorePolicy};
use crate::events::{BackupEvent, ErrorReport, EventBus, LoadingGuard, Operation};
use crate::export::default_backup_file_name;
use crate::merge::{merge, Upsert};

// =============================================================================
// CANCELLATION
// =============================================================================

/// Read side of an [`OperationHandle`]'s cancel switch.
#[derive(Clone, Default)]
struct CancelSignal(Option<watch::Receiver<bool>>);

impl CancelSignal {
    fn is_cancelled(&self) -> bool {
        self.0.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once cancel is requested; never resolves otherwise.
    async fn cancelled(&self) {
        let Some(rx) = &self.0 else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Handle dropped without cancelling: run to completion.
            std::future::pending::<()>().await;
        }
    }
}

/// Handle to an operation running on a background task.
///
/// Await it for the result. Dropping it detaches the task and discards the
/// result. [`cancel`](Self::cancel) stops the operation if it has not started
/// committing yet.
pub struct OperationHandle {
    operation: Operation,
    cancel_tx: watch::Sender<bool>,
    join: JoinHandle<Result<BackupStats>>,
}

impl OperationHandle {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Future for OperationHandle {
    type Output = Result<BackupStats>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let operation = self.operation;
        Pin::new(&mut self.join).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled),
            Err(e) => Err(Error::Internal(format!(
                "{} task failed: {}",
                operation.as_str(),
                e
            ))),
        })
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Runs backups and restores against a store.
pub struct BackupCoordinator<S> {
    store: Arc<S>,
    registry: Arc<ProcessorRegistry>,
    config: BackupConfig,
    events: EventBus,
    restore_lock: Arc<Mutex<()>>,
}

impl<S> Clone for BackupCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            events: self.events.clone(),
            restore_lock: Arc::clone(&self.restore_lock),
        }
    }
}

impl<S: BackupStore + 'static> BackupCoordinator<S> {
    pub fn new(store: Arc<S>, registry: Arc<ProcessorRegistry>, config: BackupConfig) -> Self {
        Self {
            store,
            registry,
            config,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            restore_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Coordinator with the standard detection chain built from `config`.
    pub fn with_standard_registry(store: Arc<S>, config: BackupConfig) -> Self {
        let registry = Arc::new(ProcessorRegistry::standard(config.limits()));
        Self::new(store, registry, config)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BackupEvent> {
        self.events.subscribe()
    }

    /// Default file name for a backup taken at `now`.
    pub fn backup_file_name(&self, now: DateTime<Utc>) -> String {
        default_backup_file_name(&self.config.backup_base_name, now)
    }

    // -------------------------------------------------------------------------
    // Restore
    // -------------------------------------------------------------------------

    /// Restore from `reader` into the store.
    ///
    /// `name` is only used for logging. Returns the per-category report; an
    /// empty report means the file was recognized but had nothing to restore.
    pub async fn restore<R>(&self, reader: R, name: Option<&str>) -> Result<BackupStats>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.run_restore(reader, name, CancelSignal::default()).await
    }

    /// Run [`restore`](Self::restore) on a background task.
    pub fn spawn_restore<R>(&self, reader: R, name: Option<String>) -> OperationHandle
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let this = self.clone();
        let join = tokio::spawn(async move {
            this.run_restore(reader, name.as_deref(), CancelSignal(Some(cancel_rx)))
                .await
        });
        OperationHandle {
            operation: Operation::Restore,
            cancel_tx,
            join,
        }
    }

    #[instrument(
        skip(self, reader, cancel),
        fields(subsystem = "coordinator", component = "backup_coordinator", op = "restore")
    )]
    async fn run_restore<R>(
        &self,
        reader: R,
        name: Option<&str>,
        cancel: CancelSignal,
    ) -> Result<BackupStats>
    where
        R: AsyncRead + Unpin + Send,
    {
        let _loading = LoadingGuard::start(&self.events, Operation::Restore);
        let start = Instant::now();
        let result = self.restore_inner(reader, name, &cancel).await;
        self.report(Operation::Restore, start, result)
    }

    async fn restore_inner<R>(
        &self,
        reader: R,
        name: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<BackupStats>
    where
        R: AsyncRead + Unpin + Send,
    {
        let _serial = match self.config.restore_policy {
            RestorePolicy::Queue => tokio::select! {
                guard = self.restore_lock.lock() => guard,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            },
            RestorePolicy::Reject => self
                .restore_lock
                .try_lock()
                .map_err(|_| Error::RestoreInProgress)?,
        };

        let bytes = tokio::select! {
            read = self.read_source(reader) => read?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        // One timestamp for the whole transaction.
        let now = Utc::now();
        let mut source = SourceBuffer::new(bytes);
        if let Some(name) = name {
            source = source.with_name(name);
        }
        let registry = Arc::clone(&self.registry);
        let (format, mut parsed) =
            tokio::task::spawn_blocking(move || registry.restore(source, now))
                .await
                .map_err(|e| Error::Internal(format!("parse task failed: {}", e)))??;
        cancel.check()?;

        if parsed.is_empty() {
            info!(
                subsystem = "coordinator",
                format = %format,
                "Backup recognized but holds nothing to restore"
            );
            return Ok(BackupStats::default());
        }

        let parsed_stats = parsed.stats();
        let pending_entries = self.resolve_catalog(&mut parsed).await?;

        let existing = self.store.get_all_clips().await?;
        let outcome = merge(&existing, std::mem::take(&mut parsed.clips), now);
        // Last cancellation point; nothing has been written yet.
        cancel.check()?;

        debug!(
            subsystem = "coordinator",
            format = %format,
            catalog_count = pending_entries.len(),
            clip_count = outcome.upserts.len(),
            skipped_count = outcome.skipped_blank,
            "Committing restore"
        );
        for entry in pending_entries {
            trace!(
                subsystem = "coordinator",
                catalog_id = %entry.id,
                name = %entry.name,
                "Saving restored catalog entry"
            );
            self.store.save_entry(entry).await?;
        }
        let (committed, failed) = self.commit(outcome.upserts).await;

        let mut stats = BackupStats {
            notes: committed.len(),
            tags: parsed_stats.tags,
            filters: parsed_stats.filters,
            snippet_kits: parsed_stats.snippet_kits,
            settings: false,
            failed,
            clips: committed,
        };

        if let Some(settings) = parsed.settings.take() {
            match self.store.save_settings(settings).await {
                Ok(()) => {
                    stats.settings = true;
                    self.events.emit(BackupEvent::SettingsChanged);
                }
                Err(e) => warn!(
                    subsystem = "coordinator",
                    error = %e,
                    "Restored settings could not be saved"
                ),
            }
        }

        Ok(stats)
    }

    /// Read the whole source, refusing anything over the configured limit.
    async fn read_source<R>(&self, reader: R) -> Result<Vec<u8>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let limit = self.config.max_source_bytes;
        let mut bytes = Vec::new();
        BufReader::new(reader)
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .await?;
        if bytes.len() as u64 > limit {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("restore source is larger than {} bytes", limit),
            )));
        }
        debug!(
            subsystem = "coordinator",
            byte_len = bytes.len(),
            "Restore source read"
        );
        Ok(bytes)
    }

    /// Map catalog entries and labels onto the store's catalog.
    ///
    /// Read-only: returns the entries that still have to be saved. An entry
    /// already stored under the same id is reused as is. Otherwise an entry
    /// of the same kind and name, stored or pending, is reused under its id
    /// and clip references are rewritten to it. Anything else is pending.
    async fn resolve_catalog(&self, parsed: &mut ParsedBackup) -> Result<Vec<CatalogEntry>> {
        let mut remap: HashMap<String, String> = HashMap::new();
        let mut pending: Vec<CatalogEntry> = Vec::new();
        let mut pending_by_name: HashMap<(CatalogKind, String), String> = HashMap::new();

        let catalog = std::mem::take(&mut parsed.catalog);
        let labels = std::mem::take(&mut parsed.labels);
        let entries = catalog
            .into_iter()
            .map(|e| (e, true))
            .chain(labels.into_iter().map(|e| (e, false)));

        for (entry, by_id) in entries {
            if by_id && self.store.find_by_id(&entry.id).await?.is_some() {
                trace!(
                    subsystem = "coordinator",
                    catalog_id = %entry.id,
                    "Catalog entry already stored"
                );
                continue;
            }

            let key = (entry.kind, entry.name.clone());
            let target = match pending_by_name.get(&key) {
                Some(id) => Some(id.clone()),
                None => self
                    .store
                    .find_by_name(entry.kind, &entry.name)
                    .await?
                    .map(|stored| stored.id),
            };
            match target {
                Some(id) => {
                    if id != entry.id {
                        remap.insert(entry.id, id);
                    }
                }
                None => {
                    pending_by_name.insert(key, entry.id.clone());
                    pending.push(entry);
                }
            }
        }

        if !remap.is_empty() {
            debug!(
                subsystem = "coordinator",
                catalog_count = remap.len(),
                "Remapping catalog references to stored entries"
            );
            for clip in &mut parsed.clips {
                remap_ids(&mut clip.tag_ids, &remap);
                remap_ids(&mut clip.snippet_kit_ids, &remap);
            }
        }
        Ok(pending)
    }

    /// Upsert every record, at most `commit_concurrency` at a time.
    ///
    /// A failed upsert is logged and counted; it never stops the others.
    /// Returns the stored clips in merge order and the failure count.
    async fn commit(&self, upserts: Vec<Upsert>) -> (Vec<Clip>, usize) {
        let semaphore = Arc::new(Semaphore::new(self.config.commit_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, upsert) in upserts.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (idx, Err(Error::Internal("commit semaphore closed".into())));
                };
                let Upsert { previous, next } = upsert;
                let result = store
                    .update(previous.as_ref(), next)
                    .await
                    .map_err(|e| Error::Commit(format!("record {}: {}", idx, e)));
                (idx, result)
            });
        }

        let mut committed = Vec::with_capacity(tasks.len());
        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, Ok(clip))) => {
                    trace!(
                        subsystem = "coordinator",
                        op = "commit",
                        clip_id = ?clip.local_id,
                        "Clip committed"
                    );
                    committed.push((idx, clip));
                }
                Ok((idx, Err(e))) => {
                    failed += 1;
                    warn!(
                        subsystem = "coordinator",
                        op = "commit",
                        record = idx,
                        error = %e,
                        "Clip upsert failed, continuing with the rest"
                    );
                }
                Err(e) => {
                    failed += 1;
                    let e = Error::Commit(format!("upsert task failed: {}", e));
                    warn!(
                        subsystem = "coordinator",
                        op = "commit",
                        error = %e,
                        "Clip upsert task failed"
                    );
                }
            }
        }

        committed.sort_by_key(|(idx, _)| *idx);
        (committed.into_iter().map(|(_, clip)| clip).collect(), failed)
    }

    // -------------------------------------------------------------------------
    // Backup
    // -------------------------------------------------------------------------

    /// Write the selected categories to `writer` in the native format.
    pub async fn backup<W>(&self, selection: &[BackupItemType], writer: W) -> Result<BackupStats>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.run_backup(selection, writer, CancelSignal::default())
            .await
    }

    /// Run [`backup`](Self::backup) on a background task.
    pub fn spawn_backup<W>(&self, selection: Vec<BackupItemType>, writer: W) -> OperationHandle
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let this = self.clone();
        let join = tokio::spawn(async move {
            this.run_backup(&selection, writer, CancelSignal(Some(cancel_rx)))
                .await
        });
        OperationHandle {
            operation: Operation::Backup,
            cancel_tx,
            join,
        }
    }

    #[instrument(
        skip(self, writer, cancel),
        fields(subsystem = "coordinator", component = "backup_coordinator", op = "backup")
    )]
    async fn run_backup<W>(
        &self,
        selection: &[BackupItemType],
        writer: W,
        cancel: CancelSignal,
    ) -> Result<BackupStats>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let _loading = LoadingGuard::start(&self.events, Operation::Backup);
        let start = Instant::now();
        let result = self.backup_inner(selection, writer, &cancel).await;
        self.report(Operation::Backup, start, result)
    }

    async fn backup_inner<W>(
        &self,
        selection: &[BackupItemType],
        mut writer: W,
        cancel: &CancelSignal,
    ) -> Result<BackupStats>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if selection.is_empty() {
            return Err(Error::InvalidInput("no backup categories selected".into()));
        }

        let snapshot = ExportSnapshot {
            clips: self.store.get_all_clips().await?,
            catalog: self.store.list_catalog(None).await?,
            settings: self.store.get_settings().await?,
        };
        cancel.check()?;

        let now = Utc::now();
        let registry = Arc::clone(&self.registry);
        let selection = selection.to_vec();
        let output = tokio::task::spawn_blocking(move || {
            let exporter = registry
                .exporter()
                .ok_or_else(|| Error::Unsupported("no registered format can export".into()))?;
            exporter.serialize(&snapshot, &selection, now)
        })
        .await
        .map_err(|e| Error::Internal(format!("serialize task failed: {}", e)))??;
        cancel.check()?;

        writer.write_all(&output.bytes).await?;
        writer.shutdown().await?;
        debug!(
            subsystem = "coordinator",
            byte_len = output.bytes.len(),
            "Backup written"
        );
        Ok(output.stats)
    }

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    fn report(
        &self,
        operation: Operation,
        start: Instant,
        result: Result<BackupStats>,
    ) -> Result<BackupStats> {
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(stats) => {
                info!(
                    subsystem = "coordinator",
                    op = operation.as_str(),
                    clip_count = stats.notes,
                    failed_count = stats.failed,
                    settings = stats.settings,
                    duration_ms,
                    "Operation completed"
                );
                self.events.emit(BackupEvent::Completed {
                    operation,
                    stats: stats.clone(),
                });
            }
            Err(e) => {
                let report = ErrorReport::from_error(operation, e);
                if matches!(e, Error::Cancelled) {
                    info!(
                        subsystem = "coordinator",
                        op = operation.as_str(),
                        duration_ms,
                        "Operation cancelled"
                    );
                } else {
                    error!(
                        subsystem = "coordinator",
                        op = operation.as_str(),
                        error = %e,
                        duration_ms,
                        "Operation failed"
                    );
                }
                self.events.emit(BackupEvent::Failed { operation, report });
            }
        }
        result
    }
}

fn remap_ids(ids: &mut std::collections::BTreeSet<String>, remap: &HashMap<String, String>) {
    if !ids.iter().any(|id| remap.contains_key(id)) {
        return;
    }
    *ids = std::mem::take(ids)
        .into_iter()
        .map(|id| remap.get(&id).cloned().unwrap_or(id))
        .collect();
}
