//! Reconciliation between the local store and the remote API

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, trace, warn};

use super::error::{SyncError, SyncResult};
use super::report::SyncReport;
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{offline_id, Origin, Todo, TodoPatch};
use crate::remote::QueryClient;
use crate::storage::{LocalStore, StorageError, UpsertOutcome};

/// Engine behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Record tombstones on delete and let them block remote re-inserts
    pub tombstones_enabled: bool,
    /// Push pending records whenever a local change event arrives
    pub push_on_change: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            tombstones_enabled: true,
            push_on_change: true,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tombstones_enabled: config.tombstones_enabled,
            push_on_change: config.push_on_change,
        }
    }
}

/// A user action routed through [`SyncEngine::dispatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Add(String),
    Toggle(String),
    Delete(String),
    Sync,
}

/// Keeps the local store and the remote API in step
///
/// Cheap to clone; clones share the store, the query cache and the
/// outbound lock.
#[derive(Clone)]
pub struct SyncEngine {
    store: LocalStore,
    remote: QueryClient,
    connectivity: ConnectivityMonitor,
    options: SyncOptions,
    /// Serializes everything that sends mutations, so a push sweep never
    /// re-sends a change a user action is already pushing
    outbound: Arc<Mutex<()>>,
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        remote: QueryClient,
        connectivity: ConnectivityMonitor,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            options,
            outbound: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn remote(&self) -> &QueryClient {
        &self.remote
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    // ==================== Remote -> Local ====================

    /// Mirror a remote result set into the local store
    ///
    /// Remote field values win. Tombstoned ids are skipped when tombstones
    /// are enabled. Records missing from `items` are left alone locally.
    pub async fn apply_remote(&self, items: &[Todo]) -> SyncReport {
        let respect_tombstones = self.options.tombstones_enabled;
        let results = join_all(
            items
                .iter()
                .map(|item| self.store.upsert_from_remote(item, respect_tombstones)),
        )
        .await;

        let mut report = SyncReport::default();
        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(UpsertOutcome::Inserted) | Ok(UpsertOutcome::Updated) => report.upserted += 1,
                Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
                Ok(UpsertOutcome::Tombstoned) => {
                    trace!("Skipping tombstoned todo {}", item.id);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Failed to apply remote todo {}: {}", item.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.upserted > 0 {
            debug!("Applied remote todos: {}", report);
        }
        report
    }

    // ==================== Local -> Remote ====================

    /// Push every pending local record and unpushed tombstone
    ///
    /// Does nothing while offline. Failures are logged and counted; the
    /// record stays pending.
    pub async fn push_local(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();
        if !self.connectivity.is_online() {
            debug!("Offline, not pushing local changes");
            return Ok(report);
        }

        let _guard = self.outbound.lock().await;

        for pending in self.store.pending().await? {
            let id = &pending.todo.id;
            if pending.has_remote_revision() {
                match self.remote.update_todo(id, pending.todo.done).await {
                    Ok(_) => {
                        self.store.mark_synced(id, pending.revision).await?;
                        report.updated += 1;
                    }
                    Err(e) => {
                        warn!("Failed to push update for {}: {}", id, e);
                        report.failed += 1;
                    }
                }
            } else {
                // The server assigns its own id; the local record keeps the
                // offline one
                match self
                    .remote
                    .create_todo(&pending.todo.name, pending.todo.done)
                    .await
                {
                    Ok(created) => {
                        debug!("Pushed offline todo {} as {}", id, created.id);
                        self.store.mark_synced(id, pending.revision).await?;
                        report.created += 1;
                    }
                    Err(e) => {
                        warn!("Failed to push new todo {}: {}", id, e);
                        report.failed += 1;
                    }
                }
            }
        }

        for tombstone in self.store.unpushed_tombstones().await? {
            match self.remote.delete_todo(&tombstone.id).await {
                Ok(_) => {
                    self.store.mark_tombstone_pushed(&tombstone.id).await?;
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to push delete for {}: {}", tombstone.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.pushed() > 0 || report.failed > 0 {
            info!("Pushed local changes: {}", report);
        }
        Ok(report)
    }

    // ==================== User Actions ====================

    /// Add a todo
    ///
    /// Online, the remote creates it first and the local copy uses the
    /// server id. Offline, it is stored locally under a timestamp id and
    /// pushed later. Blank names are ignored (`Ok(None)`).
    pub async fn add_todo(&self, name: &str) -> SyncResult<Option<Todo>> {
        let name = name.trim();
        if name.is_empty() {
            debug!("Ignoring blank todo name");
            return Ok(None);
        }

        if !self.connectivity.is_online() {
            let todo = Todo::new(offline_id(Utc::now()), name, false);
            self.store.insert(&todo).await?;
            info!("Added todo {} offline", todo.id);
            return Ok(Some(todo));
        }

        let _guard = self.outbound.lock().await;
        let created = self.remote.create_todo(name, false).await?;
        match self.store.insert_synced(&created).await {
            Ok(()) => {}
            // The refetch that followed the mutation may already have been
            // mirrored by a running sync loop
            Err(StorageError::Duplicate { .. }) => {
                debug!("Todo {} already mirrored locally", created.id);
            }
            Err(e) => return Err(e.into()),
        }
        info!("Added todo {}", created.id);
        Ok(Some(created))
    }

    /// Flip a todo's completion flag
    ///
    /// The local record is patched first; the remote update follows when
    /// online. Returns the updated record.
    pub async fn toggle_todo(&self, id: &str) -> SyncResult<Todo> {
        let _guard = self.outbound.lock().await;

        let existing = self
            .store
            .find_one_local(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;

        let updated = self
            .store
            .patch(id, &TodoPatch::done(!existing.todo.done))
            .await
            .map_err(|e| not_found_or(e, id))?;

        // Never-pushed records go out as a create with the next push sweep
        if self.connectivity.is_online() && existing.has_remote_revision() {
            self.remote.update_todo(id, updated.todo.done).await?;
            self.store.mark_synced(id, updated.revision).await?;
        }

        info!("Toggled todo {} (done: {})", id, updated.todo.done);
        Ok(updated.todo)
    }

    /// Delete a todo
    ///
    /// The local record is removed (and tombstoned, when enabled) first; the
    /// remote delete follows when online. Returns the removed record.
    pub async fn delete_todo(&self, id: &str) -> SyncResult<Todo> {
        let _guard = self.outbound.lock().await;

        let existing = self
            .store
            .find_one_local(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;

        let removed = if self.options.tombstones_enabled {
            self.store.remove_with_tombstone(id).await
        } else {
            self.store.remove(id).await
        }
        .map_err(|e| not_found_or(e, id))?;

        if self.options.tombstones_enabled && !existing.has_remote_revision() {
            // The remote never saw it, nothing to delete there
            self.store.mark_tombstone_pushed(id).await?;
        } else if self.connectivity.is_online() {
            self.remote.delete_todo(id).await?;
            if self.options.tombstones_enabled {
                self.store.mark_tombstone_pushed(id).await?;
            }
        }

        info!("Deleted todo {}", id);
        Ok(removed)
    }

    /// Run a user action, logging any failure
    pub async fn dispatch(&self, intent: Intent) {
        let result = match &intent {
            Intent::Add(name) => self.add_todo(name).await.map(|_| ()),
            Intent::Toggle(id) => self.toggle_todo(id).await.map(|_| ()),
            Intent::Delete(id) => self.delete_todo(id).await.map(|_| ()),
            Intent::Sync => self.sync_once().await.map(|_| ()),
        };
        if let Err(e) = result {
            error!("{:?} failed: {}", intent, e);
        }
    }

    // ==================== Sweeps ====================

    /// One full round: push pending local changes, then refetch and apply
    ///
    /// Fails with [`SyncError::Offline`] while offline.
    pub async fn sync_once(&self) -> SyncResult<SyncReport> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let mut report = self.push_local().await?;
        let items = self.remote.refetch().await?;
        report += self.apply_remote(&items).await;
        Ok(report)
    }

    /// Background loop
    ///
    /// Starting online, it first pushes whatever earlier sessions left
    /// pending, so the first query result cannot overwrite those edits.
    /// It then applies every new query result while online, pushes after
    /// local change events (ignoring writes the sync made itself), and on
    /// the offline-to-online transition pushes pending changes and
    /// refetches. Exits when `shutdown` fires or is dropped.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        let mut query_rx = self.remote.subscribe();
        let mut changes = self.store.subscribe();
        let mut online_rx = self.connectivity.subscribe();

        let mut last_fetch = query_rx.borrow_and_update().fetched_at;
        let mut online = *online_rx.borrow_and_update();
        info!("Sync loop started (online: {})", online);

        if online {
            if let Err(e) = self.push_local().await {
                error!("Startup push failed: {}", e);
            }
        }

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online_rx.borrow_and_update();
                    let came_online = now_online && !online;
                    online = now_online;
                    if came_online {
                        info!("Back online, reconciling");
                        if let Err(e) = self.sync_once().await {
                            error!("Reconnect sync failed: {}", e);
                        }
                    }
                }

                changed = query_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = query_rx.borrow_and_update().clone();
                    if state.fetched_at == last_fetch {
                        continue;
                    }
                    last_fetch = state.fetched_at;
                    if let Some(items) = state.data {
                        if self.connectivity.is_online() {
                            self.apply_remote(&items).await;
                        }
                    }
                }

                event = changes.recv() => match event {
                    Ok(event) if event.origin == Origin::Remote => {
                        trace!("Ignoring sync-originated change to {}", event.id);
                    }
                    Ok(event) => {
                        trace!("Local {:?} of {}", event.kind, event.id);
                        self.push_after_change().await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Missed {} change events", missed);
                        self.push_after_change().await;
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("Sync loop stopped");
    }

    async fn push_after_change(&self) {
        if !self.options.push_on_change {
            return;
        }
        if let Err(e) = self.push_local().await {
            error!("Push after local change failed: {}", e);
        }
    }
}

fn not_found_or(e: StorageError, id: &str) -> SyncError {
    if e.is_not_found() {
        SyncError::NotFound(id.to_string())
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::{FakeRemote, Mutation};
    use std::time::Duration;

    struct Harness {
        fake: Arc<FakeRemote>,
        engine: SyncEngine,
    }

    fn harness(remote_todos: Vec<Todo>, online: bool) -> Harness {
        harness_with(remote_todos, online, SyncOptions::default())
    }

    fn harness_with(remote_todos: Vec<Todo>, online: bool, options: SyncOptions) -> Harness {
        let fake = Arc::new(FakeRemote::with_todos(remote_todos));
        let engine = SyncEngine::new(
            LocalStore::open_in_memory().unwrap(),
            QueryClient::new(fake.clone()),
            ConnectivityMonitor::new(online),
            options,
        );
        Harness { fake, engine }
    }

    /// Harness whose local store already mirrors the remote list
    async fn synced_harness(remote_todos: Vec<Todo>) -> Harness {
        let h = harness(remote_todos.clone(), true);
        h.engine.apply_remote(&remote_todos).await;
        h
    }

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    // ==================== Remote -> Local ====================

    #[tokio::test]
    async fn test_online_create_round_trip() {
        let h = harness(vec![], true);

        let created = h.engine.add_todo("buy milk").await.unwrap().unwrap();

        let remote = h.engine.remote().cached().unwrap();
        assert_eq!(remote, vec![created.clone()]);
        let report = h.engine.apply_remote(&remote).await;
        assert_eq!(report.unchanged, 1);
        assert_eq!(h.engine.store().find().await.unwrap(), remote);
        assert!(h.engine.store().pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_remote_is_idempotent() {
        let items = vec![
            Todo::new("1", "walk", false),
            Todo::new("2", "read", true),
        ];
        let h = harness(items.clone(), true);

        let first = h.engine.apply_remote(&items).await;
        assert_eq!(first.upserted, 2);
        let after_first = h.engine.store().find_local().await.unwrap();

        let second = h.engine.apply_remote(&items).await;
        assert_eq!(second.upserted, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(h.engine.store().find_local().await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_remote_values_win() {
        let h = synced_harness(vec![Todo::new("1", "walk", false)]).await;
        h.engine
            .store()
            .patch("1", &TodoPatch::done(true))
            .await
            .unwrap();

        h.engine
            .apply_remote(&[Todo::new("1", "walk the dog", false)])
            .await;

        let local = h.engine.store().find_one_local("1").await.unwrap().unwrap();
        assert_eq!(local.todo, Todo::new("1", "walk the dog", false));
        assert_eq!(local.origin, Origin::Remote);
        assert!(!local.is_pending());
    }

    #[tokio::test]
    async fn test_absent_remote_records_are_kept_locally() {
        let h = synced_harness(vec![Todo::new("1", "walk", false)]).await;

        let report = h.engine.apply_remote(&[]).await;

        assert!(report.is_noop());
        assert!(h.engine.store().find_one("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tombstone_blocks_reinsertion() {
        let h = harness(vec![], true);
        h.engine.store().add_tombstone("5").await.unwrap();

        let report = h.engine.apply_remote(&[Todo::new("5", "gone", false)]).await;

        assert_eq!(report.skipped, 1);
        assert!(h.engine.store().find_one("5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tombstones_ignored_when_disabled() {
        let h = harness_with(
            vec![],
            true,
            SyncOptions {
                tombstones_enabled: false,
                ..SyncOptions::default()
            },
        );
        h.engine.store().add_tombstone("5").await.unwrap();

        let report = h.engine.apply_remote(&[Todo::new("5", "back", false)]).await;

        assert_eq!(report.upserted, 1);
        assert!(h.engine.store().find_one("5").await.unwrap().is_some());
    }

    // ==================== User Actions ====================

    #[tokio::test]
    async fn test_blank_name_ignored() {
        let h = harness(vec![], true);
        assert!(h.engine.add_todo("   ").await.unwrap().is_none());
        assert!(h.fake.mutations().is_empty());
        assert_eq!(h.engine.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_add_is_local_only() {
        let h = harness(vec![], false);

        let todo = h.engine.add_todo("buy milk").await.unwrap().unwrap();

        assert!(todo.id.parse::<i64>().is_ok());
        assert!(!todo.done);
        assert!(h.fake.mutations().is_empty());
        let local = h.engine.store().find_one_local(&todo.id).await.unwrap().unwrap();
        assert!(!local.has_remote_revision());
        assert!(local.is_pending());
    }

    #[tokio::test]
    async fn test_online_add_uses_server_id() {
        let h = harness(vec![], true);

        let todo = h.engine.add_todo("  buy milk ").await.unwrap().unwrap();

        assert_eq!(todo.id, "srv-1");
        assert_eq!(todo.name, "buy milk");
        assert_eq!(
            h.fake.mutations(),
            vec![Mutation::Create {
                name: "buy milk".into(),
                done: false
            }]
        );
        assert!(h.engine.store().find_one("srv-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_online_add_failure_writes_nothing() {
        let h = harness(vec![], true);
        h.fake.set_failing(true);

        let err = h.engine.add_todo("buy milk").await.unwrap_err();

        assert!(matches!(err, SyncError::Remote(_)));
        assert_eq!(h.engine.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toggle_sends_one_update() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;

        let updated = h.engine.toggle_todo("42").await.unwrap();
        assert!(updated.done);
        assert_eq!(
            h.fake.mutations(),
            vec![Mutation::Update {
                id: "42".into(),
                done: true
            }]
        );
        let local = h.engine.store().find_one_local("42").await.unwrap().unwrap();
        assert!(local.todo.done);
        assert!(!local.is_pending());

        let restored = h.engine.toggle_todo("42").await.unwrap();
        assert!(!restored.done);
        assert_eq!(
            h.fake.mutations().last(),
            Some(&Mutation::Update {
                id: "42".into(),
                done: false
            })
        );
    }

    #[tokio::test]
    async fn test_toggle_offline_stays_pending() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
        h.engine.connectivity().set_offline();

        h.engine.toggle_todo("42").await.unwrap();

        assert!(h.fake.mutations().is_empty());
        let pending = h.engine.store().pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].todo.done);
    }

    #[tokio::test]
    async fn test_toggle_missing_is_not_found() {
        let h = harness(vec![], true);

        let err = h.engine.toggle_todo("nope").await.unwrap_err();

        assert!(matches!(err, SyncError::NotFound(ref id) if id == "nope"));
        assert!(h.fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_remote_failure_keeps_local_edit() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
        h.fake.set_failing(true);

        assert!(h.engine.toggle_todo("42").await.is_err());

        let local = h.engine.store().find_one_local("42").await.unwrap().unwrap();
        assert!(local.todo.done);
        assert!(local.is_pending());
    }

    #[tokio::test]
    async fn test_online_delete_sends_one_delete() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;

        h.engine.delete_todo("42").await.unwrap();

        assert!(h.engine.store().find_one("42").await.unwrap().is_none());
        assert_eq!(
            h.fake.mutations(),
            vec![Mutation::Delete { id: "42".into() }]
        );
        let tombstones = h.engine.store().tombstones().await.unwrap();
        assert_eq!(tombstones.len(), 1);
        assert!(tombstones[0].pushed);
    }

    #[tokio::test]
    async fn test_offline_delete_pushed_later() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
        h.engine.connectivity().set_offline();

        h.engine.delete_todo("42").await.unwrap();
        assert!(h.fake.mutations().is_empty());
        assert_eq!(h.engine.store().unpushed_tombstones().await.unwrap().len(), 1);

        h.engine.connectivity().set_online();
        let report = h.engine.push_local().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(
            h.fake.mutations(),
            vec![Mutation::Delete { id: "42".into() }]
        );
        assert!(h.engine.store().unpushed_tombstones().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_unpushed_record_skips_remote() {
        let h = harness(vec![], false);
        let todo = h.engine.add_todo("draft").await.unwrap().unwrap();
        h.engine.connectivity().set_online();

        h.engine.delete_todo(&todo.id).await.unwrap();

        assert!(h.fake.mutations().is_empty());
        assert!(h.engine.store().unpushed_tombstones().await.unwrap().is_empty());
        assert!(h.engine.store().has_tombstone(&todo.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_without_tombstones() {
        let h = harness_with(
            vec![Todo::new("42", "walk", false)],
            true,
            SyncOptions {
                tombstones_enabled: false,
                ..SyncOptions::default()
            },
        );
        h.engine
            .apply_remote(&[Todo::new("42", "walk", false)])
            .await;

        h.engine.delete_todo("42").await.unwrap();

        assert!(h.engine.store().tombstones().await.unwrap().is_empty());
        assert_eq!(
            h.fake.mutations(),
            vec![Mutation::Delete { id: "42".into() }]
        );
    }

    #[tokio::test]
    async fn test_dispatch_swallows_errors() {
        let h = harness(vec![], true);
        h.engine.dispatch(Intent::Toggle("missing".into())).await;
        h.engine.dispatch(Intent::Add("walk".into())).await;
        assert_eq!(h.engine.store().count().await.unwrap(), 1);
    }

    // ==================== Sweeps ====================

    #[tokio::test]
    async fn test_push_local_offline_is_noop() {
        let h = harness(vec![], false);
        h.engine.add_todo("draft").await.unwrap();

        let report = h.engine.push_local().await.unwrap();

        assert!(report.is_noop());
        assert!(h.fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_push_local_sends_pending_updates() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
        h.engine
            .store()
            .patch("42", &TodoPatch::done(true))
            .await
            .unwrap();

        let report = h.engine.push_local().await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(
            h.fake.mutations(),
            vec![Mutation::Update {
                id: "42".into(),
                done: true
            }]
        );

        // Nothing left to push
        let again = h.engine.push_local().await.unwrap();
        assert_eq!(again.pushed(), 0);
        assert_eq!(h.fake.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_push_failure_keeps_record_pending() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
        h.engine
            .store()
            .patch("42", &TodoPatch::done(true))
            .await
            .unwrap();
        h.fake.set_failing(true);

        let report = h.engine.push_local().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(h.engine.store().pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_once_offline() {
        let h = harness(vec![], false);
        assert!(matches!(
            h.engine.sync_once().await,
            Err(SyncError::Offline)
        ));
    }

    #[tokio::test]
    async fn test_sync_once_pushes_before_pulling() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
        h.engine.connectivity().set_offline();
        h.engine.toggle_todo("42").await.unwrap();
        h.engine.connectivity().set_online();

        let report = h.engine.sync_once().await.unwrap();

        assert_eq!(report.updated, 1);
        // The offline edit survived the pull
        assert!(h.engine.store().find_one("42").await.unwrap().unwrap().done);
        assert!(h.fake.todos()[0].done);
    }

    #[tokio::test]
    async fn test_sync_race_never_resurrects() {
        for delete_first in [true, false] {
            let h = synced_harness(vec![Todo::new("7", "walk", false)]).await;
            let poll = [Todo::new("7", "walk", false)];

            if delete_first {
                let (deleted, _) =
                    tokio::join!(h.engine.delete_todo("7"), h.engine.apply_remote(&poll));
                deleted.unwrap();
            } else {
                let (_, deleted) =
                    tokio::join!(h.engine.apply_remote(&poll), h.engine.delete_todo("7"));
                deleted.unwrap();
            }
            // A later poll still carrying "7" changes nothing
            h.engine.apply_remote(&poll).await;

            assert!(h.engine.store().find_one("7").await.unwrap().is_none());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sync_race_across_threads() {
        for _ in 0..20 {
            let h = synced_harness(vec![Todo::new("7", "walk", false)]).await;
            let poller = {
                let engine = h.engine.clone();
                tokio::spawn(async move {
                    for _ in 0..5 {
                        engine.apply_remote(&[Todo::new("7", "walk", false)]).await;
                    }
                })
            };
            let deleter = {
                let engine = h.engine.clone();
                tokio::spawn(async move { engine.delete_todo("7").await })
            };
            poller.await.unwrap();
            deleter.await.unwrap().unwrap();

            assert!(h.engine.store().find_one("7").await.unwrap().is_none());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_toggle_racing_remote_write_ends_synced() {
        for _ in 0..20 {
            let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
            let poller = {
                let engine = h.engine.clone();
                tokio::spawn(async move {
                    engine
                        .apply_remote(&[Todo::new("42", "walk the dog", false)])
                        .await;
                })
            };
            let toggler = {
                let engine = h.engine.clone();
                tokio::spawn(async move { engine.toggle_todo("42").await })
            };
            poller.await.unwrap();
            toggler.await.unwrap().unwrap();

            let local = h.engine.store().find_one_local("42").await.unwrap().unwrap();
            assert!(!local.is_pending(), "revision {:?}", local);
            assert_eq!(h.fake.mutations().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_offline_id_duplicates_after_push() {
        // Offline ids are never reconciled with server ids
        let h = harness(vec![], false);
        let offline = h.engine.add_todo("buy milk").await.unwrap().unwrap();

        h.engine.connectivity().set_online();
        let report = h.engine.sync_once().await.unwrap();

        assert_eq!(report.created, 1);
        let local = h.engine.store().find().await.unwrap();
        assert_eq!(local.len(), 2);
        assert!(local.iter().any(|t| t.id == offline.id));
        assert!(local.iter().any(|t| t.id == "srv-1"));
        assert!(local.iter().all(|t| t.name == "buy milk"));
    }

    // ==================== Background loop ====================

    #[tokio::test]
    async fn test_run_applies_query_results() {
        let h = harness(vec![Todo::new("1", "walk", false)], true);
        let (stop, shutdown) = oneshot::channel();
        let task = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.engine.remote().refetch().await.unwrap();

        let store = h.engine.store().clone();
        wait_until(|| {
            let store = store.clone();
            async move { store.find_one("1").await.unwrap().is_some() }
        })
        .await;
        // Sync-originated writes are not pushed back
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.fake.mutations().is_empty());

        stop.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_pushes_on_reconnect() {
        let h = harness(vec![], false);
        h.engine.add_todo("buy milk").await.unwrap();
        let (stop, shutdown) = oneshot::channel();
        let task = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.engine.connectivity().set_online();

        let fake = h.fake.clone();
        wait_until(|| {
            let fake = fake.clone();
            async move { !fake.mutations().is_empty() }
        })
        .await;
        assert_eq!(
            h.fake.mutations(),
            vec![Mutation::Create {
                name: "buy milk".into(),
                done: false
            }]
        );

        stop.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_pushes_edits_left_by_an_earlier_session() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("tandem.db");
        let remote_todos = vec![Todo::new("42", "walk", false)];

        // First session: synced once, then toggled while offline
        {
            let engine = SyncEngine::new(
                LocalStore::open_path(&path).unwrap(),
                QueryClient::new(Arc::new(FakeRemote::with_todos(remote_todos.clone()))),
                ConnectivityMonitor::new(false),
                SyncOptions::default(),
            );
            engine.apply_remote(&remote_todos).await;
            engine.toggle_todo("42").await.unwrap();
        }

        // Second session starts online on the same database
        let fake = Arc::new(FakeRemote::with_todos(remote_todos));
        let engine = SyncEngine::new(
            LocalStore::open_path(&path).unwrap(),
            QueryClient::new(fake.clone()),
            ConnectivityMonitor::new(true),
            SyncOptions::default(),
        );
        let (stop, shutdown) = oneshot::channel();
        let task = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.remote().query().await.unwrap();

        let store = engine.store().clone();
        wait_until(|| {
            let store = store.clone();
            async move { store.pending().await.unwrap().is_empty() }
        })
        .await;
        assert_eq!(
            fake.mutations(),
            vec![Mutation::Update {
                id: "42".into(),
                done: true
            }]
        );
        assert!(fake.todos()[0].done);
        let local = engine.store().find_one_local("42").await.unwrap().unwrap();
        assert!(local.todo.done);

        stop.send(()).unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_options_from_config() {
        let config = Config {
            tombstones_enabled: false,
            push_on_change: false,
            ..Config::default()
        };
        assert_eq!(
            SyncOptions::from_config(&config),
            SyncOptions {
                tombstones_enabled: false,
                push_on_change: false,
            }
        );
        assert_eq!(
            SyncOptions::from_config(&Config::default()),
            SyncOptions::default()
        );
    }

    #[tokio::test]
    async fn test_run_pushes_local_changes() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
        let (stop, shutdown) = oneshot::channel();
        let task = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.engine
            .store()
            .patch("42", &TodoPatch::done(true))
            .await
            .unwrap();

        let fake = h.fake.clone();
        wait_until(|| {
            let fake = fake.clone();
            async move { !fake.mutations().is_empty() }
        })
        .await;
        assert_eq!(
            h.fake.mutations(),
            vec![Mutation::Update {
                id: "42".into(),
                done: true
            }]
        );

        stop.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_holds_local_changes_when_push_on_change_is_off() {
        let remote_todos = vec![Todo::new("42", "walk", false)];
        let h = harness_with(
            remote_todos.clone(),
            true,
            SyncOptions {
                push_on_change: false,
                ..SyncOptions::default()
            },
        );
        h.engine.apply_remote(&remote_todos).await;
        let (stop, shutdown) = oneshot::channel();
        let task = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.engine
            .store()
            .patch("42", &TodoPatch::done(true))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(h.fake.mutations().is_empty());
        assert_eq!(h.engine.store().pending().await.unwrap().len(), 1);

        stop.send(()).unwrap();
        task.await.unwrap();

        // An explicit sync still sends it
        let report = h.engine.sync_once().await.unwrap();
        assert_eq!(report.updated, 1);
        assert!(h.engine.store().pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_does_not_repeat_user_pushes() {
        let h = synced_harness(vec![Todo::new("42", "walk", false)]).await;
        let (stop, shutdown) = oneshot::channel();
        let task = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.engine.toggle_todo("42").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.fake.mutations().len(), 1);

        stop.send(()).unwrap();
        task.await.unwrap();
    }
}
