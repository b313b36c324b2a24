use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::constants::ROOT_PATH;
use crate::path;
use crate::ActionKind;
use crate::ActionMonitor;
use crate::ActionPayload;
use crate::ActionRecord;
use crate::CacheTable;
use crate::ChildrenCache;
use crate::ChildrenCacheListener;
use crate::CreateMode;
use crate::DataSerializer;
use crate::Error;
use crate::HandleInfo;
use crate::NodeCache;
use crate::NodeCacheListener;
use crate::ProgrammerError;
use crate::Result;
use crate::Session;
use crate::SessionRegistry;
use crate::Stat;
use crate::TreeCache;
use crate::TreeCacheListener;

/// User-facing handle bound to one environment and one
/// `(server, credential)` pair.
///
/// Many handles share one session through the [`SessionRegistry`]. Every
/// path argument goes through [`path::real_path`] first, and every
/// completed operation is published to the [`ActionMonitor`].
///
/// A handle holds one session reference until [`ZkClient::close`]; closing
/// twice is an error and does not release twice.
pub struct ZkClient {
    info: Arc<HandleInfo>,
    auth: Option<String>,
    registry: Arc<SessionRegistry>,
    monitor: Arc<ActionMonitor>,
    node_caches: CacheTable<NodeCache>,
    children_caches: CacheTable<ChildrenCache>,
    tree_caches: CacheTable<TreeCache>,
    closed: AtomicBool,
}

impl std::fmt::Debug for ZkClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ZkClient")
            .field("id", &self.info.id)
            .field("environment", &self.info.environment)
            .field("server", &self.info.server)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ZkClient {
    /// Takes a session reference for `(server, auth)`
    pub fn open(
        environment: &str,
        server: &str,
        auth: Option<&str>,
        registry: Arc<SessionRegistry>,
        monitor: Arc<ActionMonitor>,
    ) -> Result<Self> {
        registry.acquire(server, auth)?;

        let info = Arc::new(HandleInfo {
            id: nanoid::nanoid!(),
            environment: environment.to_string(),
            server: server.to_string(),
        });
        debug!(handle = %info.id, environment, server, "client opened");
        Ok(Self {
            node_caches: CacheTable::new(info.id.clone()),
            children_caches: CacheTable::new(info.id.clone()),
            tree_caches: CacheTable::new(info.id.clone()),
            info,
            auth: auth.map(str::to_string),
            registry,
            monitor,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Free-form label; empty for handles bound directly to a server
    pub fn environment(&self) -> &str {
        &self.info.environment
    }

    pub fn server(&self) -> &str {
        &self.info.server
    }

    pub fn info(&self) -> Arc<HandleInfo> {
        self.info.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Canonical form of `path`
    pub fn real_path(
        &self,
        path: &str,
    ) -> String {
        path::real_path(path)
    }

    /// Shared session behind this handle
    pub fn session(&self) -> Result<Arc<dyn Session>> {
        if self.is_closed() {
            return Err(ProgrammerError::HandleClosed {
                handle: self.info.id.clone(),
            }
            .into());
        }
        self.registry
            .lookup(&self.info.server, self.auth.as_deref())
            .ok_or_else(|| {
                ProgrammerError::SessionNotAcquired {
                    server: self.info.server.clone(),
                }
                .into()
            })
    }

    pub fn node_cache_count(&self) -> usize {
        self.node_caches.len()
    }

    pub fn children_cache_count(&self) -> usize {
        self.children_caches.len()
    }

    pub fn tree_cache_count(&self) -> usize {
        self.tree_caches.len()
    }

    // -
    // Reads

    pub async fn exists(
        &self,
        path: &str,
    ) -> Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }

    /// `None` when the node is absent
    pub async fn stat(
        &self,
        path: &str,
    ) -> Result<Option<Stat>> {
        let real = checked(path)?;
        self.session()?.exists(&real).await
    }

    /// Fails with [`Error::NoNode`] when the node is absent
    pub async fn get_bytes(
        &self,
        path: &str,
    ) -> Result<Vec<u8>> {
        Ok(self.get_bytes_with_stat(path).await?.0)
    }

    /// Data and the stat of the same read
    pub async fn get_bytes_with_stat(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, Stat)> {
        let real = checked(path)?;
        let (data, stat) = self.session()?.get_data(&real).await?;
        self.emit(ActionKind::GetData, &real, Some(ActionPayload::Bytes(data.clone())));
        Ok((data, stat))
    }

    pub async fn get<T, S>(
        &self,
        path: &str,
        serializer: &S,
    ) -> Result<T>
    where
        S: DataSerializer<T> + ?Sized,
    {
        Ok(self.get_with_stat(path, serializer).await?.0)
    }

    pub async fn get_with_stat<T, S>(
        &self,
        path: &str,
        serializer: &S,
    ) -> Result<(T, Stat)>
    where
        S: DataSerializer<T> + ?Sized,
    {
        let (data, stat) = self.get_bytes_with_stat(path).await?;
        Ok((serializer.deserialize(&data)?, stat))
    }

    /// Child names in the order the service returns them
    pub async fn list_children(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        let real = checked(path)?;
        let names = self.session()?.get_children(&real).await?;
        self.emit(ActionKind::GetChildNames, &real, Some(ActionPayload::Names(names.clone())));
        Ok(names)
    }

    // -
    // Writes

    /// Creates `path`, creating missing parents as empty persistent nodes.
    /// Returns the created path, which carries the assigned suffix for
    /// sequential modes.
    pub async fn create(
        &self,
        path: &str,
        mode: CreateMode,
        data: Option<Vec<u8>>,
    ) -> Result<String> {
        let real = checked(path)?;
        let session = self.session()?;
        let created = create_with_parents(
            session.as_ref(),
            &real,
            data.clone().unwrap_or_default(),
            mode,
        )
        .await?;

        let kind = if mode.is_ephemeral() {
            ActionKind::CreateEphemeral
        } else {
            ActionKind::CreatePersistent
        };
        self.emit(kind, &created, data.map(ActionPayload::Bytes));
        Ok(created)
    }

    pub async fn create_ephemeral(
        &self,
        path: &str,
    ) -> Result<()> {
        self.create(path, CreateMode::Ephemeral, None).await.map(|_| ())
    }

    pub async fn create_ephemeral_with<T, S>(
        &self,
        path: &str,
        value: &T,
        serializer: &S,
    ) -> Result<()>
    where
        S: DataSerializer<T> + ?Sized,
    {
        let data = serializer.serialize(value)?;
        self.create(path, CreateMode::Ephemeral, Some(data)).await.map(|_| ())
    }

    pub async fn create_ephemeral_sequential(
        &self,
        path: &str,
    ) -> Result<String> {
        self.create(path, CreateMode::EphemeralSequential, None).await
    }

    pub async fn create_ephemeral_sequential_with<T, S>(
        &self,
        path: &str,
        value: &T,
        serializer: &S,
    ) -> Result<String>
    where
        S: DataSerializer<T> + ?Sized,
    {
        let data = serializer.serialize(value)?;
        self.create(path, CreateMode::EphemeralSequential, Some(data)).await
    }

    pub async fn create_persistent(
        &self,
        path: &str,
    ) -> Result<()> {
        self.create(path, CreateMode::Persistent, None).await.map(|_| ())
    }

    pub async fn create_persistent_with<T, S>(
        &self,
        path: &str,
        value: &T,
        serializer: &S,
    ) -> Result<()>
    where
        S: DataSerializer<T> + ?Sized,
    {
        let data = serializer.serialize(value)?;
        self.create(path, CreateMode::Persistent, Some(data)).await.map(|_| ())
    }

    /// Persistent upsert: replaces the data of an existing node, otherwise
    /// creates it with its parents
    pub async fn create_or_set(
        &self,
        path: &str,
        data: Vec<u8>,
    ) -> Result<()> {
        let real = checked(path)?;
        let session = self.session()?;
        match create_with_parents(session.as_ref(), &real, data.clone(), CreateMode::Persistent).await {
            Ok(_) => {}
            Err(Error::NodeExists { .. }) => {
                session.set_data(&real, data.clone(), None).await?;
            }
            Err(e) => return Err(e),
        }
        self.emit(ActionKind::UpdatePersistent, &real, Some(ActionPayload::Bytes(data)));
        Ok(())
    }

    pub async fn create_persistent_or_set_data<T, S>(
        &self,
        path: &str,
        value: &T,
        serializer: &S,
    ) -> Result<()>
    where
        S: DataSerializer<T> + ?Sized,
    {
        let data = serializer.serialize(value)?;
        self.create_or_set(path, data).await
    }

    /// Unconditional update
    pub async fn set_data(
        &self,
        path: &str,
        data: Vec<u8>,
    ) -> Result<Stat> {
        self.write_data(path, data, None).await
    }

    /// Fails with [`Error::BadVersion`] unless the node is at `expected_version`
    pub async fn set_data_versioned(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_version: i32,
    ) -> Result<Stat> {
        self.write_data(path, data, Some(expected_version)).await
    }

    pub async fn set_data_with<T, S>(
        &self,
        path: &str,
        value: &T,
        serializer: &S,
    ) -> Result<Stat>
    where
        S: DataSerializer<T> + ?Sized,
    {
        let data = serializer.serialize(value)?;
        self.write_data(path, data, None).await
    }

    pub async fn set_data_with_version<T, S>(
        &self,
        path: &str,
        value: &T,
        serializer: &S,
        expected_version: i32,
    ) -> Result<Stat>
    where
        S: DataSerializer<T> + ?Sized,
    {
        let data = serializer.serialize(value)?;
        self.write_data(path, data, Some(expected_version)).await
    }

    /// Removes `path`. With `recursive`, descendants go first, deepest
    /// level first; descendants that vanish mid-walk are skipped. Without
    /// it a node with children fails with [`Error::NotEmpty`].
    pub async fn delete_path(
        &self,
        path: &str,
        recursive: bool,
    ) -> Result<()> {
        let real = checked(path)?;
        let session = self.session()?;
        if recursive {
            delete_tree(session.as_ref(), &real).await?;
        } else {
            session.delete(&real, None).await?;
        }
        self.emit(ActionKind::DeletePath, &real, None);
        Ok(())
    }

    async fn write_data(
        &self,
        path: &str,
        data: Vec<u8>,
        version: Option<i32>,
    ) -> Result<Stat> {
        let real = checked(path)?;
        let stat = self.session()?.set_data(&real, data.clone(), version).await?;
        self.emit(ActionKind::SetData, &real, Some(ActionPayload::Bytes(data)));
        Ok(stat)
    }

    // -
    // Watch caches

    /// The node cache of `path`, created and started on first request
    pub fn node_cache(
        &self,
        path: &str,
    ) -> Result<Arc<NodeCache>> {
        self.node_cache_real(checked(path)?)
    }

    pub fn add_node_cache_listener(
        &self,
        path: &str,
        listener: Arc<dyn NodeCacheListener>,
    ) -> Result<Arc<NodeCache>> {
        let real = listener_path(path, "Node cache")?;
        let cache = self.node_cache_real(real.clone())?;
        cache.add_listener(listener);
        self.emit(ActionKind::AddCacheListener, &real, None);
        Ok(cache)
    }

    pub fn remove_node_cache_listener(
        &self,
        path: &str,
        listener: &Arc<dyn NodeCacheListener>,
    ) -> Result<Arc<NodeCache>> {
        let real = listener_path(path, "Node cache")?;
        let cache = self.node_cache_real(real.clone())?;
        cache.remove_listener(listener);
        self.emit(ActionKind::RemoveCacheListener, &real, None);
        Ok(cache)
    }

    fn node_cache_real(
        &self,
        real: String,
    ) -> Result<Arc<NodeCache>> {
        let session = self.session()?;
        let (cache, created) = self
            .node_caches
            .get_or_create(&real, || NodeCache::start(session, real.clone()))?;
        if created {
            self.emit(ActionKind::AddNodeCache, &real, None);
        }
        Ok(cache)
    }

    /// The children cache of `path`, created and started on first request
    pub fn children_cache(
        &self,
        path: &str,
    ) -> Result<Arc<ChildrenCache>> {
        self.children_cache_real(checked(path)?)
    }

    pub fn add_children_cache_listener(
        &self,
        path: &str,
        listener: Arc<dyn ChildrenCacheListener>,
    ) -> Result<Arc<ChildrenCache>> {
        let real = listener_path(path, "Path child cache")?;
        let cache = self.children_cache_real(real.clone())?;
        cache.add_listener(listener);
        self.emit(ActionKind::AddCacheListener, &real, None);
        Ok(cache)
    }

    pub fn remove_children_cache_listener(
        &self,
        path: &str,
        listener: &Arc<dyn ChildrenCacheListener>,
    ) -> Result<Arc<ChildrenCache>> {
        let real = listener_path(path, "Path child cache")?;
        let cache = self.children_cache_real(real.clone())?;
        cache.remove_listener(listener);
        self.emit(ActionKind::RemoveCacheListener, &real, None);
        Ok(cache)
    }

    fn children_cache_real(
        &self,
        real: String,
    ) -> Result<Arc<ChildrenCache>> {
        let session = self.session()?;
        let (cache, created) = self
            .children_caches
            .get_or_create(&real, || ChildrenCache::start(session, real.clone()))?;
        if created {
            self.emit(ActionKind::AddPathCache, &real, None);
        }
        Ok(cache)
    }

    /// The subtree cache of `path`, created and started on first request
    pub fn tree_cache(
        &self,
        path: &str,
    ) -> Result<Arc<TreeCache>> {
        self.tree_cache_real(checked(path)?)
    }

    pub fn add_tree_cache_listener(
        &self,
        path: &str,
        listener: Arc<dyn TreeCacheListener>,
    ) -> Result<Arc<TreeCache>> {
        let real = listener_path(path, "Tree cache")?;
        let cache = self.tree_cache_real(real.clone())?;
        cache.add_listener(listener);
        self.emit(ActionKind::AddCacheListener, &real, None);
        Ok(cache)
    }

    pub fn remove_tree_cache_listener(
        &self,
        path: &str,
        listener: &Arc<dyn TreeCacheListener>,
    ) -> Result<Arc<TreeCache>> {
        let real = listener_path(path, "Tree cache")?;
        let cache = self.tree_cache_real(real.clone())?;
        cache.remove_listener(listener);
        self.emit(ActionKind::RemoveCacheListener, &real, None);
        Ok(cache)
    }

    fn tree_cache_real(
        &self,
        real: String,
    ) -> Result<Arc<TreeCache>> {
        let session = self.session()?;
        let (cache, created) = self
            .tree_caches
            .get_or_create(&real, || TreeCache::start(session, real.clone()))?;
        if created {
            self.emit(ActionKind::AddTreeCache, &real, None);
        }
        Ok(cache)
    }

    // -
    // Lifecycle

    /// Closes every cache, then returns the session reference
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            warn!(handle = %self.info.id, server = %self.info.server, "client closed twice");
            return Err(ProgrammerError::DoubleClose {
                handle: self.info.id.clone(),
            }
            .into());
        }
        self.node_caches.close_all();
        self.children_caches.close_all();
        self.tree_caches.close_all();
        self.registry.release(&self.info.server, self.auth.as_deref());
        info!(handle = %self.info.id, server = %self.info.server, "client closed");
        Ok(())
    }

    fn emit(
        &self,
        kind: ActionKind,
        path: &str,
        payload: Option<ActionPayload>,
    ) {
        self.monitor.trigger_action(ActionRecord {
            kind,
            origin: self.info.clone(),
            path: path.to_string(),
            payload,
        });
    }
}

impl Drop for ZkClient {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(
                handle = %self.info.id,
                server = %self.info.server,
                "client dropped without close; its session reference is leaked"
            );
        }
    }
}

fn checked(path: &str) -> Result<String> {
    let real = path::real_path(path);
    path::validate(&real)?;
    Ok(real)
}

fn listener_path(
    path: &str,
    context: &'static str,
) -> Result<String> {
    if path.trim().is_empty() {
        return Err(ProgrammerError::BlankPath { context }.into());
    }
    checked(path)
}

/// Missing ancestors are created as empty persistent nodes; a concurrent
/// creator of the same ancestor is not an error.
async fn create_with_parents(
    session: &dyn Session,
    path: &str,
    data: Vec<u8>,
    mode: CreateMode,
) -> Result<String> {
    match session.create(path, data.clone(), mode).await {
        Err(Error::NoNode { .. }) => {}
        other => return other,
    }

    let mut ancestors = Vec::new();
    let mut current = path::parent(path);
    while let Some(p) = current.filter(|p| *p != ROOT_PATH) {
        ancestors.push(p);
        current = path::parent(p);
    }
    for ancestor in ancestors.into_iter().rev() {
        match session.create(ancestor, Vec::new(), CreateMode::Persistent).await {
            Ok(_) | Err(Error::NodeExists { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    session.create(path, data, mode).await
}

async fn delete_tree(
    session: &dyn Session,
    root: &str,
) -> Result<()> {
    // Breadth-first listing; deleting in reverse removes leaves first.
    let mut order = vec![root.to_string()];
    let mut next = 0;
    while next < order.len() {
        let current = order[next].clone();
        next += 1;
        match session.get_children(&current).await {
            Ok(names) => order.extend(names.iter().map(|name| path::join(&current, name))),
            Err(Error::NoNode { .. }) if current != root => {}
            Err(e) => return Err(e),
        }
    }

    for p in order.iter().rev() {
        match session.delete(p, None).await {
            Ok(()) => {}
            Err(Error::NoNode { .. }) if p != root => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
