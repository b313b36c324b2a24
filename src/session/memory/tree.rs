//! Node tree and watch tables of an in-memory ensemble.
//!
//! All mutation happens under the ensemble's tree lock. Watches are
//! one-shot: firing removes them.

use std::collections::BTreeSet;
use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::constants::ROOT_PATH;
use crate::constants::SEQUENTIAL_SUFFIX_WIDTH;
use crate::path;
use crate::session::CreateMode;
use crate::session::OneshotWatch;
use crate::session::Stat;
use crate::session::WatchEventType;
use crate::session::WatchedEvent;
use crate::utils::time::now_millis;
use crate::Error;
use crate::ProgrammerError;
use crate::Result;

#[derive(Debug)]
struct Node {
    data: Vec<u8>,
    stat: Stat,
    children: BTreeSet<String>,
}

#[derive(Debug)]
struct Watcher {
    session_id: i64,
    tx: oneshot::Sender<WatchedEvent>,
}

#[derive(Debug, Default)]
struct WatchTable {
    by_path: HashMap<String, Vec<Watcher>>,
}

impl WatchTable {
    fn add(
        &mut self,
        path: &str,
        session_id: i64,
    ) -> OneshotWatch {
        let (tx, rx) = oneshot::channel();
        self.by_path
            .entry(path.to_string())
            .or_default()
            .push(Watcher { session_id, tx });
        rx
    }

    fn trigger(
        &mut self,
        path: &str,
        event_type: WatchEventType,
    ) {
        if let Some(watchers) = self.by_path.remove(path) {
            for watcher in watchers {
                let _ = watcher.tx.send(WatchedEvent {
                    event_type,
                    path: path.to_string(),
                });
            }
        }
    }

    /// Drops every watch of the session; its receivers observe a closed channel
    fn remove_session(
        &mut self,
        session_id: i64,
    ) {
        self.by_path.retain(|_, watchers| {
            watchers.retain(|w| w.session_id != session_id);
            !watchers.is_empty()
        });
    }

    fn count(&self) -> usize {
        self.by_path.values().map(Vec::len).sum()
    }
}

#[derive(Debug)]
pub(crate) struct DataTree {
    nodes: HashMap<String, Node>,
    zxid: i64,
    data_watches: WatchTable,
    child_watches: WatchTable,
}

impl DataTree {
    pub(crate) fn new() -> Self {
        let now = now_millis();
        let root = Node {
            data: Vec::new(),
            stat: Stat {
                ctime: now,
                mtime: now,
                ..Stat::default()
            },
            children: BTreeSet::new(),
        };
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_PATH.to_string(), root);
        Self {
            nodes,
            zxid: 0,
            data_watches: WatchTable::default(),
            child_watches: WatchTable::default(),
        }
    }

    pub(crate) fn stat(
        &self,
        path: &str,
    ) -> Option<Stat> {
        self.nodes.get(path).map(|n| n.stat)
    }

    pub(crate) fn exists_watch(
        &mut self,
        path: &str,
        session_id: i64,
    ) -> (Option<Stat>, OneshotWatch) {
        let stat = self.stat(path);
        (stat, self.data_watches.add(path, session_id))
    }

    pub(crate) fn get_data(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, Stat)> {
        self.nodes
            .get(path)
            .map(|n| (n.data.clone(), n.stat))
            .ok_or_else(|| no_node(path))
    }

    pub(crate) fn get_data_watch(
        &mut self,
        path: &str,
        session_id: i64,
    ) -> Result<(Vec<u8>, Stat, OneshotWatch)> {
        let (data, stat) = self.get_data(path)?;
        Ok((data, stat, self.data_watches.add(path, session_id)))
    }

    pub(crate) fn get_children(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        self.nodes
            .get(path)
            .map(|n| n.children.iter().cloned().collect())
            .ok_or_else(|| no_node(path))
    }

    pub(crate) fn get_children_watch(
        &mut self,
        path: &str,
        session_id: i64,
    ) -> Result<(Vec<String>, OneshotWatch)> {
        let children = self.get_children(path)?;
        Ok((children, self.child_watches.add(path, session_id)))
    }

    pub(crate) fn create(
        &mut self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
        session_id: i64,
    ) -> Result<String> {
        let parent_path = path::parent(path)
            .ok_or_else(|| Error::NodeExists {
                path: path.to_string(),
            })?
            .to_string();

        let parent = self.nodes.get(&parent_path).ok_or_else(|| no_node(path))?;
        if parent.stat.ephemeral_owner != 0 {
            return Err(Error::NoChildrenForEphemerals {
                path: parent_path,
            });
        }

        let created = if mode.is_sequential() {
            format!(
                "{path}{:0width$}",
                parent.stat.cversion,
                width = SEQUENTIAL_SUFFIX_WIDTH
            )
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&created) {
            return Err(Error::NodeExists { path: created });
        }

        self.zxid += 1;
        let zxid = self.zxid;
        let now = now_millis();
        let stat = Stat {
            czxid: zxid,
            mzxid: zxid,
            pzxid: zxid,
            ctime: now,
            mtime: now,
            ephemeral_owner: if mode.is_ephemeral() { session_id } else { 0 },
            data_length: data.len() as i32,
            ..Stat::default()
        };
        self.nodes.insert(
            created.clone(),
            Node {
                data,
                stat,
                children: BTreeSet::new(),
            },
        );

        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.children.insert(path::node_name(&created).to_string());
            parent.stat.cversion += 1;
            parent.stat.pzxid = zxid;
            parent.stat.num_children = parent.children.len() as i32;
        }

        self.data_watches.trigger(&created, WatchEventType::NodeCreated);
        self.child_watches.trigger(&parent_path, WatchEventType::NodeChildrenChanged);
        Ok(created)
    }

    pub(crate) fn set_data(
        &mut self,
        path: &str,
        data: Vec<u8>,
        version: Option<i32>,
    ) -> Result<Stat> {
        let node = self.nodes.get_mut(path).ok_or_else(|| no_node(path))?;
        check_version(path, version, node.stat.version)?;

        self.zxid += 1;
        node.stat.mzxid = self.zxid;
        node.stat.mtime = now_millis();
        node.stat.version += 1;
        node.stat.data_length = data.len() as i32;
        node.data = data;
        let stat = node.stat;

        self.data_watches.trigger(path, WatchEventType::NodeDataChanged);
        Ok(stat)
    }

    pub(crate) fn delete(
        &mut self,
        path: &str,
        version: Option<i32>,
    ) -> Result<()> {
        let parent_path = path::parent(path)
            .ok_or_else(|| ProgrammerError::InvalidPath {
                path: path.to_string(),
                reason: "root can't be deleted",
            })?
            .to_string();

        let node = self.nodes.get(path).ok_or_else(|| no_node(path))?;
        check_version(path, version, node.stat.version)?;
        if !node.children.is_empty() {
            return Err(Error::NotEmpty {
                path: path.to_string(),
            });
        }

        self.nodes.remove(path);
        self.zxid += 1;
        let zxid = self.zxid;
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.children.remove(path::node_name(path));
            parent.stat.cversion += 1;
            parent.stat.pzxid = zxid;
            parent.stat.num_children = parent.children.len() as i32;
        }

        self.data_watches.trigger(path, WatchEventType::NodeDeleted);
        self.child_watches.trigger(path, WatchEventType::NodeDeleted);
        self.child_watches.trigger(&parent_path, WatchEventType::NodeChildrenChanged);
        Ok(())
    }

    /// Removes everything bound to the session: its ephemerals (firing the
    /// usual delete watches) and its own pending watches.
    pub(crate) fn expire_session(
        &mut self,
        session_id: i64,
    ) {
        self.data_watches.remove_session(session_id);
        self.child_watches.remove_session(session_id);

        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.stat.ephemeral_owner == session_id)
            .map(|(p, _)| p.clone())
            .collect();
        for path in owned {
            // Ephemerals have no children, so the delete cannot fail on NotEmpty.
            let _ = self.delete(&path, None);
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn watch_count(&self) -> usize {
        self.data_watches.count() + self.child_watches.count()
    }
}

fn no_node(path: &str) -> Error {
    Error::NoNode {
        path: path.to_string(),
    }
}

/// `None` and `-1` skip the check
fn check_version(
    path: &str,
    expected: Option<i32>,
    actual: i32,
) -> Result<()> {
    match expected {
        Some(v) if v != -1 && v != actual => Err(Error::BadVersion {
            path: path.to_string(),
            expected: v,
            actual,
        }),
        _ => Ok(()),
    }
}
