//! Resource store implementation.
//!
//! One lock guards one ordered table of `path -> Arc<Resource>`. Critical
//! sections cover the table work only; change notifications are published
//! after the lock is released.

use crate::bus::ChangeBus;
use crate::error::StoreError;
use crate::path::{collection_of, is_reserved, standardize, standardize_prefix};
use crate::resource::Resource;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Paths served by the store's owner itself; never writable.
pub const DEFAULT_RESERVED_PATHS: &[&str] = &["/search", "/watch", "/icon", "/complete"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

/// Payload published for every store change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: String,
}

impl Change {
    fn new(kind: ChangeKind, path: &str) -> Self {
        Self {
            kind,
            path: path.to_string(),
        }
    }
}

type Table = BTreeMap<String, Arc<Resource>>;

/// The shared resource registry.
pub struct ResourceStore {
    table: RwLock<Table>,
    reserved: Vec<String>,
    bus: ChangeBus,
    /// Prefixes with a live [`CollectionWriter`].
    writers: Mutex<HashSet<String>>,
}

impl ResourceStore {
    /// Create a store publishing on `bus`, with the default reserved paths.
    pub fn new(bus: ChangeBus) -> Self {
        Self::with_reserved(bus, DEFAULT_RESERVED_PATHS.iter().copied())
    }

    pub fn with_reserved<I, S>(bus: ChangeBus, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let reserved = reserved
            .into_iter()
            .filter_map(|r| standardize(r.as_ref()).ok())
            .collect();
        Self {
            table: RwLock::new(BTreeMap::new()),
            reserved,
            bus,
            writers: Mutex::new(HashSet::new()),
        }
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn reserved_paths(&self) -> &[String] {
        &self.reserved
    }

    // Values are immutable Arcs, so a panicked writer cannot leave a torn entry.
    fn read(&self) -> RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn writable_path(&self, path: &str) -> Result<String, StoreError> {
        let path = standardize(path)?;
        if is_reserved(&path, &self.reserved) {
            return Err(StoreError::ReservedPath(path));
        }
        Ok(path)
    }

    fn writable_prefix(&self, prefix: &str) -> Result<String, StoreError> {
        let prefix = standardize_prefix(prefix)?;
        if is_reserved(prefix.trim_end_matches('/'), &self.reserved) {
            return Err(StoreError::ReservedPath(prefix));
        }
        Ok(prefix)
    }

    fn publish(&self, changes: &[Change]) {
        for change in changes {
            debug!("{:?} {}", change.kind, change.path);
            let payload = match serde_json::to_string(change) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if let Some(collection) = collection_of(&change.path) {
                self.bus.publish(collection, payload.clone());
            }
            self.bus.publish(change.path.clone(), payload);
        }
    }

    /// Insert or replace the resource at `path`.
    pub fn put(&self, path: &str, mut resource: Resource) -> Result<(), StoreError> {
        let path = self.writable_path(path)?;
        resource.relocate(&path);

        let kind = {
            let mut table = self.write();
            if let Some(old) = table.get(&path) {
                check_profile(old, &resource)?;
            }
            match table.insert(path.clone(), Arc::new(resource)) {
                Some(_) => ChangeKind::Updated,
                None => ChangeKind::Added,
            }
        };

        self.publish(&[Change::new(kind, &path)]);
        Ok(())
    }

    /// Replace the value at `path` with `f(old)`. Returns false if absent.
    pub fn update<F>(&self, path: &str, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&Resource) -> Resource,
    {
        let path = self.writable_path(path)?;

        {
            let mut table = self.write();
            let Some(old) = table.get(&path) else {
                return Ok(false);
            };
            let mut new = f(&**old);
            new.relocate(&path);
            check_profile(old, &new)?;
            if **old == new {
                return Ok(true);
            }
            table.insert(path.clone(), Arc::new(new));
        }

        self.publish(&[Change::new(ChangeKind::Updated, &path)]);
        Ok(true)
    }

    pub fn get(&self, path: &str) -> Option<Arc<Resource>> {
        let path = standardize(path).ok()?;
        self.read().get(&path).cloned()
    }

    /// Snapshot of every resource under `prefix`, ordered by path.
    pub fn get_by_prefix(&self, prefix: &str) -> Vec<Arc<Resource>> {
        let Ok(prefix) = standardize_prefix(prefix) else {
            return Vec::new();
        };
        let table = self.read();
        table
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .map(|(_, res)| res.clone())
            .collect()
    }

    /// Sorted paths under `prefix`. A prefix not ending in '/' matches
    /// partial path segments too (`/app` matches `/application/x`).
    pub fn paths(&self, prefix: &str) -> Vec<String> {
        let table = self.read();
        table
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// First resource under `prefix` satisfying `test`.
    pub fn find_first<F>(&self, prefix: &str, test: F) -> Option<Arc<Resource>>
    where
        F: Fn(&Resource) -> bool,
    {
        self.get_by_prefix(prefix).into_iter().find(|r| test(r))
    }

    /// Atomically swap the whole collection under `prefix` for `resources`.
    ///
    /// Readers see either the old or the new collection, never a mix.
    /// Returns the add/update/remove set that was published.
    pub fn replace_with(
        &self,
        prefix: &str,
        resources: Vec<Resource>,
    ) -> Result<Vec<Change>, StoreError> {
        let prefix = self.writable_prefix(prefix)?;

        let mut incoming: BTreeMap<String, Resource> = BTreeMap::new();
        for mut res in resources {
            let path = self.writable_path(&res.path)?;
            if !path.starts_with(&prefix) {
                return Err(StoreError::OutsideCollection { path, prefix });
            }
            res.relocate(&path);
            incoming.insert(path, res);
        }

        let mut changes = Vec::new();
        {
            let mut table = self.write();

            let old_paths: Vec<String> = table
                .range(prefix.clone()..)
                .take_while(|(path, _)| path.starts_with(&prefix))
                .map(|(path, _)| path.clone())
                .collect();

            for (path, new) in &incoming {
                if let Some(old) = table.get(path) {
                    check_profile(old, new)?;
                }
            }

            for path in old_paths {
                if !incoming.contains_key(&path) {
                    table.remove(&path);
                    changes.push(Change::new(ChangeKind::Removed, &path));
                }
            }

            for (path, new) in incoming {
                match table.get(&path) {
                    Some(old) if **old == new => {}
                    Some(_) => {
                        changes.push(Change::new(ChangeKind::Updated, &path));
                        table.insert(path, Arc::new(new));
                    }
                    None => {
                        changes.push(Change::new(ChangeKind::Added, &path));
                        table.insert(path, Arc::new(new));
                    }
                }
            }
        }

        self.publish(&changes);
        Ok(changes)
    }

    /// Remove the resource at `path`. Returns whether it was there.
    pub fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let path = self.writable_path(path)?;
        let found = self.write().remove(&path).is_some();
        if found {
            self.publish(&[Change::new(ChangeKind::Removed, &path)]);
        }
        Ok(found)
    }

    /// Remove every resource under `prefix`. Returns how many were removed.
    pub fn remove_all(&self, prefix: &str) -> Result<usize, StoreError> {
        let prefix = self.writable_prefix(prefix)?;
        let removed: Vec<String> = {
            let mut table = self.write();
            let paths: Vec<String> = table
                .range(prefix.clone()..)
                .take_while(|(path, _)| path.starts_with(&prefix))
                .map(|(path, _)| path.clone())
                .collect();
            for path in &paths {
                table.remove(path);
            }
            paths
        };

        let changes: Vec<Change> = removed
            .iter()
            .map(|p| Change::new(ChangeKind::Removed, p))
            .collect();
        self.publish(&changes);
        Ok(removed.len())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Take exclusive write access to the collection under `prefix`.
    pub fn claim(self: &Arc<Self>, prefix: &str) -> Result<CollectionWriter, StoreError> {
        let prefix = self.writable_prefix(prefix)?;
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        if !writers.insert(prefix.clone()) {
            return Err(StoreError::CollectionClaimed(prefix));
        }
        debug!("Writer claimed {}", prefix);
        Ok(CollectionWriter {
            store: Arc::clone(self),
            prefix,
        })
    }
}

fn check_profile(old: &Resource, new: &Resource) -> Result<(), StoreError> {
    if old.profile != new.profile {
        return Err(StoreError::ProfileChanged {
            path: old.path.clone(),
            from: old.profile.clone(),
            to: new.profile.clone(),
        });
    }
    Ok(())
}

/// The single writer of one collection.
///
/// Each domain worker owns one of these; the store hands out at most one
/// per prefix, released on drop.
pub struct CollectionWriter {
    store: Arc<ResourceStore>,
    prefix: String,
}

impl CollectionWriter {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    fn own(&self, path: &str) -> Result<String, StoreError> {
        let path = standardize(path)?;
        if !path.starts_with(&self.prefix) {
            return Err(StoreError::OutsideCollection {
                path,
                prefix: self.prefix.clone(),
            });
        }
        Ok(path)
    }

    /// Path for an id within this collection, e.g. `12` -> `/window/12`.
    pub fn path_of(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    pub fn put(&self, resource: Resource) -> Result<(), StoreError> {
        let path = self.own(&resource.path)?;
        self.store.put(&path, resource)
    }

    pub fn update<F>(&self, path: &str, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&Resource) -> Resource,
    {
        let path = self.own(path)?;
        self.store.update(&path, f)
    }

    pub fn delete(&self, path: &str) -> Result<bool, StoreError> {
        let path = self.own(path)?;
        self.store.delete(&path)
    }

    pub fn replace_with(&self, resources: Vec<Resource>) -> Result<Vec<Change>, StoreError> {
        self.store.replace_with(&self.prefix, resources)
    }

    pub fn remove_all(&self) -> Result<usize, StoreError> {
        self.store.remove_all(&self.prefix)
    }
}

impl Drop for CollectionWriter {
    fn drop(&mut self) {
        let mut writers = self
            .store
            .writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        writers.remove(&self.prefix);
        debug!("Writer released {}", self.prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Profile, Relation};
    use std::time::Duration;

    fn window(id: u32, title: &str) -> Resource {
        Resource::new(format!("/window/{}", id), title, Profile::Window)
    }

    fn store() -> Arc<ResourceStore> {
        Arc::new(ResourceStore::new(ChangeBus::new()))
    }

    fn paths(list: &[Arc<Resource>]) -> Vec<&str> {
        list.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn test_put_and_get() {
        let store = store();
        store.put("/window/1", window(1, "Firefox")).unwrap();
        assert_eq!(store.get("/window/1").unwrap().title, "Firefox");

        store.put("/window/1", window(1, "Firefox - news")).unwrap();
        assert_eq!(store.get("/window/1").unwrap().title, "Firefox - news");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_standardizes_path() {
        let store = store();
        store.put("//window//7/", window(7, "a")).unwrap();
        let res = store.get("/window/7").unwrap();
        assert_eq!(res.path, "/window/7");
    }

    #[test]
    fn test_standardized_path_carries_links() {
        let store = store();
        let res = Resource::new("//window//7/", "a", Profile::Window)
            .add_link("?action=close", "Close", "", Relation::Action)
            .add_link("/window/8", "Other", "", Relation::Related);
        store.put("//window//7/", res).unwrap();

        let res = store.get("/window/7").unwrap();
        let hrefs: Vec<&str> = res.links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/window/7", "/window/7?action=close", "/window/8"]);

        store
            .replace_with(
                "/window/",
                vec![Resource::new("/window//9", "b", Profile::Window)],
            )
            .unwrap();
        assert_eq!(store.get("/window/9").unwrap().links[0].href, "/window/9");
    }

    #[test]
    fn test_replace_with_never_shows_partial_collection() {
        let store = store();
        let first: Vec<Resource> = (0..20).map(|i| window(i, "first")).collect();
        let second: Vec<Resource> = (100..130).map(|i| window(i, "second")).collect();
        let first_paths: Vec<String> = first.iter().map(|r| r.path.clone()).collect();
        let second_paths: Vec<String> = second.iter().map(|r| r.path.clone()).collect();
        store.replace_with("/window/", first.clone()).unwrap();

        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let reader = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut reads = 0;
                while !done.load(std::sync::atomic::Ordering::Acquire) || reads == 0 {
                    let seen: Vec<String> = store
                        .get_by_prefix("/window/")
                        .iter()
                        .map(|r| r.path.clone())
                        .collect();
                    assert!(
                        seen == first_paths || seen == second_paths,
                        "torn snapshot of {} resources",
                        seen.len()
                    );
                    reads += 1;
                }
            })
        };

        for round in 0..200 {
            let next = if round % 2 == 0 { &second } else { &first };
            store.replace_with("/window/", next.clone()).unwrap();
        }
        done.store(true, std::sync::atomic::Ordering::Release);
        reader.join().unwrap();
    }

    #[test]
    fn test_reserved_path_is_an_error() {
        let store = store();
        let err = store
            .put("/search", Resource::new("/search", "x", Profile::Window))
            .unwrap_err();
        assert!(matches!(err, StoreError::ReservedPath(_)));
        assert!(matches!(
            store.delete("/watch"),
            Err(StoreError::ReservedPath(_))
        ));
        assert!(matches!(
            store.replace_with("/search/", vec![]),
            Err(StoreError::ReservedPath(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_profile_is_stable() {
        let store = store();
        store.put("/window/1", window(1, "a")).unwrap();
        let err = store
            .put("/window/1", Resource::new("/window/1", "a", Profile::Device))
            .unwrap_err();
        assert!(matches!(err, StoreError::ProfileChanged { .. }));
        assert_eq!(store.get("/window/1").unwrap().profile, Profile::Window);
    }

    #[test]
    fn test_get_by_prefix_is_ordered_snapshot() {
        let store = store();
        store.put("/window/2", window(2, "b")).unwrap();
        store.put("/window/1", window(1, "a")).unwrap();
        store
            .put(
                "/windowless/1",
                Resource::new("/windowless/1", "x", Profile::Other("x".into())),
            )
            .unwrap();

        let snapshot = store.get_by_prefix("/window/");
        store.delete("/window/1").unwrap();

        assert_eq!(paths(&snapshot), vec!["/window/1", "/window/2"]);
        assert_eq!(paths(&store.get_by_prefix("/window")), vec!["/window/2"]);
    }

    #[test]
    fn test_replace_with_leaves_exactly_new_paths() {
        let store = store();
        store.put("/window/1", window(1, "a")).unwrap();
        store.put("/window/2", window(2, "b")).unwrap();
        store
            .put(
                "/application/x.desktop",
                Resource::new("/application/x.desktop", "X", Profile::Application),
            )
            .unwrap();

        let changes = store
            .replace_with("/window/", vec![window(2, "b"), window(3, "c")])
            .unwrap();

        assert_eq!(paths(&store.get_by_prefix("/window/")), vec!["/window/2", "/window/3"]);
        assert!(store.get("/window/1").is_none());
        assert!(store.get("/application/x.desktop").is_some());

        assert_eq!(
            changes,
            vec![
                Change::new(ChangeKind::Removed, "/window/1"),
                Change::new(ChangeKind::Added, "/window/3"),
            ]
        );
    }

    #[test]
    fn test_replace_with_reports_updates() {
        let store = store();
        store.put("/window/1", window(1, "a")).unwrap();
        let changes = store
            .replace_with("/window/", vec![window(1, "renamed")])
            .unwrap();
        assert_eq!(changes, vec![Change::new(ChangeKind::Updated, "/window/1")]);
    }

    #[test]
    fn test_replace_with_rejects_foreign_paths() {
        let store = store();
        store.put("/window/1", window(1, "a")).unwrap();
        let err = store
            .replace_with(
                "/window/",
                vec![Resource::new("/device/BAT0", "b", Profile::Device)],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::OutsideCollection { .. }));
        assert!(store.get("/window/1").is_some(), "failed replace must not touch the table");
    }

    #[test]
    fn test_delete_and_remove_all() {
        let store = store();
        store.put("/window/1", window(1, "a")).unwrap();
        store.put("/window/2", window(2, "b")).unwrap();
        assert!(store.delete("/window/1").unwrap());
        assert!(!store.delete("/window/1").unwrap());
        assert_eq!(store.remove_all("/window/").unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_is_pure_function_swap() {
        let store = store();
        store.put("/window/1", window(1, "a")).unwrap();
        let before = store.get("/window/1").unwrap();

        assert!(store.update("/window/1", |old| old.clone().with_title("b")).unwrap());
        assert!(!store.update("/window/9", |old| old.clone()).unwrap());

        assert_eq!(before.title, "a", "published value must not change");
        assert_eq!(store.get("/window/1").unwrap().title, "b");
    }

    #[test]
    fn test_paths_and_find_first() {
        let store = store();
        store.put("/window/1", window(1, "a")).unwrap();
        store.put("/window/2", window(2, "b")).unwrap();
        assert_eq!(store.paths("/win"), vec!["/window/1", "/window/2"]);
        let found = store.find_first("/window/", |r| r.title == "b").unwrap();
        assert_eq!(found.path, "/window/2");
    }

    #[test]
    fn test_single_writer_per_collection() {
        let store = store();
        let writer = store.claim("/window/").unwrap();
        assert!(matches!(
            store.claim("/window"),
            Err(StoreError::CollectionClaimed(_))
        ));

        writer.put(window(1, "a")).unwrap();
        assert!(matches!(
            writer.put(Resource::new("/device/x", "x", Profile::Device)),
            Err(StoreError::OutsideCollection { .. })
        ));
        assert_eq!(writer.path_of("5"), "/window/5");

        drop(writer);
        assert!(store.claim("/window/").is_ok());
    }

    #[test]
    fn test_put_visible_from_other_threads() {
        let store = store();
        let writer_store = Arc::clone(&store);
        std::thread::spawn(move || {
            for i in 0..100 {
                writer_store
                    .put("/window/1", window(1, &i.to_string()))
                    .unwrap();
            }
        })
        .join()
        .unwrap();
        assert_eq!(store.get("/window/1").unwrap().title, "99");
    }

    #[tokio::test]
    async fn test_changes_published_on_path_and_collection() {
        let store = store();
        let mut on_collection = store.bus().subscribe_to(["/window/"]);
        let mut on_path = store.bus().subscribe_to(["/window/1"]);

        store.put("/window/1", window(1, "a")).unwrap();

        let event = on_collection.next().await.unwrap();
        let change: Change = serde_json::from_str(&event.payload).unwrap();
        assert_eq!(change, Change::new(ChangeKind::Added, "/window/1"));

        let event = on_path
            .next_timeout(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(event.topic, "/window/1");
    }
}
