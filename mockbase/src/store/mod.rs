mod resource;

pub use resource::{DefinitionSource, ResourceStore};
pub(crate) use resource::StoreState;

use crate::error::{MockbaseError, Result};
use crate::record::{Record, ID_COLUMN};
use crate::relationship::RelationshipResolver;
use crate::schema::{parse_definition, ResourceDefinition};
use crate::snapshot;
use crate::validation;
use resource::{check_id_matches, ReadScope, WriteScope};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory of every resource store, keyed by plural resource name.
///
/// Built once and read-only afterwards; stores reach their siblings through
/// the registry handed to each [`Resource`] handle.
pub struct Registry {
    root: Option<PathBuf>,
    stores: BTreeMap<String, ResourceStore>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("root", &self.root)
            .field("resources", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Load every definition file (`.json`, `.yaml`, `.yml`) found under
    /// `path`. Each file becomes one resource, snapshotted back to that file.
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(MockbaseError::Schema(format!(
                "definitions directory does not exist: {}",
                root.display()
            )));
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for ext in ["json", "yaml", "yml"] {
            let pattern = format!("{}/**/*.{}", root.display(), ext);
            let matches = glob::glob(&pattern)
                .map_err(|e| MockbaseError::Schema(format!("Glob error: {e}")))?;
            files.extend(matches.filter_map(|r| r.ok()));
        }
        files.sort();

        let mut sources = Vec::with_capacity(files.len());
        for file in files {
            let (definition, format) = parse_definition(&file)?;
            sources.push(DefinitionSource {
                definition,
                path: Some(file),
                format,
            });
        }

        let mut registry = Self::from_sources(sources)?;
        registry.root = Some(root);
        Ok(registry)
    }

    /// Build a purely in-memory registry from parsed definitions.
    pub fn from_definitions(definitions: Vec<ResourceDefinition>) -> Result<Self> {
        Self::from_sources(
            definitions
                .into_iter()
                .map(DefinitionSource::in_memory)
                .collect(),
        )
    }

    pub fn from_sources(sources: Vec<DefinitionSource>) -> Result<Self> {
        let mut stores = BTreeMap::new();
        for source in sources {
            let store = ResourceStore::load(source)?;
            if stores.contains_key(store.name()) {
                return Err(MockbaseError::Schema(format!(
                    "resource '{}' is defined more than once",
                    store.name()
                )));
            }
            stores.insert(store.name().to_string(), store);
        }

        let registry = Registry { root: None, stores };
        registry.check_references()?;

        log::info!(
            "Loaded {} resources: {}",
            registry.stores.len(),
            registry.names().collect::<Vec<_>>().join(", ")
        );
        Ok(registry)
    }

    /// Load-time referential checks, run once every store is registered:
    /// relationship targets must exist and every seed's foreign keys must
    /// resolve.
    fn check_references(&self) -> Result<()> {
        for store in self.stores.values() {
            validation::check_relationship_targets(
                store.name(),
                store.has_one(),
                store.has_many(),
                |name| self.stores.contains_key(name),
            )?;

            let state = store.state.read();
            let lookup = ReadScope {
                own_name: store.name(),
                state: &state,
                registry: self,
            };
            for record in state.records.values() {
                validation::check_relationships(&state.columns, record, &lookup)?;
            }
        }
        Ok(())
    }

    /// The directory the registry was loaded from, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Look up a store by plural resource name.
    pub fn resolve(&self, name: &str) -> Option<&ResourceStore> {
        self.stores.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Resource names in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    pub fn stores(&self) -> impl Iterator<Item = &ResourceStore> {
        self.stores.values()
    }

    /// Get a handle for CRUD on one resource.
    pub fn resource(&self, name: &str) -> Result<Resource<'_>> {
        let store = self
            .stores
            .get(name)
            .ok_or_else(|| MockbaseError::UnknownResource(name.to_string()))?;
        Ok(Resource {
            registry: self,
            store,
        })
    }

    /// Snapshot every dirty store. Every store is attempted; the first
    /// failure is returned after the rest have been tried.
    pub fn save_all(&self) -> Result<usize> {
        self.save_each(snapshot::snapshot)
    }

    /// Like [`Registry::save_all`], but a store whose lock is not free within
    /// `timeout` is skipped instead of waited on. Used where the caller may
    /// already hold a store lock, such as a panic hook.
    pub fn save_all_within(&self, timeout: Duration) -> Result<usize> {
        self.save_each(|store| snapshot::try_snapshot(store, timeout))
    }

    fn save_each(&self, save: impl Fn(&ResourceStore) -> Result<bool>) -> Result<usize> {
        let mut saved = 0;
        let mut first_error = None;
        for store in self.stores.values() {
            match save(store) {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Failed to snapshot resource '{}': {e}", store.name());
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }

    /// Record counts and persistence state per resource.
    pub fn status(&self) -> serde_json::Value {
        let mut resources = serde_json::Map::new();
        for store in self.stores.values() {
            let state = store.state.read();
            resources.insert(
                store.name().to_string(),
                serde_json::json!({
                    "count": state.records.len(),
                    "current_id": state.current_id,
                    "dirty": state.dirty,
                    "last_snapshot_at": state.last_snapshot.map(|t| t.to_rfc3339()),
                    "path": store.path().map(|p| p.display().to_string()),
                }),
            );
        }
        serde_json::json!({
            "root": self.root().map(|p| p.display().to_string()),
            "resources": resources,
        })
    }
}

/// A handle to one resource within a registry.
/// Every operation locks the resource's store for its own duration only.
pub struct Resource<'a> {
    registry: &'a Registry,
    store: &'a ResourceStore,
}

impl<'a> Resource<'a> {
    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn store(&self) -> &'a ResourceStore {
        self.store
    }

    /// Lock this store for writing and every store its foreign keys point to
    /// for reading, in alphabetical resource-name order.
    fn lock_for_write(&self) -> WriteScope<'a> {
        let own_name = self.store.name();
        let mut names: BTreeSet<&'a str> = self
            .store
            .foreign_keys()
            .iter()
            .map(|(_, resource)| resource.as_str())
            .filter(|name| self.registry.contains(name))
            .collect();
        names.insert(own_name);

        let mut own = None;
        let mut siblings = HashMap::new();
        for name in names {
            if name == own_name {
                own = Some(self.store.state.write());
            } else if let Some(store) = self.registry.resolve(name) {
                siblings.insert(name, store.state.read());
            }
        }

        WriteScope {
            own_name,
            state: own.unwrap_or_else(|| self.store.state.write()),
            siblings,
        }
    }

    /// Insert a new record. An id is assigned when the record carries none.
    /// Returns a copy of the stored record.
    pub fn add(&self, mut record: Record) -> Result<Record> {
        let mut scope = self.lock_for_write();

        let id = match record.get(ID_COLUMN) {
            Some(value) => {
                let id = value.as_id().ok_or_else(|| {
                    MockbaseError::Validation(format!(
                        "id must be a non-negative integer, got {}",
                        value.unique_key()
                    ))
                })?;
                if scope.state.records.contains_key(&id) {
                    return Err(MockbaseError::Uniqueness {
                        column: ID_COLUMN.to_string(),
                        value: id.to_string(),
                    });
                }
                id
            }
            None => {
                let id = scope.state.current_id + 1;
                record.set(ID_COLUMN, id);
                id
            }
        };

        validation::validate(&scope.state.columns, &record, None, &scope)?;

        scope.state.insert(id, record.copy());
        scope.state.dirty = true;
        log::debug!("Added {}/{id}", self.name());
        Ok(record)
    }

    /// Replace a record wholesale. The record may omit `id` but may not change it.
    pub fn update(&self, id: u64, mut record: Record) -> Result<Record> {
        let mut scope = self.lock_for_write();
        let previous = self.existing(&scope, id)?;

        check_id_matches(&mut record, id)?;
        validation::validate(&scope.state.columns, &record, Some(&previous), &scope)?;

        scope.state.replace(id, record.copy());
        log::debug!("Updated {}/{id}", self.name());
        Ok(record)
    }

    /// Merge the supplied fields into a record. Only those fields are
    /// validated; an `id` among them is ignored.
    pub fn update_fields(&self, id: u64, mut partial: Record) -> Result<Record> {
        let mut scope = self.lock_for_write();
        let previous = self.existing(&scope, id)?;

        partial.remove(ID_COLUMN);
        validation::validate_fields(&scope.state.columns, &partial, &previous)?;
        validation::check_relationships(&scope.state.columns, &partial, &scope)?;

        let mut merged = previous;
        for (key, value) in partial {
            merged.set(key, value);
        }
        scope.state.replace(id, merged.copy());
        log::debug!("Patched {}/{id}", self.name());
        Ok(merged)
    }

    fn existing(&self, scope: &WriteScope<'_>, id: u64) -> Result<Record> {
        scope
            .state
            .records
            .get(&id)
            .map(Record::copy)
            .ok_or_else(|| MockbaseError::NotFound {
                resource: self.name().to_string(),
                id,
            })
    }

    /// Delete a record and, transitively, every record whose foreign-key
    /// column points at it. Deleting a missing id is a no-op.
    /// Returns whether this record existed.
    ///
    /// Each deletion commits on its own and holds one store lock at a time.
    pub fn delete(&self, id: u64) -> bool {
        let removed = self.store.state.write().remove(id);
        if removed.is_none() {
            return false;
        }
        log::debug!("Deleted {}/{id}", self.name());
        self.cascade(id);
        true
    }

    /// Delete `id` only if its `column` still points at `parent`, then cascade.
    /// A child re-pointed since the cascade scanned it is left alone.
    pub(crate) fn delete_referencing(&self, id: u64, column: &str, parent: u64) -> bool {
        let removed = self
            .store
            .state
            .write()
            .remove_if_referencing(id, column, parent);
        if removed.is_none() {
            return false;
        }
        log::debug!("Deleted {}/{id}", self.name());
        self.cascade(id);
        true
    }

    fn cascade(&self, id: u64) {
        for store in self.registry.stores.values() {
            for column in store.columns_referencing(self.name()) {
                let children = store.ids_referencing(column, id);
                if children.is_empty() {
                    continue;
                }
                log::debug!(
                    "Cascading delete of {}/{id} to {} records in '{}'",
                    self.name(),
                    children.len(),
                    store.name()
                );
                let child = Resource {
                    registry: self.registry,
                    store,
                };
                for child_id in children {
                    child.delete_referencing(child_id, column, id);
                }
            }
        }
    }

    /// A record with its relationships embedded.
    pub fn get(&self, id: u64) -> Result<Record> {
        let record = self.get_unresolved(id).ok_or_else(|| MockbaseError::NotFound {
            resource: self.name().to_string(),
            id,
        })?;
        RelationshipResolver::new(self.registry).resolve(self.store, record)
    }

    /// A copy of the stored record, without relationships.
    pub fn get_unresolved(&self, id: u64) -> Option<Record> {
        self.store.state.read().records.get(&id).map(Record::copy)
    }

    pub fn has(&self, id: u64) -> bool {
        self.store.state.read().records.contains_key(&id)
    }

    /// Every record with its relationships embedded, in insertion order.
    pub fn list(&self) -> Result<Vec<Record>> {
        let records = self.list_unresolved();
        RelationshipResolver::new(self.registry).resolve_all(self.store, records)
    }

    /// Copies of every stored record in insertion order.
    pub fn list_unresolved(&self) -> Vec<Record> {
        self.store.state.read().records_in_order()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Run the full write-time rule set against a candidate record without
    /// storing it. A record carrying the id of an existing record is checked
    /// as a replacement of it.
    pub fn validate(&self, record: &Record) -> Result<()> {
        let scope = self.lock_for_write();
        let previous = record
            .get(ID_COLUMN)
            .and_then(|v| v.as_id())
            .and_then(|id| scope.state.records.get(&id));
        let mut candidate = record.copy();
        if !candidate.contains(ID_COLUMN) {
            candidate.set(ID_COLUMN, scope.state.current_id + 1);
        }
        validation::validate(&scope.state.columns, &candidate, previous, &scope)
    }

    /// Every unique column holds exactly one value per record.
    pub fn check_global_uniqueness(&self) -> Result<()> {
        let state = self.store.state.read();
        let records: Vec<&Record> = state.records.values().collect();
        validation::check_global_uniqueness(self.name(), &state.columns, &records)
    }

    /// Write this resource back to its file if it changed.
    pub fn snapshot(&self) -> Result<bool> {
        snapshot::snapshot(self.store)
    }
}
