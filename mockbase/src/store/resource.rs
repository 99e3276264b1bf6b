use crate::error::{MockbaseError, Result};
use crate::inflection::{resource_for_foreign_key, singularize};
use crate::record::{Record, ID_COLUMN};
use crate::schema::{ColumnSchema, DefinitionFormat, RecordLookup, ResourceDefinition};
use crate::validation;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A parsed definition plus where it came from.
#[derive(Debug, Clone)]
pub struct DefinitionSource {
    pub definition: ResourceDefinition,
    /// Backing file snapshots are written to. `None` keeps the store purely
    /// in memory.
    pub path: Option<PathBuf>,
    pub format: DefinitionFormat,
}

impl DefinitionSource {
    pub fn in_memory(definition: ResourceDefinition) -> Self {
        DefinitionSource {
            definition,
            path: None,
            format: DefinitionFormat::Json,
        }
    }
}

/// Authoritative state of one resource.
///
/// Everything that changes after load lives in [`StoreState`] behind the
/// store's lock; the rest is fixed at construction.
pub struct ResourceStore {
    name: String,
    singular: String,
    path: Option<PathBuf>,
    format: DefinitionFormat,
    has_one: Vec<String>,
    has_many: Vec<String>,
    /// `(column, resource)` for every foreign-key column.
    foreign_keys: Vec<(String, String)>,
    pub(crate) state: RwLock<StoreState>,
}

pub(crate) struct StoreState {
    pub(crate) columns: Vec<ColumnSchema>,
    pub(crate) records: HashMap<u64, Record>,
    /// Ids in insertion order.
    pub(crate) order: Vec<u64>,
    pub(crate) current_id: u64,
    pub(crate) dirty: bool,
    pub(crate) last_snapshot: Option<DateTime<Utc>>,
}

impl StoreState {
    /// Insert an already-validated record and index its unique values.
    pub(crate) fn insert(&mut self, id: u64, record: Record) {
        for column in &mut self.columns {
            if let Some(value) = record.get(&column.name) {
                column.add_unique(value);
            }
        }
        if self.records.insert(id, record).is_none() {
            self.order.push(id);
        }
        self.current_id = self.current_id.max(id);
    }

    pub(crate) fn replace(&mut self, id: u64, record: Record) {
        if let Some(old) = self.records.get(&id) {
            for column in &mut self.columns {
                if let Some(value) = old.get(&column.name) {
                    column.remove_unique(value);
                }
            }
        }
        self.insert(id, record);
        self.dirty = true;
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<Record> {
        let old = self.records.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        for column in &mut self.columns {
            if let Some(value) = old.get(&column.name) {
                column.remove_unique(value);
            }
        }
        self.dirty = true;
        Some(old)
    }

    /// Remove `id` only while its `column` still points at `parent`.
    pub(crate) fn remove_if_referencing(
        &mut self,
        id: u64,
        column: &str,
        parent: u64,
    ) -> Option<Record> {
        let still_child = self
            .records
            .get(&id)
            .and_then(|r| r.get(column))
            .and_then(|v| v.as_id())
            == Some(parent);
        if still_child {
            self.remove(id)
        } else {
            None
        }
    }

    /// Copies of all records in insertion order.
    pub(crate) fn records_in_order(&self) -> Vec<Record> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(Record::copy)
            .collect()
    }

    /// Copies of all records ascending by id.
    pub(crate) fn records_by_id(&self) -> Vec<Record> {
        let mut ids: Vec<u64> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids.iter()
            .filter_map(|id| self.records.get(id))
            .map(Record::copy)
            .collect()
    }

    /// Ids of records whose `column` holds `id`.
    fn ids_referencing(&self, column: &str, id: u64) -> Vec<u64> {
        self.order
            .iter()
            .copied()
            .filter(|rid| {
                self.records
                    .get(rid)
                    .and_then(|r| r.get(column))
                    .and_then(|v| v.as_id())
                    == Some(id)
            })
            .collect()
    }
}

impl ResourceStore {
    /// Build a store from a definition: relationship and column meta checks,
    /// per-seed validation, then indexing and the global uniqueness check.
    /// Foreign keys are checked later by the registry, once every store exists.
    pub fn load(source: DefinitionSource) -> Result<ResourceStore> {
        let DefinitionSource {
            definition,
            path,
            format,
        } = source;
        let ResourceDefinition {
            resource_name: name,
            mut columns,
            has_one,
            has_many,
            current_id,
            seeds,
        } = definition;

        if name.trim().is_empty() {
            return Err(MockbaseError::Schema(match &path {
                Some(p) => format!("{} has no resource_name", p.display()),
                None => "definition has no resource_name".to_string(),
            }));
        }

        validation::check_relationships_meta(&name, &has_one, &has_many)?;
        validation::check_columns_meta(&name, &mut columns)?;
        for seed in &seeds {
            validation::validate_seed_basic(&columns, seed, None)?;
        }

        let mut state = StoreState {
            columns,
            records: HashMap::with_capacity(seeds.len()),
            order: Vec::with_capacity(seeds.len()),
            current_id,
            dirty: false,
            last_snapshot: None,
        };
        for seed in seeds {
            let id = seed.id()?;
            if state.records.contains_key(&id) {
                return Err(MockbaseError::Schema(format!(
                    "resource '{name}' has more than one seed with id {id}"
                )));
            }
            state.insert(id, seed);
        }

        {
            let records: Vec<&Record> = state.records.values().collect();
            validation::check_global_uniqueness(&name, &state.columns, &records)?;
        }

        let column_names: Vec<String> = state.columns.iter().map(|c| c.name.clone()).collect();
        let foreign_keys = column_names
            .iter()
            .filter_map(|c| resource_for_foreign_key(c).map(|r| (c.clone(), r)))
            .collect();

        log::debug!(
            "Loaded resource '{name}' with {} records (current_id {})",
            state.records.len(),
            state.current_id
        );

        Ok(ResourceStore {
            singular: singularize(&name),
            name,
            path,
            format,
            has_one,
            has_many,
            foreign_keys,
            state: RwLock::new(state),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn singular_name(&self) -> &str {
        &self.singular
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn format(&self) -> DefinitionFormat {
        self.format
    }

    pub fn has_one(&self) -> &[String] {
        &self.has_one
    }

    pub fn has_many(&self) -> &[String] {
        &self.has_many
    }

    pub(crate) fn foreign_keys(&self) -> &[(String, String)] {
        &self.foreign_keys
    }

    /// This store's foreign-key columns that point at `resource`.
    pub(crate) fn columns_referencing<'s>(
        &'s self,
        resource: &'s str,
    ) -> impl Iterator<Item = &'s str> + 's {
        self.foreign_keys
            .iter()
            .filter(move |(_, target)| target == resource)
            .map(|(column, _)| column.as_str())
    }

    /// Copies of the column definitions, including their live uniqueness sets.
    pub fn columns(&self) -> Vec<ColumnSchema> {
        self.state.read().columns.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current_id(&self) -> u64 {
        self.state.read().current_id
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    pub fn last_snapshot(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_snapshot
    }

    /// The canonical on-disk form of the current state: seeds sorted by id.
    pub(crate) fn definition_from(&self, state: &StoreState) -> ResourceDefinition {
        ResourceDefinition {
            resource_name: self.name.clone(),
            columns: state.columns.clone(),
            has_one: self.has_one.clone(),
            has_many: self.has_many.clone(),
            current_id: state.current_id,
            seeds: state.records_by_id(),
        }
    }

    pub fn to_definition(&self) -> ResourceDefinition {
        self.definition_from(&self.state.read())
    }

    pub(crate) fn ids_referencing(&self, column: &str, id: u64) -> Vec<u64> {
        self.state.read().ids_referencing(column, id)
    }
}

/// Record lookup during a write: the store being written through its write
/// guard, everything else through read guards taken alongside it.
pub(crate) struct WriteScope<'a> {
    pub(crate) own_name: &'a str,
    pub(crate) state: parking_lot::RwLockWriteGuard<'a, StoreState>,
    pub(crate) siblings: HashMap<&'a str, parking_lot::RwLockReadGuard<'a, StoreState>>,
}

impl RecordLookup for WriteScope<'_> {
    fn has_record(&self, resource: &str, id: u64) -> Option<bool> {
        if resource == self.own_name {
            return Some(self.state.records.contains_key(&id));
        }
        self.siblings
            .get(resource)
            .map(|state| state.records.contains_key(&id))
    }
}

/// Record lookup for load-time checks, where the store being checked is
/// already read-locked by the caller.
pub(crate) struct ReadScope<'a> {
    pub(crate) own_name: &'a str,
    pub(crate) state: &'a StoreState,
    pub(crate) registry: &'a super::Registry,
}

impl RecordLookup for ReadScope<'_> {
    fn has_record(&self, resource: &str, id: u64) -> Option<bool> {
        if resource == self.own_name {
            return Some(self.state.records.contains_key(&id));
        }
        self.registry
            .resolve(resource)
            .map(|store| store.state.read().records.contains_key(&id))
    }
}

pub(crate) fn check_id_matches(record: &mut Record, id: u64) -> Result<()> {
    match record.get(ID_COLUMN) {
        None => {
            record.set(ID_COLUMN, id);
            Ok(())
        }
        Some(value) if value.as_id() == Some(id) => Ok(()),
        Some(value) => Err(MockbaseError::Validation(format!(
            "id cannot change from {id} to {}",
            value.unique_key()
        ))),
    }
}
