use crate::error::{MockbaseError, Result};
use crate::record::{Record, Value};
use crate::store::{Registry, ResourceStore};
use std::collections::HashMap;

/// Embeds related records into copies of a store's records, following each
/// resource's `has_one` and `has_many` declarations.
///
/// Resolution is one level deep: embedded records are never resolved
/// themselves. Each sibling store is read-locked once per call, never while
/// another lock is held.
pub struct RelationshipResolver<'a> {
    registry: &'a Registry,
}

/// Sibling records grouped by the foreign-key value pointing back at the
/// owning store, each group ascending by id.
type Grouped = HashMap<u64, Vec<Record>>;

impl<'a> RelationshipResolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        RelationshipResolver { registry }
    }

    pub fn resolve(&self, store: &ResourceStore, record: Record) -> Result<Record> {
        let mut resolved = self.resolve_all(store, vec![record])?;
        resolved.pop().ok_or_else(|| {
            MockbaseError::MalformedRecord(format!("resolution of {} lost a record", store.name()))
        })
    }

    pub fn resolve_all(&self, store: &ResourceStore, records: Vec<Record>) -> Result<Vec<Record>> {
        if store.has_one().is_empty() && store.has_many().is_empty() {
            return Ok(records);
        }

        let has_one = self.gather(store, store.has_one())?;
        let has_many = self.gather(store, store.has_many())?;

        records
            .into_iter()
            .map(|mut record| {
                let id = record.id()?;

                for (sibling, grouped) in &has_one {
                    if let Some(first) = grouped.get(&id).and_then(|siblings| siblings.first()) {
                        record.set(sibling.singular_name(), first.copy());
                    }
                }

                for (sibling, grouped) in &has_many {
                    if let Some(siblings) = grouped.get(&id).filter(|s| !s.is_empty()) {
                        let embedded: Vec<Value> =
                            siblings.iter().map(|s| Value::from(s.copy())).collect();
                        record.set(sibling.name(), embedded);
                    }
                }

                Ok(record)
            })
            .collect()
    }

    /// Group each target's records by the foreign-key columns the target
    /// declares toward `store`. A target without such a column embeds nothing.
    fn gather(
        &self,
        store: &ResourceStore,
        targets: &[String],
    ) -> Result<Vec<(&'a ResourceStore, Grouped)>> {
        let mut gathered = Vec::with_capacity(targets.len());
        for target in targets {
            let sibling = self.registry.resolve(target).ok_or_else(|| {
                MockbaseError::Relationship(format!(
                    "resource '{}' declares a relationship to unknown resource '{target}'",
                    store.name()
                ))
            })?;

            let columns: Vec<&str> = sibling.columns_referencing(store.name()).collect();
            let mut grouped: Grouped = HashMap::new();
            if !columns.is_empty() {
                let siblings = sibling.state.read().records_by_id();
                for record in siblings {
                    let owner = columns
                        .iter()
                        .find_map(|column| record.get(column).and_then(Value::as_id));
                    if let Some(owner) = owner {
                        grouped.entry(owner).or_default().push(record);
                    }
                }
            }
            gathered.push((sibling, grouped));
        }
        Ok(gathered)
    }
}
