use crate::error::{MockbaseError, Result};
use crate::record::Record;
use crate::schema::{ColumnSchema, ColumnType, RecordLookup};
use std::collections::HashSet;

/// Check a resource's column list: at least one column, the first being a
/// numeric `id`, no duplicate names, and every column's own definition valid.
pub fn check_columns_meta(resource: &str, columns: &mut [ColumnSchema]) -> Result<()> {
    match columns.first() {
        Some(first) if first.is_id() && first.column_type == Some(ColumnType::Number) => {}
        _ => {
            return Err(MockbaseError::Schema(format!(
                "resource '{resource}': the first column must be {{name: \"id\", type: \"number\"}}"
            )))
        }
    }

    let mut seen = HashSet::new();
    for column in columns.iter_mut() {
        column.validate_meta().map_err(|e| prefix(resource, e))?;
        if !seen.insert(column.name.clone()) {
            return Err(MockbaseError::Schema(format!(
                "resource '{resource}': column '{}' is declared twice",
                column.name
            )));
        }
    }

    Ok(())
}

/// `has_one` and `has_many` must each be duplicate-free and must not share
/// a resource name.
pub fn check_relationships_meta(resource: &str, has_one: &[String], has_many: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in has_many.iter().chain(has_one) {
        if !seen.insert(name.as_str()) {
            return Err(MockbaseError::Schema(format!(
                "resource '{resource}': relationship '{name}' is declared more than once"
            )));
        }
    }
    Ok(())
}

/// Every declared relationship must name a known resource.
pub fn check_relationship_targets(
    resource: &str,
    has_one: &[String],
    has_many: &[String],
    is_known: impl Fn(&str) -> bool,
) -> Result<()> {
    for (kind, names) in [("has_one", has_one), ("has_many", has_many)] {
        if let Some(missing) = names.iter().find(|name| !is_known(name)) {
            return Err(MockbaseError::Relationship(format!(
                "resource '{resource}' declares {kind} '{missing}', which is not a known resource"
            )));
        }
    }
    Ok(())
}

/// Per-column checks for a complete record: exactly the declared columns,
/// each value passing type, pattern and uniqueness checks.
///
/// `previous` is the stored version of the record when replacing it.
pub fn validate_seed_basic(
    columns: &[ColumnSchema],
    record: &Record,
    previous: Option<&Record>,
) -> Result<()> {
    for column in columns {
        let value = record.get(&column.name).ok_or_else(|| {
            MockbaseError::Validation(format!("missing column '{}'", column.name))
        })?;
        column.validate_value(value, previous.and_then(|p| p.get(&column.name)))?;
    }

    if record.len() != columns.len() {
        if let Some(extra) = record.keys().find(|key| !columns.iter().any(|c| c.name == *key)) {
            return Err(MockbaseError::Validation(format!(
                "undeclared column '{extra}'"
            )));
        }
    }

    Ok(())
}

/// Per-column checks for a partial record. Only the supplied fields are
/// checked; every one of them must be a declared column.
pub fn validate_fields(columns: &[ColumnSchema], partial: &Record, previous: &Record) -> Result<()> {
    for (key, value) in partial.iter() {
        let column = columns
            .iter()
            .find(|c| c.name == key)
            .ok_or_else(|| MockbaseError::Validation(format!("undeclared column '{key}'")))?;
        column.validate_value(value, previous.get(key))?;
    }
    Ok(())
}

/// Foreign-key existence for every `_id`-suffixed column present in the record.
pub fn check_relationships(
    columns: &[ColumnSchema],
    record: &Record,
    lookup: &dyn RecordLookup,
) -> Result<()> {
    for column in columns.iter().filter(|c| !c.is_id()) {
        if let Some(value) = record.get(&column.name) {
            column.check_foreign_key(value, lookup)?;
        }
    }
    Ok(())
}

/// The full rule set applied to every complete record, whether it comes from
/// a seed file or a live write.
pub fn validate(
    columns: &[ColumnSchema],
    record: &Record,
    previous: Option<&Record>,
    lookup: &dyn RecordLookup,
) -> Result<()> {
    validate_seed_basic(columns, record, previous)?;
    check_relationships(columns, record, lookup)
}

/// After a bulk load, every unique column must hold as many distinct values as
/// there are records. Seeds are validated one by one before any of them is
/// indexed, so duplicates among them only show up here.
pub fn check_global_uniqueness(resource: &str, columns: &[ColumnSchema], records: &[&Record]) -> Result<()> {
    for column in columns.iter().filter(|c| c.tracks_uniqueness()) {
        if column.unique_count() == records.len() {
            continue;
        }
        let mut seen = HashSet::new();
        let duplicate = records
            .iter()
            .filter_map(|r| r.get(&column.name))
            .map(|v| v.unique_key())
            .find(|key| !seen.insert(key.clone()))
            .unwrap_or_default();
        return Err(MockbaseError::Uniqueness {
            column: format!("{resource}.{}", column.name),
            value: duplicate,
        });
    }
    Ok(())
}

fn prefix(resource: &str, err: MockbaseError) -> MockbaseError {
    match err {
        MockbaseError::Schema(msg) => MockbaseError::Schema(format!("resource '{resource}': {msg}")),
        other => other,
    }
}
