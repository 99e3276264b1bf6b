use crate::error::{MockbaseError, Result};
use crate::inflection::resource_for_foreign_key;
use crate::record::{Value, ID_COLUMN};
use regex::Regex;
use super::types::{ColumnSchema, ColumnType};

/// Answers whether a record exists, as seen by the write in progress.
pub trait RecordLookup {
    /// `None` when the resource itself is unknown.
    fn has_record(&self, resource: &str, id: u64) -> Option<bool>;
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSchema {
            name: name.into(),
            column_type: Some(column_type),
            unique: false,
            regexp_pattern: None,
            compiled_pattern: None,
            unique_values: Default::default(),
        }
    }

    pub fn with_unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.regexp_pattern = Some(pattern.into());
        self.compiled_pattern = None;
        self
    }

    pub fn is_id(&self) -> bool {
        self.name == ID_COLUMN
    }

    /// Whether this column maintains a live set of in-use values. The id
    /// column is unique by construction and never tracks one.
    pub fn tracks_uniqueness(&self) -> bool {
        self.unique && !self.is_id()
    }

    /// Check the column's own definition: name and type present, type
    /// supported, pattern compiles. Caches the compiled pattern.
    pub fn validate_meta(&mut self) -> Result<()> {
        if self.name.is_empty() {
            return Err(MockbaseError::Schema(format!(
                "column {self:?} must have a name"
            )));
        }

        match &self.column_type {
            None => {
                return Err(MockbaseError::Schema(format!(
                    "column '{}' must have a type",
                    self.name
                )))
            }
            Some(ColumnType::Unsupported(name)) if name.is_empty() => {
                return Err(MockbaseError::Schema(format!(
                    "column '{}' must have a type",
                    self.name
                )))
            }
            Some(ColumnType::Unsupported(name)) => {
                return Err(MockbaseError::Schema(format!(
                    "column '{}' uses unsupported type '{name}', supported types: {}",
                    self.name,
                    ColumnType::SUPPORTED.join(", ")
                )))
            }
            Some(_) => {}
        }

        if let Some(pattern) = &self.regexp_pattern {
            let regex = Regex::new(pattern).map_err(|e| {
                MockbaseError::Schema(format!(
                    "column '{}' has an invalid regexp pattern '{pattern}': {e}",
                    self.name
                ))
            })?;
            self.compiled_pattern = Some(regex);
        }

        Ok(())
    }

    /// Check a value against this column: exact type, pattern for strings,
    /// and uniqueness when the column is unique.
    ///
    /// `previous` is the value the record being written currently holds, if
    /// any; a record never collides with itself. Nothing is mutated; callers
    /// commit uniqueness with [`add_unique`](Self::add_unique).
    pub fn validate_value(&self, value: &Value, previous: Option<&Value>) -> Result<()> {
        let expected = match &self.column_type {
            Some(ColumnType::Boolean) => matches!(value, Value::Bool(_)),
            Some(ColumnType::Number) => matches!(value, Value::Number(_)),
            Some(ColumnType::String) => matches!(value, Value::String(_)),
            Some(ColumnType::Array) => matches!(value, Value::Array(_)),
            Some(ColumnType::Object) => matches!(value, Value::Object(_)),
            Some(ColumnType::Unsupported(_)) | None => false,
        };
        if !expected {
            return Err(MockbaseError::Type {
                column: self.name.clone(),
                expected: self.type_label(),
                actual: value.type_name(),
            });
        }

        if let (Some(ColumnType::String), Value::String(s)) = (&self.column_type, value) {
            if let Some(regex) = &self.compiled_pattern {
                if !regex.is_match(s) {
                    return Err(MockbaseError::Format {
                        column: self.name.clone(),
                        value: value.unique_key(),
                        pattern: regex.as_str().to_string(),
                    });
                }
            }
        }

        if self.tracks_uniqueness() {
            let key = value.unique_key();
            let unchanged = previous.map(Value::unique_key).as_deref() == Some(key.as_str());
            if !unchanged && self.unique_values.contains(&key) {
                return Err(MockbaseError::Uniqueness {
                    column: self.name.clone(),
                    value: key,
                });
            }
        }

        Ok(())
    }

    /// For `<singular>_id` columns, check that the referenced record exists in
    /// the pluralized resource. Other columns always pass.
    pub fn check_foreign_key(&self, value: &Value, lookup: &dyn RecordLookup) -> Result<()> {
        let Some(resource) = resource_for_foreign_key(&self.name) else {
            return Ok(());
        };

        let found = value
            .as_id()
            .and_then(|id| lookup.has_record(&resource, id))
            .unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(MockbaseError::Reference {
                column: self.name.clone(),
                resource,
                id: value.unique_key(),
            })
        }
    }

    pub fn add_unique(&mut self, value: &Value) {
        if self.tracks_uniqueness() {
            self.unique_values.insert(value.unique_key());
        }
    }

    pub fn remove_unique(&mut self, value: &Value) {
        if self.tracks_uniqueness() {
            self.unique_values.remove(&value.unique_key());
        }
    }

    /// Number of distinct values currently in use.
    pub fn unique_count(&self) -> usize {
        self.unique_values.len()
    }

    fn type_label(&self) -> &'static str {
        match &self.column_type {
            Some(ColumnType::Boolean) => "boolean",
            Some(ColumnType::Number) => "number",
            Some(ColumnType::String) => "string",
            Some(ColumnType::Array) => "array",
            Some(ColumnType::Object) => "object",
            Some(ColumnType::Unsupported(_)) | None => "a supported type",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Ids(HashMap<&'static str, Vec<u64>>);

    impl RecordLookup for Ids {
        fn has_record(&self, resource: &str, id: u64) -> Option<bool> {
            self.0.get(resource).map(|ids| ids.contains(&id))
        }
    }

    fn name_column() -> ColumnSchema {
        let mut column = ColumnSchema::new("name", ColumnType::String)
            .with_unique()
            .with_pattern("^[A-Z]");
        column.validate_meta().unwrap();
        column
    }

    #[test]
    fn test_meta_requires_name_and_type() {
        let mut nameless = ColumnSchema::new("", ColumnType::String);
        assert!(matches!(nameless.validate_meta(), Err(MockbaseError::Schema(_))));

        let mut typeless = ColumnSchema::new("age", ColumnType::Number);
        typeless.column_type = None;
        assert!(matches!(typeless.validate_meta(), Err(MockbaseError::Schema(_))));
    }

    #[test]
    fn test_meta_rejects_unsupported_type() {
        let mut column = ColumnSchema::new("born", ColumnType::Unsupported("date".into()));
        let err = column.validate_meta().unwrap_err();
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn test_meta_rejects_bad_pattern() {
        let mut column = ColumnSchema::new("name", ColumnType::String).with_pattern("(");
        assert!(matches!(column.validate_meta(), Err(MockbaseError::Schema(_))));
    }

    #[test]
    fn test_type_mismatch_has_no_coercion() {
        let column = ColumnSchema::new("age", ColumnType::Number);
        let err = column.validate_value(&Value::from("22"), None).unwrap_err();
        assert!(matches!(
            err,
            MockbaseError::Type { expected: "number", actual: "string", .. }
        ));
    }

    #[test]
    fn test_pattern_mismatch() {
        let column = name_column();
        assert!(column.validate_value(&Value::from("Frank"), None).is_ok());
        assert!(matches!(
            column.validate_value(&Value::from("frank"), None),
            Err(MockbaseError::Format { .. })
        ));
    }

    #[test]
    fn test_uniqueness() {
        let mut column = name_column();
        let frank = Value::from("Frank");
        column.add_unique(&frank);
        column.add_unique(&frank);
        assert_eq!(column.unique_count(), 1);

        assert!(matches!(
            column.validate_value(&frank, None),
            Err(MockbaseError::Uniqueness { .. })
        ));
        // A record keeping its own value does not collide with itself
        assert!(column.validate_value(&frank, Some(&frank)).is_ok());

        column.remove_unique(&frank);
        assert!(column.validate_value(&frank, None).is_ok());
    }

    #[test]
    fn test_non_unique_column_ignores_set() {
        let mut column = ColumnSchema::new("age", ColumnType::Number);
        column.add_unique(&Value::from(22));
        assert_eq!(column.unique_count(), 0);
    }

    #[test]
    fn test_id_column_does_not_track_uniqueness() {
        let mut column = ColumnSchema::new("id", ColumnType::Number).with_unique();
        column.add_unique(&Value::from(1));
        assert!(column.validate_value(&Value::from(1), None).is_ok());
        assert_eq!(column.unique_count(), 0);
    }

    #[test]
    fn test_foreign_key() {
        let lookup = Ids(HashMap::from([("users", vec![1, 2])]));
        let column = ColumnSchema::new("user_id", ColumnType::Number);
        assert!(column.check_foreign_key(&Value::from(2), &lookup).is_ok());
        assert!(matches!(
            column.check_foreign_key(&Value::from(3), &lookup),
            Err(MockbaseError::Reference { ref resource, .. }) if resource == "users"
        ));

        let unknown = ColumnSchema::new("shelf_id", ColumnType::Number);
        assert!(unknown.check_foreign_key(&Value::from(1), &lookup).is_err());

        let plain = ColumnSchema::new("age", ColumnType::Number);
        assert!(plain.check_foreign_key(&Value::from(99), &lookup).is_ok());
    }
}
