use std::collections::HashSet;

use crate::database::value::Value;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("Field `{0}` is not part of the record schema")]
    UnknownField(String),

    #[error("Field `{0}` was supplied more than once")]
    DuplicateField(String),
}

/// An ordered mapping from field name to value.
///
/// Field order is insertion order. Setting a field that already exists replaces its
/// value without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Record { fields: Vec::with_capacity(capacity) }
    }

    /// Builder style [`Record::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(field, _)| field == name).map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(field, _)| field == name)?;
        Some(self.fields.remove(position).1)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(field, _)| field.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Maps every value, keeping field names and order.
    pub fn map_values<F>(self, mut f: F) -> Record
    where
        F: FnMut(&str, Value) -> Value,
    {
        let fields = self
            .fields
            .into_iter()
            .map(|(field, value)| {
                let value = f(&field, value);
                (field, value)
            })
            .collect();
        Record { fields }
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.set(name, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Explicit allowlist of field names a record may carry.
///
/// Builds records from loosely typed input and rejects anything outside the list,
/// so a typo in a field name fails at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    fields: Vec<String>,
}

impl RecordSchema {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let fields = fields.into_iter().map(Into::into).filter(|field| seen.insert(field.clone()));
        RecordSchema { fields: fields.collect() }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn allows(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field == name)
    }

    pub fn record<I, K, V>(&self, pairs: I) -> Result<Record, RecordError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Record::with_capacity(self.fields.len());
        for (name, value) in pairs {
            let name = name.into();
            if !self.allows(&name) {
                return Err(RecordError::UnknownField(name));
            }
            if record.contains(&name) {
                return Err(RecordError::DuplicateField(name));
            }
            record.set(name, value);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = Record::new().with("course", 1).with("name", "Course 1");
        record.set("course", 2);

        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["course", "name"]);
        assert_eq!(record.get("course"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_remove() {
        let mut record = Record::new().with("id", 1).with("course", 3);

        assert_eq!(record.remove("id"), Some(Value::Int(1)));
        assert_eq!(record.remove("id"), None);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_map_values_keeps_order() {
        let record = Record::new().with("b", "x").with("a", "y");
        let doubled = record.map_values(|_, value| match value {
            Value::Text(text) => Value::Text(text.repeat(2)),
            other => other,
        });

        let pairs: Vec<(&str, &Value)> = doubled.iter().collect();
        assert_eq!(pairs, vec![("b", &Value::from("xx")), ("a", &Value::from("yy"))]);
    }

    #[test]
    fn test_schema_rejects_unknown_field() {
        let schema = RecordSchema::new(["course", "name"]);

        assert_eq!(
            schema.record([("course", Value::Int(1)), ("nmae", Value::from("typo"))]),
            Err(RecordError::UnknownField("nmae".to_string()))
        );
    }

    #[test]
    fn test_schema_rejects_duplicate_field() {
        let schema = RecordSchema::new(["course"]);

        assert_eq!(
            schema.record([("course", 1), ("course", 2)]),
            Err(RecordError::DuplicateField("course".to_string()))
        );
    }

    #[test]
    fn test_schema_builds_partial_record() {
        let schema = RecordSchema::new(["course", "name", "course"]);
        let record = schema.record([("name", "Course 1")]).unwrap();

        assert_eq!(schema.fields().len(), 2);
        assert_eq!(record.get("name"), Some(&Value::from("Course 1")));
        assert!(!record.contains("course"));
    }
}
