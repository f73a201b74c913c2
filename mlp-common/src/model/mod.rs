//! Model constructor
//!
//! A [`Model`] is one row of a catalog table held as an ordered list of
//! attributes (`label`, `type`, `value`). Every value passes through the
//! sanitizer on its way in, so whatever the query builder reads back is
//! already in column shape.

pub mod sanitize;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{ColumnDefinition, ModelSchema, PgType};
use crate::{Error, Result};

pub use sanitize::{sanitize, sanitize_column};

/// One column value with its form metadata
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub pg_type: PgType,
    pub value: Value,
}

/// Row instance of a declared model
#[derive(Debug, Clone)]
pub struct Model<'s> {
    schema: &'s ModelSchema,
    attributes: Vec<Attribute>,
}

impl<'s> Model<'s> {
    /// Empty instance: every attribute is `null`
    pub fn new(schema: &'s ModelSchema) -> Self {
        let attributes = schema
            .columns
            .iter()
            .map(|c| Attribute {
                name: c.name.clone(),
                label: c.label.clone(),
                pg_type: c.pg_type,
                value: Value::Null,
            })
            .collect();
        Self { schema, attributes }
    }

    /// Instance populated from a database row
    ///
    /// Accepts either the row object itself or a `{"rows": [...]}` result,
    /// in which case the first row is used. Keys with no declared column
    /// are skipped (the live table may carry undeclared columns).
    pub fn from_data(schema: &'s ModelSchema, data: &Value) -> Result<Self> {
        let row = match data.get("rows") {
            Some(Value::Array(rows)) => rows
                .first()
                .ok_or_else(|| Error::NotFound(format!("{} row", schema.name)))?,
            _ => data,
        };
        let row = row
            .as_object()
            .ok_or_else(|| Error::InvalidInput(format!("{} row must be an object", schema.name)))?;

        let mut model = Self::new(schema);
        for (key, value) in row {
            if let Some(attr) = model.attributes.iter_mut().find(|a| &a.name == key) {
                if let Some(column) = schema.get_column(key) {
                    attr.value = sanitize_column(value, column);
                }
            }
        }
        Ok(model)
    }

    pub fn schema(&self) -> &'s ModelSchema {
        self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn get_value(&self, field: &str) -> Option<&Value> {
        self.attributes.iter().find(|a| a.name == field).map(|a| &a.value)
    }

    /// `id` as an integer, if set
    pub fn id(&self) -> Option<i64> {
        self.get_value("id").and_then(Value::as_i64)
    }

    pub fn owner_id(&self) -> Option<i64> {
        self.get_value("owner_id").and_then(Value::as_i64)
    }

    /// Set one value, sanitized for its column
    pub fn set_value(&mut self, field: &str, value: &Value) -> Result<()> {
        let column = self.column(field)?;
        let clean = sanitize_column(value, column);
        if let Some(attr) = self.attributes.iter_mut().find(|a| a.name == field) {
            attr.value = clean;
        }
        Ok(())
    }

    /// Overwrite values from a plain object
    ///
    /// Fails on the first key the model does not declare; values set before
    /// that key stay set.
    pub fn set_data(&mut self, data: &Value) -> Result<()> {
        let map = data
            .as_object()
            .ok_or_else(|| Error::InvalidInput("request body must be a JSON object".to_string()))?;
        for (key, value) in map {
            self.set_value(key, value)?;
        }
        Ok(())
    }

    /// Flat `{column: value}` object in column order
    pub fn get_data(&self) -> Value {
        let map: Map<String, Value> = self
            .attributes
            .iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect();
        Value::Object(map)
    }

    /// Reset every value to `null`
    pub fn clear(&mut self) {
        for attr in &mut self.attributes {
            attr.value = Value::Null;
        }
    }

    /// First required column left null
    pub fn validate_required(&self) -> Result<()> {
        for column in self.schema.columns.iter().filter(|c| c.required()) {
            if self.get_value(&column.name).map_or(true, Value::is_null) {
                return Err(Error::InvalidInput(format!("{} is required", column.label)));
            }
        }
        Ok(())
    }

    fn column(&self, field: &str) -> Result<&'s ColumnDefinition> {
        self.schema.get_column(field).ok_or_else(|| Error::UnknownField {
            model: self.schema.name.clone(),
            field: field.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, ModelKind};
    use serde_json::json;

    fn surveyors() -> ModelSchema {
        ModelSchema::new("surveyors", "Surveyors", ModelKind::Node)
            .column(ColumnDefinition::new("given_names", PgType::Text))
            .column(ColumnDefinition::new("last_name", PgType::Text).not_null())
            .column(ColumnDefinition::new("published", PgType::Boolean).default("false"))
            .timestamps()
    }

    #[test]
    fn test_new_model_is_blank() {
        let schema = surveyors();
        let model = Model::new(&schema);

        assert_eq!(model.name(), "surveyors");
        assert_eq!(model.attributes().len(), 6);
        assert!(model.attributes().iter().all(|a| a.value.is_null()));
        assert_eq!(model.attributes()[1].label, "Given Names");
    }

    #[test]
    fn test_set_data_sanitizes() {
        let schema = surveyors();
        let mut model = Model::new(&schema);

        model
            .set_data(&json!({"id": "12", "last_name": "  Wheeler ", "published": "yes"}))
            .unwrap();

        assert_eq!(model.id(), Some(12));
        assert_eq!(model.get_value("last_name"), Some(&json!("Wheeler")));
        assert_eq!(model.get_value("published"), Some(&json!(true)));
    }

    #[test]
    fn test_set_data_unknown_field() {
        let schema = surveyors();
        let mut model = Model::new(&schema);

        let err = model.set_data(&json!({"nickname": "AO"})).unwrap_err();
        match err {
            Error::UnknownField { model, field } => {
                assert_eq!(model, "surveyors");
                assert_eq!(field, "nickname");
            }
            other => panic!("Expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn test_from_data_accepts_rows_shape() {
        let schema = surveyors();
        let rows = json!({"rows": [{"id": 4, "last_name": "Bridgland", "extra": 1}]});

        let model = Model::from_data(&schema, &rows).unwrap();
        assert_eq!(model.id(), Some(4));
        assert_eq!(model.get_value("last_name"), Some(&json!("Bridgland")));

        let direct = Model::from_data(&schema, &json!({"id": 5})).unwrap();
        assert_eq!(direct.id(), Some(5));

        assert!(matches!(
            Model::from_data(&schema, &json!({"rows": []})),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_get_data_and_clear() {
        let schema = surveyors();
        let mut model = Model::new(&schema);
        model.set_value("given_names", &json!("Arthur Oliver")).unwrap();

        let data = model.get_data();
        assert_eq!(data["given_names"], json!("Arthur Oliver"));
        assert!(data["created_at"].is_null());

        model.clear();
        assert!(model.get_data()["given_names"].is_null());
    }

    #[test]
    fn test_validate_required() {
        let schema = surveyors();
        let mut model = Model::new(&schema);

        // id, published and timestamps are supplied elsewhere
        let err = model.validate_required().unwrap_err();
        assert!(err.to_string().contains("Last Name is required"));

        model.set_value("last_name", &json!("Wheeler")).unwrap();
        assert!(model.validate_required().is_ok());
    }
}
