//! SQL statement builder
//!
//! Builds `{sql, data}` pairs from a declared schema and a [`Model`].
//! Placeholders carry an explicit cast (`$2::double precision`) and every
//! value is bound as nullable text, so one binding path serves all column
//! types. Execution wraps the statement so each result row comes back as a
//! single `jsonb` value.

use serde::Serialize;
use serde_json::Value;
use sqlx::{PgExecutor, Postgres};

use crate::model::Model;
use crate::schema::{ColumnDefinition, ModelSchema};
use crate::{Error, Result};

/// Rows returned by one `get_all` page
pub const PAGE_SIZE: i64 = 100;

/// SQL text with its positional values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub data: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            data,
        }
    }

    /// Statement wrapped so each row is returned as one jsonb column
    fn wrapped_sql(&self) -> String {
        format!("WITH q AS ({}) SELECT to_jsonb(q) AS doc FROM q", self.sql)
    }

    /// Execute and return every row as a JSON object
    pub async fn fetch_all<'e, E>(&self, executor: E) -> Result<Vec<Value>>
    where
        E: PgExecutor<'e>,
    {
        let sql = self.wrapped_sql();
        let mut query = sqlx::query_scalar::<Postgres, Value>(&sql);
        for value in &self.data {
            query = query.bind(bind_text(value));
        }
        query.fetch_all(executor).await.map_err(Error::from_db)
    }

    /// Execute and return the first row, if any
    pub async fn fetch_optional<'e, E>(&self, executor: E) -> Result<Option<Value>>
    where
        E: PgExecutor<'e>,
    {
        let sql = self.wrapped_sql();
        let mut query = sqlx::query_scalar::<Postgres, Value>(&sql);
        for value in &self.data {
            query = query.bind(bind_text(value));
        }
        query.fetch_optional(executor).await.map_err(Error::from_db)
    }
}

/// Text form of a JSON value for a `$n::<type>` placeholder
fn bind_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn placeholder(index: usize, column: &ColumnDefinition) -> String {
    format!("${}::{}", index, column.pg_type.sql())
}

/// Statement builder for one declared model
pub struct QueryBuilder<'s> {
    schema: &'s ModelSchema,
}

impl<'s> QueryBuilder<'s> {
    pub fn new(schema: &'s ModelSchema) -> Self {
        Self { schema }
    }

    fn has_timestamps(&self) -> bool {
        self.schema.has_column("created_at") && self.schema.has_column("updated_at")
    }

    /// One page of rows ordered by id
    pub fn get_all(&self, offset: i64) -> Statement {
        Statement::new(
            format!(
                "SELECT * FROM {} ORDER BY id LIMIT {} OFFSET $1::integer",
                self.schema.name, PAGE_SIZE
            ),
            vec![Value::from(offset)],
        )
    }

    pub fn count(&self) -> Statement {
        Statement::new(format!("SELECT COUNT(*) AS total FROM {}", self.schema.name), vec![])
    }

    /// Row by primary key (node id for node models)
    pub fn select(&self, id: i64) -> Statement {
        Statement::new(
            format!("SELECT * FROM {} WHERE id = $1::integer", self.schema.name),
            vec![Value::from(id)],
        )
    }

    /// Rows attached to one owner node
    pub fn select_by_owner(&self, owner_id: i64) -> Statement {
        Statement::new(
            format!(
                "SELECT * FROM {} WHERE owner_id = $1::integer ORDER BY id",
                self.schema.name
            ),
            vec![Value::from(owner_id)],
        )
    }

    /// INSERT of every writable column; timestamps set to `NOW()`
    pub fn insert(&self, model: &Model<'_>) -> Statement {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut data = Vec::new();

        for column in self.schema.writable_columns() {
            data.push(model.get_value(&column.name).cloned().unwrap_or(Value::Null));
            columns.push(column.name.as_str());
            values.push(placeholder(data.len(), column));
        }
        if self.has_timestamps() {
            columns.extend(["created_at", "updated_at"]);
            values.extend(["NOW()".to_string(), "NOW()".to_string()]);
        }

        Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                self.schema.name,
                columns.join(", "),
                values.join(", ")
            ),
            data,
        )
    }

    /// UPDATE of every writable non-key column by id
    pub fn update(&self, model: &Model<'_>) -> Statement {
        let mut assignments = Vec::new();
        let mut data = vec![model.id().map(Value::from).unwrap_or(Value::Null)];

        for column in self.schema.writable_columns().filter(|c| !c.primary_key) {
            data.push(model.get_value(&column.name).cloned().unwrap_or(Value::Null));
            assignments.push(format!("{} = {}", column.name, placeholder(data.len(), column)));
        }
        if self.schema.has_column("updated_at") {
            assignments.push("updated_at = NOW()".to_string());
        }

        Statement::new(
            format!(
                "UPDATE {} SET {} WHERE id = $1::integer RETURNING *",
                self.schema.name,
                assignments.join(", ")
            ),
            data,
        )
    }

    pub fn remove(&self, id: i64) -> Statement {
        Statement::new(
            format!("DELETE FROM {} WHERE id = $1::integer RETURNING *", self.schema.name),
            vec![Value::from(id)],
        )
    }
}

/// Statements against the `nodes` linkage table
pub struct NodeQueries;

impl NodeQueries {
    pub fn insert_node(node_type: &str, owner: Option<(i64, &str)>) -> Statement {
        let (owner_id, owner_type) = match owner {
            Some((id, ty)) => (Value::from(id), Value::from(ty)),
            None => (Value::Null, Value::Null),
        };
        Statement::new(
            "INSERT INTO nodes (type, owner_id, owner_type, created_at, updated_at) \
             VALUES ($1::varchar, $2::integer, $3::varchar, NOW(), NOW()) RETURNING *",
            vec![Value::from(node_type), owner_id, owner_type],
        )
    }

    pub fn update_node(id: i64, owner: Option<(i64, &str)>) -> Statement {
        let (owner_id, owner_type) = match owner {
            Some((owner_id, ty)) => (Value::from(owner_id), Value::from(ty)),
            None => (Value::Null, Value::Null),
        };
        Statement::new(
            "UPDATE nodes SET owner_id = $2::integer, owner_type = $3::varchar, updated_at = NOW() \
             WHERE id = $1::integer RETURNING *",
            vec![Value::from(id), owner_id, owner_type],
        )
    }

    pub fn remove_node(id: i64) -> Statement {
        Statement::new(
            "DELETE FROM nodes WHERE id = $1::integer RETURNING *",
            vec![Value::from(id)],
        )
    }

    pub fn select_node(id: i64) -> Statement {
        Statement::new("SELECT * FROM nodes WHERE id = $1::integer", vec![Value::from(id)])
    }

    pub fn node_children(id: i64) -> Statement {
        Statement::new(
            "SELECT * FROM nodes WHERE owner_id = $1::integer ORDER BY type, id",
            vec![Value::from(id)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ModelKind, PgType, CATALOG};
    use serde_json::json;

    fn stations() -> ModelSchema {
        ModelSchema::new("stations", "Stations", ModelKind::Node)
            .owned_by(&["survey_seasons", "projects"])
            .column(ColumnDefinition::new("name", PgType::Text).not_null())
            .column(ColumnDefinition::new("lat", PgType::Double))
            .timestamps()
    }

    #[test]
    fn test_get_all_and_select() {
        let schema = stations();
        let qb = QueryBuilder::new(&schema);

        let stmt = qb.get_all(200);
        assert_eq!(
            stmt.sql,
            "SELECT * FROM stations ORDER BY id LIMIT 100 OFFSET $1::integer"
        );
        assert_eq!(stmt.data, vec![json!(200)]);

        let stmt = qb.select(7);
        assert_eq!(stmt.sql, "SELECT * FROM stations WHERE id = $1::integer");
        assert_eq!(stmt.data, vec![json!(7)]);
    }

    #[test]
    fn test_insert_node_model() {
        let schema = stations();
        let mut model = Model::new(&schema);
        model
            .set_data(&json!({"id": 31, "owner_id": 30, "name": "Crowsnest", "lat": "49.6"}))
            .unwrap();

        let stmt = QueryBuilder::new(&schema).insert(&model);
        assert_eq!(
            stmt.sql,
            "INSERT INTO stations (id, owner_id, name, lat, created_at, updated_at) \
             VALUES ($1::integer, $2::integer, $3::text, $4::double precision, NOW(), NOW()) \
             RETURNING *"
        );
        assert_eq!(stmt.data, vec![json!(31), json!(30), json!("Crowsnest"), json!(49.6)]);
    }

    #[test]
    fn test_insert_file_model_skips_generated_id() {
        let schema = CATALOG.get("metadata_files").unwrap();
        let model = Model::new(schema);

        let stmt = QueryBuilder::new(schema).insert(&model);
        assert!(stmt.sql.starts_with("INSERT INTO metadata_files (owner_id, owner_type, "));
        assert!(!stmt.sql.contains("(id,"));
        assert!(stmt.sql.ends_with("NOW(), NOW()) RETURNING *"));
        assert_eq!(stmt.data.len(), schema.writable_columns().count());
    }

    #[test]
    fn test_update() {
        let schema = stations();
        let mut model = Model::new(&schema);
        model.set_data(&json!({"id": 31, "owner_id": 30, "name": "Crowsnest"})).unwrap();

        let stmt = QueryBuilder::new(&schema).update(&model);
        assert_eq!(
            stmt.sql,
            "UPDATE stations SET owner_id = $2::integer, name = $3::text, \
             lat = $4::double precision, updated_at = NOW() WHERE id = $1::integer RETURNING *"
        );
        assert_eq!(stmt.data, vec![json!(31), json!(30), json!("Crowsnest"), Value::Null]);
    }

    #[test]
    fn test_remove_and_count() {
        let schema = stations();
        let qb = QueryBuilder::new(&schema);

        assert_eq!(
            qb.remove(9).sql,
            "DELETE FROM stations WHERE id = $1::integer RETURNING *"
        );
        assert_eq!(qb.count().sql, "SELECT COUNT(*) AS total FROM stations");
        assert!(qb.count().data.is_empty());
    }

    #[test]
    fn test_node_statements() {
        let stmt = NodeQueries::insert_node("surveys", Some((4, "surveyors")));
        assert!(stmt.sql.starts_with("INSERT INTO nodes (type, owner_id, owner_type"));
        assert_eq!(stmt.data, vec![json!("surveys"), json!(4), json!("surveyors")]);

        let root = NodeQueries::insert_node("projects", None);
        assert_eq!(root.data, vec![json!("projects"), Value::Null, Value::Null]);

        assert!(NodeQueries::node_children(4).sql.contains("WHERE owner_id = $1::integer"));
    }

    #[test]
    fn test_bind_text() {
        assert_eq!(bind_text(&Value::Null), None);
        assert_eq!(bind_text(&json!(true)), Some("true".to_string()));
        assert_eq!(bind_text(&json!(49.6)), Some("49.6".to_string()));
        assert_eq!(bind_text(&json!({"a": 1})), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn test_wrapped_sql() {
        let stmt = Statement::new("SELECT 1 AS one", vec![]);
        assert_eq!(
            stmt.wrapped_sql(),
            "WITH q AS (SELECT 1 AS one) SELECT to_jsonb(q) AS doc FROM q"
        );
    }
}
