//! Model persistence
//!
//! Every write runs in one transaction. For node models the `nodes` row is
//! written in the same transaction as the model row, so the two never
//! diverge: a failure anywhere rolls both back.

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use crate::db::finish;
use crate::model::Model;
use crate::query::{NodeQueries, QueryBuilder, Statement, PAGE_SIZE};
use crate::schema::{ModelKind, ModelSchema, CATALOG};
use crate::{Error, Result};

/// Node row plus its model data and direct children
#[derive(Debug, Clone, Serialize)]
pub struct NodeTree {
    pub node: Value,
    pub data: Option<Value>,
    pub children: Vec<Value>,
}

/// Total rows in the model's table
pub async fn count(pool: &PgPool, schema: &ModelSchema) -> Result<i64> {
    let row = QueryBuilder::new(schema)
        .count()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::Internal(format!("count of {} returned no row", schema.name)))?;
    Ok(row.get("total").and_then(Value::as_i64).unwrap_or(0))
}

/// One page of rows starting at `offset`
pub async fn get_all(pool: &PgPool, schema: &ModelSchema, offset: i64) -> Result<Vec<Value>> {
    QueryBuilder::new(schema).get_all(offset).fetch_all(pool).await
}

/// One row by id
pub async fn select(pool: &PgPool, schema: &ModelSchema, id: i64) -> Result<Value> {
    QueryBuilder::new(schema)
        .select(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", schema.name, id)))
}

/// Rows owned by one node; root and reference models have no owner column
pub async fn select_by_owner(
    pool: &PgPool,
    schema: &ModelSchema,
    owner_id: i64,
) -> Result<Vec<Value>> {
    if !schema.is_owned() {
        return Err(Error::InvalidOwner(format!("{} cannot have an owner", schema.name)));
    }
    QueryBuilder::new(schema).select_by_owner(owner_id).fetch_all(pool).await
}

/// Insert a row
///
/// `owner_id` from the path takes precedence over one in `data`. Node
/// models get their `nodes` row first and reuse its id.
pub async fn create(
    pool: &PgPool,
    schema: &ModelSchema,
    owner_id: Option<i64>,
    data: &Value,
) -> Result<Value> {
    let mut model = Model::new(schema);
    model.set_data(data)?;
    // Ids come from the database
    model.set_value("id", &Value::Null)?;
    if let Some(owner_id) = owner_id {
        if !schema.is_owned() {
            return Err(Error::InvalidOwner(format!("{} cannot have an owner", schema.name)));
        }
        model.set_value("owner_id", &Value::from(owner_id))?;
    }

    let mut tx = pool.begin().await?;
    let result = create_in(&mut tx, &mut model).await;
    let row = finish(tx, result).await?;

    let created_id = row.get("id").cloned().unwrap_or_default();
    info!("Created {} {}", schema.name, created_id);
    Ok(row)
}

async fn create_in(conn: &mut PgConnection, model: &mut Model<'_>) -> Result<Value> {
    let schema = model.schema();
    let owner = resolve_owner(conn, schema, model.owner_id()).await?;
    if let Some((_, owner_type)) = &owner {
        set_owner_type(model, owner_type)?;
    }
    model.validate_required()?;

    if schema.is_node() {
        let node = NodeQueries::insert_node(
            &schema.name,
            owner.as_ref().map(|(id, ty)| (*id, ty.as_str())),
        )
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::Internal("node insert returned no row".to_string()))?;
        let node_id = node.get("id").cloned().unwrap_or(Value::Null);
        debug!("Inserted node {} for {}", node_id, schema.name);
        model.set_value("id", &node_id)?;
    }

    QueryBuilder::new(schema)
        .insert(model)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::Internal(format!("insert into {} returned no row", schema.name)))
}

/// Check the owner node against the model's permitted owner types
///
/// Returns the owner id and its node type, or `None` for root models.
async fn resolve_owner(
    conn: &mut PgConnection,
    schema: &ModelSchema,
    owner_id: Option<i64>,
) -> Result<Option<(i64, String)>> {
    let owner_id = match (schema.is_owned(), owner_id) {
        (false, None) => return Ok(None),
        (false, Some(_)) => {
            return Err(Error::InvalidOwner(format!("{} cannot have an owner", schema.name)));
        }
        (true, None) => {
            return Err(Error::InvalidOwner(format!("{} requires an owner", schema.name)));
        }
        (true, Some(id)) => id,
    };

    let node = NodeQueries::select_node(owner_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::InvalidOwner(format!("owner node {} does not exist", owner_id)))?;
    let owner_type = node
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if !schema.accepts_owner(&owner_type) {
        return Err(Error::InvalidOwner(format!(
            "{} cannot be owned by {}",
            schema.name, owner_type
        )));
    }
    Ok(Some((owner_id, owner_type)))
}

/// File rows record the owner's node type alongside its id
fn set_owner_type(model: &mut Model<'_>, owner_type: &str) -> Result<()> {
    if model.schema().kind == ModelKind::File {
        model.set_value("owner_type", &Value::from(owner_type))?;
    }
    Ok(())
}

/// Update a row; fields absent from `data` keep their stored values
pub async fn update(pool: &PgPool, schema: &ModelSchema, id: i64, data: &Value) -> Result<Value> {
    let mut tx = pool.begin().await?;
    let result = update_in(&mut tx, schema, id, data).await;
    let row = finish(tx, result).await?;

    info!("Updated {} {}", schema.name, id);
    Ok(row)
}

async fn update_in(
    conn: &mut PgConnection,
    schema: &ModelSchema,
    id: i64,
    data: &Value,
) -> Result<Value> {
    let existing = QueryBuilder::new(schema)
        .select(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", schema.name, id)))?;

    let mut model = Model::from_data(schema, &existing)?;
    let previous_owner = model.owner_id();
    model.set_data(data)?;
    model.set_value("id", &Value::from(id))?;

    if let Some((owner_id, owner_type)) = resolve_owner(conn, schema, model.owner_id()).await? {
        set_owner_type(&mut model, &owner_type)?;
        if schema.is_node() && Some(owner_id) != previous_owner {
            NodeQueries::update_node(id, Some((owner_id, owner_type.as_str())))
                .fetch_optional(&mut *conn)
                .await?;
        }
    }
    model.validate_required()?;

    QueryBuilder::new(schema)
        .update(&model)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", schema.name, id)))
}

/// Delete a row (and its node); a missing id is [`Error::NotFound`]
pub async fn remove(pool: &PgPool, schema: &ModelSchema, id: i64) -> Result<Value> {
    let mut tx = pool.begin().await?;
    let result = remove_in(&mut tx, schema, id).await;
    let row = finish(tx, result).await?;

    info!("Removed {} {}", schema.name, id);
    Ok(row)
}

async fn remove_in(conn: &mut PgConnection, schema: &ModelSchema, id: i64) -> Result<Value> {
    let row = QueryBuilder::new(schema)
        .remove(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} {}", schema.name, id)))?;

    if schema.is_node() {
        NodeQueries::remove_node(id).fetch_optional(&mut *conn).await?;
    }
    Ok(row)
}

/// Node, its model row and its direct children
pub async fn show_node(pool: &PgPool, id: i64) -> Result<NodeTree> {
    let node = NodeQueries::select_node(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("node {}", id)))?;

    let data = match node.get("type").and_then(Value::as_str).and_then(|t| CATALOG.get(t)) {
        Some(schema) => QueryBuilder::new(schema).select(id).fetch_optional(pool).await?,
        None => None,
    };
    let children = NodeQueries::node_children(id).fetch_all(pool).await?;

    Ok(NodeTree { node, data, children })
}

/// File records from the `files` view, optionally for one owner
pub async fn list_files(pool: &PgPool, owner_id: Option<i64>) -> Result<Vec<Value>> {
    let stmt = match owner_id {
        Some(owner_id) => Statement::new(
            "SELECT * FROM files WHERE owner_id = $1::integer ORDER BY file_type, id",
            vec![Value::from(owner_id)],
        ),
        None => Statement::new(
            format!("SELECT * FROM files ORDER BY id LIMIT {}", PAGE_SIZE),
            vec![],
        ),
    };
    stmt.fetch_all(pool).await
}

/// File record by id (ids are unique across file models)
pub async fn get_file(pool: &PgPool, id: i64) -> Result<Value> {
    Statement::new("SELECT * FROM files WHERE id = $1::integer", vec![Value::from(id)])
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("file {}", id)))
}

/// File record registered under `fs_path`
pub async fn file_by_path(pool: &PgPool, fs_path: &str) -> Result<Option<Value>> {
    Statement::new("SELECT * FROM files WHERE fs_path = $1::text", vec![Value::from(fs_path)])
        .fetch_optional(pool)
        .await
}

/// Option lists for form selects
pub async fn options(pool: &PgPool) -> Result<Value> {
    let lookup = |table: &str| {
        Statement::new(format!("SELECT name AS value, label FROM {} ORDER BY name", table), vec![])
    };
    let image_states = lookup("image_states").fetch_all(pool).await?;
    let node_types = lookup("node_types").fetch_all(pool).await?;
    let file_types = lookup("file_types").fetch_all(pool).await?;

    let cameras = Statement::new(
        "SELECT id, make, model, format FROM cameras ORDER BY make, model",
        vec![],
    )
    .fetch_all(pool)
    .await?;
    let lens = Statement::new(
        "SELECT id, brand, focal_length FROM lens ORDER BY brand, focal_length",
        vec![],
    )
    .fetch_all(pool)
    .await?;
    let participants = Statement::new(
        "SELECT id, given_names, last_name FROM participants ORDER BY last_name, given_names",
        vec![],
    )
    .fetch_all(pool)
    .await?;

    Ok(json!({
        "image_states": image_states,
        "node_types": node_types,
        "file_types": file_types,
        "cameras": cameras,
        "lens": lens,
        "participants": participants,
    }))
}
