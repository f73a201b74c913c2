//! Database initialization
//!
//! Idempotent: every step is safe to run against an existing database.
//!
//! Order matters:
//! 1. Lookup tables (`node_types`, `file_types`, `image_states`) and their seeds
//! 2. `nodes`, `files_id_seq`, users/sessions/permissions
//! 3. Catalog tables via [`SchemaSync`]
//! 4. The `files` view

use crate::db::permissions::Permissions;
use crate::db::schema_sync::SchemaSync;
use crate::schema::{Catalog, ImageState, ModelKind, ModelSchema};
use crate::Result;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{info, warn};

/// Create support tables, sync the catalog and seed defaults
pub async fn init_database(pool: &PgPool, catalog: &Catalog) -> Result<()> {
    create_lookup_tables(pool).await?;
    seed_image_states(pool).await?;
    sync_type_registry(pool, catalog).await?;

    create_nodes_table(pool).await?;
    create_files_sequence(pool).await?;
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_permissions_table(pool).await?;
    seed_permissions(pool).await?;

    SchemaSync::sync_catalog(pool, catalog).await?;

    sqlx::query(&catalog.files_view_sql()).execute(pool).await?;

    info!("Database initialized");
    Ok(())
}

async fn create_lookup_tables(pool: &PgPool) -> Result<()> {
    for table in ["node_types", "file_types", "image_states"] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                name varchar PRIMARY KEY,
                label text NOT NULL
            )
            "#,
            table
        ))
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_image_states(pool: &PgPool) -> Result<()> {
    for state in ImageState::ALL {
        sqlx::query(
            "INSERT INTO image_states (name, label) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING",
        )
            .bind(state.as_str())
            .bind(state.label())
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Cross-check `node_types`/`file_types` with the catalog
///
/// Declared types missing from the database are registered. Types present
/// only in the database are reported and otherwise left alone.
pub async fn sync_type_registry(pool: &PgPool, catalog: &Catalog) -> Result<()> {
    let node_models: Vec<&ModelSchema> = catalog.of_kind(ModelKind::Node).collect();
    let file_models: Vec<&ModelSchema> = catalog.of_kind(ModelKind::File).collect();

    register_types(pool, "node_types", &node_models).await?;
    register_types(pool, "file_types", &file_models).await?;
    Ok(())
}

async fn register_types(pool: &PgPool, table: &str, declared: &[&ModelSchema]) -> Result<()> {
    let existing: Vec<String> =
        sqlx::query_scalar(&format!("SELECT name FROM {} ORDER BY name", table))
            .fetch_all(pool)
            .await?;
    let existing: HashSet<String> = existing.into_iter().collect();
    let declared_names: HashSet<&str> = declared.iter().map(|m| m.name.as_str()).collect();

    for name in existing.iter().filter(|n| !declared_names.contains(n.as_str())) {
        warn!("{} contains '{}', which has no declared model", table, name);
    }

    for schema in declared.iter().filter(|m| !existing.contains(&m.name)) {
        sqlx::query(&format!(
            "INSERT INTO {} (name, label) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            table
        ))
        .bind(&schema.name)
        .bind(&schema.label)
        .execute(pool)
        .await?;
        info!("Registered {} '{}'", table, schema.name);
    }
    Ok(())
}

async fn create_nodes_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id serial PRIMARY KEY,
            type varchar NOT NULL REFERENCES node_types(name),
            owner_id integer REFERENCES nodes(id),
            owner_type varchar REFERENCES node_types(name),
            created_at timestamp NOT NULL DEFAULT NOW(),
            updated_at timestamp NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS nodes_owner_id_idx ON nodes (owner_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_files_sequence(pool: &PgPool) -> Result<()> {
    sqlx::query("CREATE SEQUENCE IF NOT EXISTS files_id_seq")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_users_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id serial PRIMARY KEY,
            email varchar NOT NULL UNIQUE,
            name text,
            password_hash text NOT NULL,
            role varchar NOT NULL DEFAULT 'registered',
            created_at timestamp NOT NULL DEFAULT NOW(),
            updated_at timestamp NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash varchar PRIMARY KEY,
            user_id integer NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at timestamp NOT NULL DEFAULT NOW(),
            expires_at timestamp NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_permissions_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS permissions (
            id serial PRIMARY KEY,
            role varchar NOT NULL,
            model varchar NOT NULL,
            view varchar NOT NULL,
            UNIQUE (role, model, view)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed default grants only into an empty table so edits survive restarts
async fn seed_permissions(pool: &PgPool) -> Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let rows = Permissions::defaults().rows();
    for (role, model, view) in &rows {
        sqlx::query(
            "INSERT INTO permissions (role, model, view) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role)
        .bind(model)
        .bind(view)
        .execute(pool)
        .await?;
    }

    info!("Seeded {} default permissions", rows.len());
    Ok(())
}
