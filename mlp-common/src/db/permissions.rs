//! Role permissions
//!
//! Rows of `(role, model, view)` where `model` may be `*`. The table is
//! read once at startup; handlers check the in-memory copy before doing
//! any database work.

use crate::auth::Role;
use crate::Result;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{info, warn};

/// Wildcard model name
pub const ANY_MODEL: &str = "*";

/// Operation a request performs on a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    List,
    Show,
    Create,
    Edit,
    Remove,
    Download,
    Register,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::List => "list",
            View::Show => "show",
            View::Create => "create",
            View::Edit => "edit",
            View::Remove => "remove",
            View::Download => "download",
            View::Register => "register",
        }
    }
}

/// In-memory permission table
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    grants: HashSet<(Role, String, String)>,
}

impl Permissions {
    pub fn grant(&mut self, role: Role, model: &str, view: &str) {
        self.grants.insert((role, model.to_string(), view.to_string()));
    }

    /// Seeded grants: each role keeps everything the role below it has
    pub fn defaults() -> Self {
        let mut permissions = Self::default();
        for role in Role::ALL {
            for (model, view) in default_grants(role) {
                permissions.grant(role, model, view);
            }
        }
        permissions
    }

    /// Load from the `permissions` table
    pub async fn load(pool: &PgPool) -> Result<Self> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT role, model, view FROM permissions ORDER BY role, model, view")
                .fetch_all(pool)
                .await?;

        let mut permissions = Self::default();
        for (role, model, view) in rows {
            match Role::from_str(&role) {
                Ok(role) => permissions.grant(role, &model, &view),
                Err(_) => warn!("Ignoring permission for unknown role '{}'", role),
            }
        }

        info!("Loaded {} permission grants", permissions.len());
        Ok(permissions)
    }

    /// True when `role` may perform `view` on `model`
    pub fn allows(&self, role: Role, model: &str, view: View) -> bool {
        let view = view.as_str().to_string();
        self.grants.contains(&(role, model.to_string(), view.clone()))
            || self.grants.contains(&(role, ANY_MODEL.to_string(), view))
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Grants as `(role, model, view)` rows, sorted
    pub fn rows(&self) -> Vec<(String, String, String)> {
        let mut rows: Vec<_> = self
            .grants
            .iter()
            .map(|(role, model, view)| (role.as_str().to_string(), model.clone(), view.clone()))
            .collect();
        rows.sort();
        rows
    }
}

fn default_grants(role: Role) -> Vec<(&'static str, &'static str)> {
    let mut grants = vec![
        (ANY_MODEL, View::List.as_str()),
        (ANY_MODEL, View::Show.as_str()),
        (ANY_MODEL, View::Download.as_str()),
    ];
    if role >= Role::Editor {
        grants.push((ANY_MODEL, View::Create.as_str()));
        grants.push((ANY_MODEL, View::Edit.as_str()));
    }
    if role >= Role::Administrator {
        grants.push((ANY_MODEL, View::Remove.as_str()));
        grants.push(("users", View::Register.as_str()));
    }
    grants
}
