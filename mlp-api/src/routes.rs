//! Route generation for catalog models
//!
//! For a model `m`:
//!
//! | Method | Path                      | View   |
//! |--------|---------------------------|--------|
//! | GET    | `/api/m?page=`            | list   |
//! | GET    | `/api/m?owner_id=`        | list   |
//! | GET    | `/api/m/show/:id`         | show   |
//! | POST   | `/api/m/new`              | create |
//! | POST   | `/api/m/new/:owner_id`    | create |
//! | POST   | `/api/m/edit/:id`         | edit   |
//! | POST   | `/api/m/remove/:id`       | remove |

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Router,
};
use mlp_common::schema::{Catalog, ModelSchema};

use crate::api::auth::Principal;
use crate::api::models::{self, PageQuery};
use crate::AppState;

/// Routes for every model in `catalog`
pub fn model_routes(catalog: &'static Catalog) -> Router<AppState> {
    catalog
        .models()
        .iter()
        .fold(Router::new(), |router, schema| router.merge(routes_for(schema)))
}

/// Routes for one model; each handler closes over its schema
pub fn routes_for(schema: &'static ModelSchema) -> Router<AppState> {
    let base = format!("/api/{}", schema.name);

    Router::new()
        .route(
            &base,
            get(
                move |State(state): State<AppState>,
                      Extension(principal): Extension<Principal>,
                      Query(query): Query<PageQuery>| {
                    models::list(state, principal, schema, query)
                },
            ),
        )
        .route(
            &format!("{}/show/:id", base),
            get(
                move |State(state): State<AppState>,
                      Extension(principal): Extension<Principal>,
                      Path(id): Path<String>| {
                    models::show(state, principal, schema, id)
                },
            ),
        )
        .route(
            &format!("{}/new", base),
            post(
                move |State(state): State<AppState>,
                      Extension(principal): Extension<Principal>,
                      body: Bytes| {
                    models::create(state, principal, schema, None, body)
                },
            ),
        )
        .route(
            &format!("{}/new/:owner_id", base),
            post(
                move |State(state): State<AppState>,
                      Extension(principal): Extension<Principal>,
                      Path(owner_id): Path<String>,
                      body: Bytes| {
                    models::create(state, principal, schema, Some(owner_id), body)
                },
            ),
        )
        .route(
            &format!("{}/edit/:id", base),
            post(
                move |State(state): State<AppState>,
                      Extension(principal): Extension<Principal>,
                      Path(id): Path<String>,
                      body: Bytes| {
                    models::edit(state, principal, schema, id, body)
                },
            ),
        )
        .route(
            &format!("{}/remove/:id", base),
            post(
                move |State(state): State<AppState>,
                      Extension(principal): Extension<Principal>,
                      Path(id): Path<String>| {
                    models::remove(state, principal, schema, id)
                },
            ),
        )
}
