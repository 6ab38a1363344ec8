use axum::{extract::Extension, routing::get, Router};
use std::sync::Arc;

use crate::member::service::MemberDirectory;
use crate::mention::controller::suggest;

/// Create a router for mention autocomplete
pub fn routes(members: Arc<dyn MemberDirectory>) -> Router {
    Router::new()
        .route("/api/mentions/suggest", get(suggest))
        .layer(Extension(members))
}
