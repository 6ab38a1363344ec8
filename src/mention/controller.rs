use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::controller::{api_error, ApiError};
use crate::member::service::MemberDirectory;
use crate::mention::{suggest_mentions, Mention};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct SuggestParams {
    /// Text typed so far
    #[schema(example = "nice shot @ja")]
    pub text: String,

    /// Caret position in characters; defaults to the end of `text`
    #[schema(example = "13")]
    pub caret: Option<usize>,
}

/// Suggest members for the mention being typed
///
/// Looks at the partial name after the last `@` before the caret and returns up to
/// five matching members in directory order.
#[utoipa::path(
    get,
    path = "/api/mentions/suggest",
    tag = "mentions",
    params(SuggestParams),
    responses(
        (status = 200, description = "Matching members", body = [Mention]),
        (status = 500, description = "Member directory unavailable", body = ErrorResponse)
    )
)]
pub async fn suggest(
    Query(params): Query<SuggestParams>,
    Extension(directory): Extension<Arc<dyn MemberDirectory>>,
) -> Result<(StatusCode, Json<Vec<Mention>>), ApiError> {
    let members = directory.members().await.map_err(|e| {
        tracing::error!("Failed to load member directory: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Member directory unavailable",
            "PERSISTENCE_ERROR",
        )
    })?;

    let caret = params
        .caret
        .unwrap_or_else(|| params.text.chars().count());
    let suggestions = suggest_mentions(&params.text, caret, &members)
        .iter()
        .map(Mention::from)
        .collect();

    Ok((StatusCode::OK, Json(suggestions)))
}
