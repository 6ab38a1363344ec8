use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::middleware::CurrentMember;
use crate::auth::permission::{require_permission, Action, PermissionCheck};
use crate::comment::model::{
    Comment, CommentError, CommentResponse, CreateCommentRequest, NewComment, ThreadQueryParams,
    ThreadResponse, UpdateCommentRequest,
};
use crate::comment::service::CommentService;
use crate::comment::thread::{build_thread, visible_comments};
use crate::controller::{api_error, forbidden, parse_event_type, ApiError};
use crate::event::service::EventStore;
use crate::member::model::{member_name, Member};
use crate::member::service::MemberDirectory;
use crate::mention::render_comment_html;

// Helper function to convert CommentError to HTTP response
fn comment_error_to_response(err: CommentError) -> ApiError {
    match err {
        CommentError::ValidationError(msg) => {
            api_error(StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR")
        }
        CommentError::NotFound(id) => api_error(
            StatusCode::NOT_FOUND,
            format!("Comment not found: {}", id),
            "NOT_FOUND",
        ),
        CommentError::Forbidden => api_error(
            StatusCode::FORBIDDEN,
            "Not authorized to perform this action",
            "FORBIDDEN",
        ),
        CommentError::PersistenceError(e) => {
            error!("Comment persistence error: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Persistence error",
                "PERSISTENCE_ERROR",
            )
        }
    }
}

/// Member directory for mention resolution. A failing directory resolves nothing.
async fn load_members(directory: &dyn MemberDirectory) -> Vec<Member> {
    match directory.members().await {
        Ok(members) => members,
        Err(e) => {
            warn!("Member directory unavailable, skipping mention resolution: {}", e);
            Vec::new()
        }
    }
}

fn render(comment: Comment, members: &[Member]) -> CommentResponse {
    let content_html = render_comment_html(&comment.content, members);
    CommentResponse {
        comment,
        content_html,
    }
}

/// Authors may change their own comments; moderators may change any.
fn ensure_author_or_moderator(
    comment: &Comment,
    member: &CurrentMember,
    permissions: &dyn PermissionCheck,
) -> Result<(), CommentError> {
    if comment.author_id == member.member_id
        || permissions.has_permission(&member.member_id, Action::ModerateComments)
    {
        Ok(())
    } else {
        Err(CommentError::Forbidden)
    }
}

/// Get the discussion thread of an event
///
/// Returns every comment on the event, flat and nested by reply. Hidden comments are
/// masked unless the caller is a moderator.
#[utoipa::path(
    get,
    path = "/api/events/{event_type}/{event_id}/comments",
    tag = "comments",
    params(
        ("event_type" = String, Path, description = "`tournament` or `league`"),
        ("event_id" = String, Path, description = "The ID of the event"),
        ThreadQueryParams
    ),
    responses(
        (status = 200, description = "Thread retrieved successfully", body = ThreadResponse),
        (status = 400, description = "Unknown event type", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_event_comments(
    Path((event_type, event_id)): Path<(String, String)>,
    Query(params): Query<ThreadQueryParams>,
    member: Option<CurrentMember>,
    Extension(comment_service): Extension<Arc<CommentService>>,
    Extension(permissions): Extension<Arc<dyn PermissionCheck>>,
) -> Result<(StatusCode, Json<ThreadResponse>), ApiError> {
    let event_type = parse_event_type(&event_type)?;
    info!("Getting comments for {} {}", event_type.as_str(), event_id);

    let comments = comment_service
        .list_thread(event_type, &event_id, params.division_id.as_deref())
        .await
        .map_err(comment_error_to_response)?;

    let viewer_is_moderator = member.map_or(false, |m| {
        permissions.has_permission(&m.member_id, Action::ModerateComments)
    });
    let response = ThreadResponse {
        total_count: comments.len(),
        thread: build_thread(&comments, viewer_is_moderator),
        comments: visible_comments(&comments, viewer_is_moderator),
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Post a comment or reply on an event
///
/// `@First Last` mentions are resolved against the member directory. Mentioned
/// members and the parent's author are notified in the background.
#[utoipa::path(
    post,
    path = "/api/events/{event_type}/{event_id}/comments",
    tag = "comments",
    params(
        ("event_type" = String, Path, description = "`tournament` or `league`"),
        ("event_id" = String, Path, description = "The ID of the event to comment on")
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created successfully", body = CommentResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Missing member identity", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn create_comment(
    Path((event_type, event_id)): Path<(String, String)>,
    member: CurrentMember,
    Extension(comment_service): Extension<Arc<CommentService>>,
    Extension(events): Extension<EventStore>,
    Extension(directory): Extension<Arc<dyn MemberDirectory>>,
    Json(comment_data): Json<CreateCommentRequest>,
) -> impl IntoResponse {
    let event_type = match parse_event_type(&event_type) {
        Ok(event_type) => event_type,
        Err(rejection) => return rejection.into_response(),
    };
    info!(
        "Creating comment on {} {} by member {}",
        event_type.as_str(),
        event_id,
        member.member_id
    );

    let event = match events.get(event_type, &event_id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            return api_error(
                StatusCode::NOT_FOUND,
                format!("Event not found: {}", event_id),
                "EVENT_NOT_FOUND",
            )
            .into_response()
        }
        Err(e) => {
            return comment_error_to_response(CommentError::PersistenceError(e)).into_response()
        }
    };

    let members = load_members(directory.as_ref()).await;
    let input = NewComment {
        event_id,
        event_type,
        division_id: comment_data.division_id,
        author_name: member_name(&members, &member.member_id),
        author_id: member.member_id,
        content: comment_data.content,
        parent_id: comment_data.parent_id,
    };

    match comment_service
        .post_comment(input, &members, Some(event))
        .await
    {
        Ok(posted) => {
            info!("Successfully created comment with ID: {}", posted.comment.id);
            (StatusCode::CREATED, Json(render(posted.comment, &members))).into_response()
        }
        Err(e) => comment_error_to_response(e).into_response(),
    }
}

/// Edit a comment
///
/// Replaces the content and re-resolves mentions. Edits never send notifications.
#[utoipa::path(
    patch,
    path = "/api/comments/{id}",
    tag = "comments",
    params(
        ("id" = String, Path, description = "The ID of the comment to edit")
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 400, description = "Invalid input or comment not editable", body = ErrorResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn update_comment(
    Path(comment_id): Path<String>,
    member: CurrentMember,
    Extension(comment_service): Extension<Arc<CommentService>>,
    Extension(directory): Extension<Arc<dyn MemberDirectory>>,
    Extension(permissions): Extension<Arc<dyn PermissionCheck>>,
    Json(update): Json<UpdateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    info!("Editing comment {} by member {}", comment_id, member.member_id);

    let existing = comment_service
        .get_comment(&comment_id)
        .await
        .map_err(comment_error_to_response)?;
    ensure_author_or_moderator(&existing, &member, permissions.as_ref())
        .map_err(comment_error_to_response)?;

    let members = load_members(directory.as_ref()).await;
    let comment = comment_service
        .edit_comment(&comment_id, &update.content, &members)
        .await
        .map_err(comment_error_to_response)?;

    Ok((StatusCode::OK, Json(render(comment, &members))))
}

/// Delete a comment
///
/// Soft delete: the content is replaced and replies stay attached.
#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    tag = "comments",
    params(
        ("id" = String, Path, description = "The ID of the comment to delete")
    ),
    responses(
        (status = 204, description = "Comment deleted successfully"),
        (status = 400, description = "Comment already deleted", body = ErrorResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn delete_comment(
    Path(comment_id): Path<String>,
    member: CurrentMember,
    Extension(comment_service): Extension<Arc<CommentService>>,
    Extension(permissions): Extension<Arc<dyn PermissionCheck>>,
) -> impl IntoResponse {
    info!(
        "Deleting comment: {}, requested by member: {}",
        comment_id, member.member_id
    );

    let existing = match comment_service.get_comment(&comment_id).await {
        Ok(comment) => comment,
        Err(e) => return comment_error_to_response(e).into_response(),
    };
    if let Err(e) = ensure_author_or_moderator(&existing, &member, permissions.as_ref()) {
        return comment_error_to_response(e).into_response();
    }

    match comment_service.delete_comment(&comment_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => comment_error_to_response(e).into_response(),
    }
}

/// Hide a comment
///
/// Moderators only. Hidden comments stay in the thread with their content masked.
#[utoipa::path(
    post,
    path = "/api/comments/{id}/hide",
    tag = "comments",
    params(
        ("id" = String, Path, description = "The ID of the comment to hide")
    ),
    responses(
        (status = 200, description = "Comment hidden", body = Comment),
        (status = 400, description = "Comment not active", body = ErrorResponse),
        (status = 403, description = "Not a moderator", body = ErrorResponse),
        (status = 404, description = "Comment not found", body = ErrorResponse)
    ),
    security(
        ("member_id" = [])
    )
)]
pub async fn hide_comment(
    Path(comment_id): Path<String>,
    member: CurrentMember,
    Extension(comment_service): Extension<Arc<CommentService>>,
    Extension(permissions): Extension<Arc<dyn PermissionCheck>>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    require_permission(
        permissions.as_ref(),
        &member.member_id,
        Action::ModerateComments,
    )
    .map_err(forbidden)?;

    let comment = comment_service
        .hide_comment(&comment_id)
        .await
        .map_err(comment_error_to_response)?;

    info!("Comment {} hidden by {}", comment_id, member.member_id);
    Ok((StatusCode::OK, Json(comment)))
}
