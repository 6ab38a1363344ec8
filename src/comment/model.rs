use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::event::model::EventType;
use crate::member::model::MemberId;
use crate::store::StoreError;

pub type CommentId = String;

/// Longest accepted comment body, in characters.
pub const MAX_CONTENT_LENGTH: usize = 5000;

/// Content stored in place of a soft-deleted comment.
pub const DELETED_PLACEHOLDER: &str = "[deleted]";

/// Content shown to non-moderators for a hidden comment.
pub const HIDDEN_PLACEHOLDER: &str = "[hidden by a moderator]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CommentType {
    Comment,
    Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Active,
    Deleted,
    Hidden,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Active => "active",
            CommentStatus::Deleted => "deleted",
            CommentStatus::Hidden => "hidden",
        }
    }

    pub fn can_edit(&self) -> bool {
        matches!(self, CommentStatus::Active)
    }

    pub fn can_hide(&self) -> bool {
        matches!(self, CommentStatus::Active)
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, CommentStatus::Active | CommentStatus::Hidden)
    }
}

/// A comment or reply in an event discussion thread.
///
/// `depth` is 0 exactly for top-level comments and `parent.depth + 1` for replies.
/// `replyCount` counts the non-deleted direct replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[schema(example = "c1")]
    pub id: CommentId,

    #[schema(example = "spring-open")]
    pub event_id: String,

    pub event_type: EventType,

    #[serde(default)]
    pub division_id: Option<String>,

    #[schema(example = "m2")]
    pub author_id: MemberId,

    #[schema(example = "Bob Lee")]
    pub author_name: String,

    #[schema(example = "Great game @Jane Doe!")]
    pub content: String,

    #[serde(default)]
    pub parent_id: Option<CommentId>,

    #[serde(rename = "type")]
    pub comment_type: CommentType,

    pub depth: u32,

    pub status: CommentStatus,

    /// Ids of the members mentioned in `content`.
    #[serde(default)]
    pub mentions: Vec<MemberId>,

    #[serde(default)]
    pub reply_count: u32,

    #[serde(default)]
    pub is_edited: bool,

    /// Epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,

    /// Epoch milliseconds of the last edit.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    #[schema(value_type = Option<i64>)]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Input for posting a comment or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub event_id: String,
    pub event_type: EventType,
    pub division_id: Option<String>,
    pub author_id: MemberId,
    pub author_name: String,
    pub content: String,
    pub parent_id: Option<CommentId>,
}

/// Fields changed by an edit or a moderation action. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<MemberId>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_edited: Option<bool>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub edited_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CommentStatus>,
}

/// A comment with its replies nested beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// Request to post a comment on an event
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    /// Plain text; `@First Last` mentions are resolved against the member directory
    #[schema(example = "Great game @Jane Doe!")]
    pub content: String,

    /// ID of the parent comment if this is a reply
    #[serde(default)]
    #[schema(example = "null")]
    pub parent_id: Option<CommentId>,

    #[serde(default)]
    pub division_id: Option<String>,
}

/// Request to edit a comment's content
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateCommentRequest {
    #[schema(example = "Great game @Jane Doe and @Bob Lee!")]
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct ThreadQueryParams {
    /// Restrict the thread to one division
    pub division_id: Option<String>,
}

/// A comment together with its rendered body
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub comment: Comment,

    /// Escaped content with mentions wrapped in spans
    #[schema(example = r#"Great game <span class="mention" data-member-id="m1">@Jane Doe</span>!"#)]
    pub content_html: String,
}

/// Response for an event thread
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    /// Every comment in the thread, oldest first
    pub comments: Vec<Comment>,

    /// The same comments nested by reply
    pub thread: Vec<CommentNode>,

    #[schema(example = "42")]
    pub total_count: usize,
}

/// Possible comment errors
#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Comment not found: {0}")]
    NotFound(CommentId),

    #[error("Not authorized to perform this action")]
    Forbidden,

    #[error("Persistence error: {0}")]
    PersistenceError(#[from] StoreError),
}

impl CommentError {
    pub(crate) fn from_store(err: StoreError, id: &str) -> Self {
        match err {
            StoreError::NotFound { .. } => CommentError::NotFound(id.to_string()),
            other => CommentError::PersistenceError(other),
        }
    }
}
