use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::comment::model::{
    Comment, CommentError, CommentPatch, CommentStatus, CommentType, NewComment,
    DELETED_PLACEHOLDER, MAX_CONTENT_LENGTH,
};
use crate::comment::store::{CommentQuery, CommentStore};
use crate::event::model::{EventRef, EventType};
use crate::event::service::EventStore;
use crate::member::model::Member;
use crate::mention::mention_ids;
use crate::notification::factory::{mention_notifications, reply_notifications, MentionOptions};
use crate::notification::model::Notification;
use crate::notification::service::NotificationService;
use crate::store::{now_millis, TypedSubscription};

/// Deepest reply level accepted by default. Top-level comments are depth 0.
pub const DEFAULT_MAX_REPLY_DEPTH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSettings {
    pub max_reply_depth: u32,
    pub mention_options: MentionOptions,
}

impl Default for ThreadSettings {
    fn default() -> Self {
        Self {
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
            mention_options: MentionOptions::default(),
        }
    }
}

/// A saved comment plus its notification fan-out, which runs in the background.
/// The handle resolves to the notifications that were actually persisted.
#[derive(Debug)]
pub struct PostedComment {
    pub comment: Comment,
    pub fan_out: JoinHandle<Vec<Notification>>,
}

/// Orchestrates comment posting, editing and moderation.
#[derive(Clone)]
pub struct CommentService {
    comments: CommentStore,
    events: EventStore,
    notifications: Arc<NotificationService>,
    settings: ThreadSettings,
}

fn validate_content(content: &str) -> Result<(), CommentError> {
    if content.trim().is_empty() {
        return Err(CommentError::ValidationError(
            "Comment content cannot be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(CommentError::ValidationError(format!(
            "Comment content exceeds {} characters",
            MAX_CONTENT_LENGTH
        )));
    }
    Ok(())
}

impl CommentService {
    pub fn new(
        comments: CommentStore,
        events: EventStore,
        notifications: Arc<NotificationService>,
        settings: ThreadSettings,
    ) -> Self {
        Self {
            comments,
            events,
            notifications,
            settings,
        }
    }

    /// Posts a comment or reply.
    ///
    /// Only validation and the comment write itself can fail the call. Reply and
    /// mention notifications are fanned out on a background task, and counter
    /// maintenance errors are logged and swallowed.
    pub async fn post_comment(
        &self,
        input: NewComment,
        members: &[Member],
        event: Option<EventRef>,
    ) -> Result<PostedComment, CommentError> {
        validate_content(&input.content)?;
        if input.event_id.trim().is_empty() {
            return Err(CommentError::ValidationError(
                "Event is required".to_string(),
            ));
        }
        if input.author_id.trim().is_empty() {
            return Err(CommentError::ValidationError(
                "Author is required".to_string(),
            ));
        }

        // A missing parent does not block the reply; it is stored at depth 0.
        let parent = match &input.parent_id {
            Some(parent_id) => {
                let parent = self.comments.get(parent_id).await?;
                if parent.is_none() {
                    warn!(
                        "Parent comment {} not found, posting reply at depth 0",
                        parent_id
                    );
                }
                parent
            }
            None => None,
        };
        if let Some(parent) = &parent {
            if parent.event_id != input.event_id
                || parent.event_type != input.event_type
                || parent.division_id != input.division_id
            {
                return Err(CommentError::ValidationError(
                    "Parent comment belongs to another thread".to_string(),
                ));
            }
        }

        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        if depth > self.settings.max_reply_depth {
            return Err(CommentError::ValidationError(format!(
                "Replies are limited to {} levels",
                self.settings.max_reply_depth
            )));
        }

        let mentions = mention_ids(&input.content, members);

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            event_id: input.event_id,
            event_type: input.event_type,
            division_id: input.division_id,
            author_id: input.author_id,
            author_name: input.author_name,
            content: input.content,
            comment_type: if input.parent_id.is_some() {
                CommentType::Reply
            } else {
                CommentType::Comment
            },
            parent_id: input.parent_id,
            depth,
            status: CommentStatus::Active,
            mentions,
            reply_count: 0,
            is_edited: false,
            created_at: now_millis(),
            edited_at: None,
        };

        let target = format!("{} {}", comment.event_type.as_str(), comment.event_id);
        let comment = self.comments.create(comment).await.map_err(|e| {
            error!("Failed to save comment on {}: {}", target, e);
            CommentError::PersistenceError(e)
        })?;

        info!(
            "Created comment {} on {} {} at depth {}",
            comment.id,
            comment.event_type.as_str(),
            comment.event_id,
            comment.depth
        );

        let fan_out = self.spawn_fan_out(comment.clone(), parent.clone(), members.to_vec(), event);

        if let Err(e) = self
            .events
            .adjust_comment_count(comment.event_type, &comment.event_id, 1)
            .await
        {
            warn!(
                "Failed to increment comment count for {} {}: {}",
                comment.event_type.as_str(),
                comment.event_id,
                e
            );
        }

        if let Some(parent) = &parent {
            if let Err(e) = self.comments.adjust_reply_count(&parent.id, 1).await {
                warn!("Failed to increment reply count of {}: {}", parent.id, e);
            }
        }

        Ok(PostedComment { comment, fan_out })
    }

    fn spawn_fan_out(
        &self,
        comment: Comment,
        parent: Option<Comment>,
        members: Vec<Member>,
        event: Option<EventRef>,
    ) -> JoinHandle<Vec<Notification>> {
        let events = self.events.clone();
        let notifications = self.notifications.clone();
        let options = self.settings.mention_options;

        tokio::spawn(async move {
            let event = match event {
                Some(event) => event,
                None => {
                    events
                        .get_or_unnamed(comment.event_type, &comment.event_id)
                        .await
                }
            };

            let mut drafts = Vec::new();
            if let Some(parent) = &parent {
                drafts.extend(reply_notifications(&comment, parent, &event));
            }
            drafts.extend(mention_notifications(&comment, &event, &members, &options));

            if drafts.is_empty() {
                return Vec::new();
            }
            notifications.create_best_effort(drafts).await
        })
    }

    pub async fn get_comment(&self, id: &str) -> Result<Comment, CommentError> {
        self.comments
            .get(id)
            .await?
            .ok_or_else(|| CommentError::NotFound(id.to_string()))
    }

    /// Replaces the content and its mention set. Never sends notifications.
    pub async fn edit_comment(
        &self,
        id: &str,
        content: &str,
        members: &[Member],
    ) -> Result<Comment, CommentError> {
        validate_content(content)?;

        let mut comment = self.get_comment(id).await?;
        if !comment.status.can_edit() {
            return Err(CommentError::ValidationError(format!(
                "Cannot edit a {} comment",
                comment.status.as_str()
            )));
        }

        let edited_at = now_millis();
        let patch = CommentPatch {
            content: Some(content.to_string()),
            mentions: Some(mention_ids(content, members)),
            is_edited: Some(true),
            edited_at: Some(edited_at),
            status: None,
        };
        self.comments
            .update(id, &patch)
            .await
            .map_err(|e| CommentError::from_store(e, id))?;

        comment.content = content.to_string();
        comment.mentions = patch.mentions.unwrap_or_default();
        comment.is_edited = true;
        comment.edited_at = Some(edited_at);

        info!("Edited comment {}", id);
        Ok(comment)
    }

    /// Soft delete. Replies keep pointing at the placeholder.
    pub async fn delete_comment(&self, id: &str) -> Result<Comment, CommentError> {
        let mut comment = self.get_comment(id).await?;
        if !comment.status.can_delete() {
            return Err(CommentError::ValidationError(format!(
                "Cannot delete a {} comment",
                comment.status.as_str()
            )));
        }

        let patch = CommentPatch {
            content: Some(DELETED_PLACEHOLDER.to_string()),
            mentions: Some(Vec::new()),
            status: Some(CommentStatus::Deleted),
            ..CommentPatch::default()
        };
        self.comments
            .update(id, &patch)
            .await
            .map_err(|e| CommentError::from_store(e, id))?;

        comment.content = DELETED_PLACEHOLDER.to_string();
        comment.mentions.clear();
        comment.status = CommentStatus::Deleted;

        if let Err(e) = self
            .events
            .adjust_comment_count(comment.event_type, &comment.event_id, -1)
            .await
        {
            warn!(
                "Failed to decrement comment count for {} {}: {}",
                comment.event_type.as_str(),
                comment.event_id,
                e
            );
        }

        if let Some(parent_id) = &comment.parent_id {
            if let Err(e) = self.comments.adjust_reply_count(parent_id, -1).await {
                warn!("Failed to decrement reply count of {}: {}", parent_id, e);
            }
        }

        info!("Deleted comment {}", id);
        Ok(comment)
    }

    /// Moderation. Counts are left alone.
    pub async fn hide_comment(&self, id: &str) -> Result<Comment, CommentError> {
        let mut comment = self.get_comment(id).await?;
        if !comment.status.can_hide() {
            return Err(CommentError::ValidationError(format!(
                "Cannot hide a {} comment",
                comment.status.as_str()
            )));
        }

        let patch = CommentPatch {
            status: Some(CommentStatus::Hidden),
            ..CommentPatch::default()
        };
        self.comments
            .update(id, &patch)
            .await
            .map_err(|e| CommentError::from_store(e, id))?;

        comment.status = CommentStatus::Hidden;
        info!("Hid comment {}", id);
        Ok(comment)
    }

    /// Every comment on the event regardless of status, oldest first.
    pub async fn list_thread(
        &self,
        event_type: EventType,
        event_id: &str,
        division_id: Option<&str>,
    ) -> Result<Vec<Comment>, CommentError> {
        Ok(self
            .comments
            .list(CommentQuery::thread(event_type, event_id, division_id))
            .await?)
    }

    pub async fn subscribe_thread(
        &self,
        event_type: EventType,
        event_id: &str,
        division_id: Option<&str>,
    ) -> Result<TypedSubscription<Comment>, CommentError> {
        Ok(self
            .comments
            .subscribe(CommentQuery::thread(event_type, event_id, division_id))
            .await?)
    }
}
