use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Security scheme configuration for OpenAPI
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        // Identity is resolved upstream and forwarded as a header
        components.add_security_scheme(
            "member_id",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Member-Id"))),
        );
    }
}

/// API documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pickleball Notification API",
        version = "0.1.0",
        description = "Comment threads, mentions and notifications for tournaments and leagues"
    ),
    paths(
        crate::routes::health::health_check,
        // Comment endpoints
        crate::comment::controller::get_event_comments,
        crate::comment::controller::create_comment,
        crate::comment::controller::update_comment,
        crate::comment::controller::delete_comment,
        crate::comment::controller::hide_comment,
        // Notification endpoints
        crate::notification::controller::list_notifications,
        crate::notification::controller::grouped_notifications,
        crate::notification::controller::notification_summary,
        crate::notification::controller::mark_notification_read,
        crate::notification::controller::mark_all_notifications_read,
        crate::notification::controller::delete_notification,
        // Event endpoints
        crate::event::controller::trigger_event_notifications,
        // Mention endpoints
        crate::mention::controller::suggest
    ),
    components(
        schemas(
            crate::controller::ErrorResponse,
            crate::routes::health::HealthResponse,
            // Comment schemas
            crate::comment::model::Comment,
            crate::comment::model::CommentType,
            crate::comment::model::CommentStatus,
            crate::comment::model::CommentNode,
            crate::comment::model::CreateCommentRequest,
            crate::comment::model::UpdateCommentRequest,
            crate::comment::model::CommentResponse,
            crate::comment::model::ThreadResponse,
            // Notification schemas
            crate::notification::model::Notification,
            crate::notification::model::NotificationType,
            crate::notification::model::NotificationPriority,
            crate::notification::model::NotificationSummary,
            crate::notification::model::SummaryResponse,
            crate::notification::model::MarkAllReadResponse,
            crate::notification::aggregate::NotificationGroup,
            // Event schemas
            crate::event::model::EventType,
            crate::event::model::EventTriggerRequest,
            crate::event::model::TriggerKind,
            // Mention schemas
            crate::mention::Mention
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "comments", description = "Event comment threads"),
        (name = "notifications", description = "Member notifications"),
        (name = "events", description = "Organizer-triggered event notifications"),
        (name = "mentions", description = "Mention autocomplete")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;
