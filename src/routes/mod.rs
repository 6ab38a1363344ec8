//! HTTP surface: one router per area, merged into the application router.

pub mod comments;
pub mod events;
pub mod health;
pub mod mentions;
pub mod notifications;
pub mod sockets;

use axum::http::Method;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;
use crate::auth::permission::PermissionCheck;
use crate::comment::service::{CommentService, ThreadSettings};
use crate::comment::store::CommentStore;
use crate::event::service::{EventNotifier, EventStore};
use crate::member::service::MemberDirectory;
use crate::notification::service::NotificationService;
use crate::store::DocumentStore;
use crate::websocket::SocketState;

/// Everything the handlers need, wired over one document store.
#[derive(Clone)]
pub struct Services {
    pub comments: Arc<CommentService>,
    pub notifications: Arc<NotificationService>,
    pub notifier: Arc<EventNotifier>,
    pub events: EventStore,
    pub members: Arc<dyn MemberDirectory>,
    pub permissions: Arc<dyn PermissionCheck>,
}

impl Services {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        members: Arc<dyn MemberDirectory>,
        permissions: Arc<dyn PermissionCheck>,
        settings: ThreadSettings,
    ) -> Self {
        let notifications = Arc::new(NotificationService::new(store.clone()));
        let events = EventStore::new(store.clone());
        let comments = Arc::new(CommentService::new(
            CommentStore::new(store),
            events.clone(),
            notifications.clone(),
            settings,
        ));
        let notifier = Arc::new(EventNotifier::new(events.clone(), notifications.clone()));

        Self {
            comments,
            notifications,
            notifier,
            events,
            members,
            permissions,
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

/// Build the application router
pub fn app(services: Services) -> Router {
    let sockets = SocketState {
        notifications: services.notifications.clone(),
        comments: services.comments.clone(),
        permissions: services.permissions.clone(),
    };

    Router::new()
        // API documentation
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(health::routes())
        .merge(comments::routes(
            services.comments.clone(),
            services.events.clone(),
            services.members.clone(),
            services.permissions.clone(),
        ))
        .merge(notifications::routes(services.notifications.clone()))
        .merge(events::routes(
            services.notifier.clone(),
            services.permissions.clone(),
        ))
        .merge(mentions::routes(services.members.clone()))
        .merge(sockets::routes(sockets))
        .route("/", get(|| async { "Pickleball notification service" }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
}
