use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::notification::service::NotificationService;

/// Age-based cleanup settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    pub interval: StdDuration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::days(90),
            interval: StdDuration::from_secs(3600),
        }
    }
}

/// Runs one purge pass. Errors are logged and reported as zero deletions.
pub async fn purge_once(service: &NotificationService, policy: &RetentionPolicy) -> usize {
    let cutoff = Utc::now() - policy.max_age;
    match service.purge_older_than(cutoff).await {
        Ok(0) => 0,
        Ok(purged) => {
            info!("Purged {} notifications created before {}", purged, cutoff);
            purged
        }
        Err(e) => {
            error!("Notification retention purge failed: {}", e);
            0
        }
    }
}

/// Purges expired notifications every `policy.interval`, starting immediately.
pub fn spawn_purge_job(
    service: Arc<NotificationService>,
    policy: RetentionPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(policy.interval);
        loop {
            ticker.tick().await;
            purge_once(&service, &policy).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::model::{NotificationDraft, NotificationPriority, NotificationType};
    use crate::store::memory::MemoryStore;
    use serde_json::Map;

    fn draft(age: Duration) -> NotificationDraft {
        NotificationDraft {
            recipient_id: "m1".to_string(),
            notification_type: NotificationType::EventUpdate,
            title: String::new(),
            message: String::new(),
            preview: String::new(),
            icon: String::new(),
            priority: NotificationPriority::Medium,
            data: Map::new(),
            created_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn test_purge_job_removes_expired_notifications() {
        let service = Arc::new(NotificationService::new(Arc::new(MemoryStore::default())));
        service.create_notification(draft(Duration::days(91))).await.unwrap();
        service.create_notification(draft(Duration::days(1))).await.unwrap();

        let policy = RetentionPolicy {
            max_age: Duration::days(90),
            interval: StdDuration::from_millis(10),
        };
        let job = spawn_purge_job(service.clone(), policy);

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        job.abort();

        let remaining = service.list_for_recipient("m1", None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(purge_once(&service, &policy).await, 0);
    }
}
