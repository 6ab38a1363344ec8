//! Grouping, filtering and counting notifications for display.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::notification::model::{
    Notification, NotificationFilter, NotificationPriority, NotificationSummary, ReadStatus,
};

/// Display buckets, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateBucket {
    Today,
    Yesterday,
    ThisWeek,
    Earlier,
}

impl DateBucket {
    pub fn label(&self) -> &'static str {
        match self {
            DateBucket::Today => "Today",
            DateBucket::Yesterday => "Yesterday",
            DateBucket::ThisWeek => "This Week",
            DateBucket::Earlier => "Earlier",
        }
    }

    /// Bucket for a calendar-day distance from today. Future dates count as today.
    fn for_days_ago(days: i64) -> Self {
        match days {
            i64::MIN..=0 => DateBucket::Today,
            1 => DateBucket::Yesterday,
            2..=6 => DateBucket::ThisWeek,
            _ => DateBucket::Earlier,
        }
    }
}

/// One non-empty bucket of grouped notifications.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NotificationGroup {
    #[schema(example = "Today")]
    pub label: String,
    pub notifications: Vec<Notification>,
}

/// Groups by calendar day in UTC relative to now.
pub fn group_by_date(notifications: &[Notification]) -> BTreeMap<DateBucket, Vec<Notification>> {
    group_by_date_at(notifications, Utc::now(), &Utc)
}

/// Groups by calendar day in `tz`, relative to `now`. Days are compared after truncation,
/// so a notification from 25 hours ago lands in "Yesterday" or "This Week" depending on
/// the clock, never in "Today". Buckets are sorted newest first; empty buckets are
/// omitted.
pub fn group_by_date_at<Tz: TimeZone>(
    notifications: &[Notification],
    now: DateTime<Utc>,
    tz: &Tz,
) -> BTreeMap<DateBucket, Vec<Notification>> {
    let today = now.with_timezone(tz).date_naive();

    let mut groups: BTreeMap<DateBucket, Vec<Notification>> = BTreeMap::new();
    for notification in notifications {
        let day = notification.created_at.with_timezone(tz).date_naive();
        let bucket = DateBucket::for_days_ago((today - day).num_days());
        groups.entry(bucket).or_default().push(notification.clone());
    }

    for group in groups.values_mut() {
        group.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    groups
}

/// Flattens grouped notifications into labelled groups in bucket order.
pub fn labelled_groups(groups: BTreeMap<DateBucket, Vec<Notification>>) -> Vec<NotificationGroup> {
    groups
        .into_iter()
        .map(|(bucket, notifications)| NotificationGroup {
            label: bucket.label().to_string(),
            notifications,
        })
        .collect()
}

fn matches_filter(notification: &Notification, filter: &NotificationFilter) -> bool {
    let read_ok = match filter.read_status {
        Some(ReadStatus::Unread) => !notification.is_read,
        Some(ReadStatus::Read) => notification.is_read,
        None => true,
    };

    let type_ok =
        filter.types.is_empty() || filter.types.contains(&notification.notification_type);

    let event_ok = filter
        .event_id
        .as_deref()
        .map_or(true, |event_id| notification.event_id() == Some(event_id));

    let date_ok = filter
        .date_range
        .as_ref()
        .map_or(true, |range| range.contains(&notification.created_at));

    let priority_ok = filter
        .priority
        .map_or(true, |priority| notification.priority == priority);

    read_ok && type_ok && event_ok && date_ok && priority_ok
}

/// Applies every present criterion. Input order is preserved.
pub fn filter_notifications(
    notifications: &[Notification],
    filter: &NotificationFilter,
) -> Vec<Notification> {
    notifications
        .iter()
        .filter(|notification| matches_filter(notification, filter))
        .cloned()
        .collect()
}

pub fn summarize(notifications: &[Notification]) -> NotificationSummary {
    let mut by_type = BTreeMap::new();
    for notification in notifications {
        *by_type.entry(notification.notification_type).or_insert(0) += 1;
    }

    NotificationSummary {
        total: notifications.len(),
        unread: notifications.iter().filter(|n| !n.is_read).count(),
        by_type,
        most_recent: notifications
            .iter()
            .max_by_key(|notification| notification.created_at)
            .cloned(),
    }
}

/// Unread and at least high priority.
pub fn should_show_badge(notification: &Notification) -> bool {
    !notification.is_read
        && matches!(
            notification.priority,
            NotificationPriority::High | NotificationPriority::Urgent
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::model::{DateRange, NotificationType};
    use chrono::{Duration, FixedOffset};
    use serde_json::{json, Map};

    fn notification(
        id: &str,
        kind: NotificationType,
        is_read: bool,
        created_at: DateTime<Utc>,
    ) -> Notification {
        let mut data = Map::new();
        data.insert("eventId".to_string(), json!("e1"));
        Notification {
            id: id.to_string(),
            recipient_id: "m1".to_string(),
            notification_type: kind,
            title: String::new(),
            message: String::new(),
            preview: String::new(),
            icon: String::new(),
            priority: crate::notification::factory::notification_priority(kind),
            is_read,
            read_at: None,
            data,
            created_at,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_group_by_calendar_day() {
        let now = at(2024, 5, 10, 12);
        let list = vec![
            notification("a", NotificationType::Mention, false, at(2024, 5, 10, 1)),
            notification("b", NotificationType::Mention, false, at(2024, 5, 9, 23)),
            notification("c", NotificationType::Mention, false, at(2024, 5, 5, 9)),
            notification("d", NotificationType::Mention, false, at(2024, 5, 3, 9)),
            notification("e", NotificationType::Mention, false, at(2024, 5, 10, 11)),
        ];

        let groups = group_by_date_at(&list, now, &Utc);
        let ids = |bucket: DateBucket| -> Vec<String> {
            groups[&bucket].iter().map(|n| n.id.clone()).collect()
        };

        assert_eq!(ids(DateBucket::Today), vec!["e", "a"]);
        assert_eq!(ids(DateBucket::Yesterday), vec!["b"]);
        assert_eq!(ids(DateBucket::ThisWeek), vec!["c"]);
        assert_eq!(ids(DateBucket::Earlier), vec!["d"]);
    }

    #[test]
    fn test_twenty_five_hours_ago_is_never_today() {
        let late = at(2024, 5, 10, 23);
        let yesterday = late - Duration::hours(25);
        let groups = group_by_date_at(
            &[notification("a", NotificationType::Mention, false, yesterday)],
            late,
            &Utc,
        );
        assert!(groups.contains_key(&DateBucket::Yesterday));

        let early = at(2024, 5, 10, 0);
        let two_days = early - Duration::hours(25);
        let groups = group_by_date_at(
            &[notification("a", NotificationType::Mention, false, two_days)],
            early,
            &Utc,
        );
        assert!(!groups.contains_key(&DateBucket::Today));
        assert!(!groups.contains_key(&DateBucket::Yesterday));
    }

    #[test]
    fn test_grouping_respects_timezone() {
        let now = at(2024, 5, 10, 3);
        let created = at(2024, 5, 10, 1);
        let pacific = FixedOffset::west_opt(7 * 3600).unwrap();

        let utc_groups = group_by_date_at(
            &[notification("a", NotificationType::Mention, false, created)],
            now,
            &Utc,
        );
        assert!(utc_groups.contains_key(&DateBucket::Today));

        let local_groups = group_by_date_at(
            &[notification("a", NotificationType::Mention, false, created)],
            now,
            &pacific,
        );
        assert!(local_groups.contains_key(&DateBucket::Today));

        let after_midnight_local = at(2024, 5, 10, 8);
        let local_groups = group_by_date_at(
            &[notification("a", NotificationType::Mention, false, created)],
            after_midnight_local,
            &pacific,
        );
        assert!(local_groups.contains_key(&DateBucket::Yesterday));
    }

    #[test]
    fn test_labelled_groups_keep_bucket_order() {
        let now = Utc::now();
        let list = vec![
            notification("old", NotificationType::Mention, false, now - Duration::days(30)),
            notification("new", NotificationType::Mention, false, now),
        ];
        let labels: Vec<_> = labelled_groups(group_by_date(&list))
            .into_iter()
            .map(|g| g.label)
            .collect();
        assert_eq!(labels, vec!["Today", "Earlier"]);
    }

    #[test]
    fn test_filter_unread_mentions_preserves_order() {
        let now = Utc::now();
        let list = vec![
            notification("1", NotificationType::Mention, false, now),
            notification("2", NotificationType::CommentReply, false, now),
            notification("3", NotificationType::Mention, true, now),
            notification("4", NotificationType::Mention, false, now - Duration::hours(1)),
        ];
        let filter = NotificationFilter {
            read_status: Some(ReadStatus::Unread),
            types: vec![NotificationType::Mention],
            ..NotificationFilter::default()
        };

        let ids: Vec<_> = filter_notifications(&list, &filter)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn test_filter_by_event_date_and_priority() {
        let now = Utc::now();
        let mut other_event = notification("2", NotificationType::PaymentReminder, false, now);
        other_event.data.insert("eventId".to_string(), json!("e2"));
        let list = vec![
            notification("1", NotificationType::PaymentReminder, false, now),
            other_event,
            notification("3", NotificationType::ResultPosted, false, now),
            notification(
                "4",
                NotificationType::PaymentReminder,
                false,
                now - Duration::days(3),
            ),
        ];

        let filter = NotificationFilter {
            event_id: Some("e1".to_string()),
            priority: Some(NotificationPriority::High),
            date_range: Some(DateRange {
                from: Some(now - Duration::days(1)),
                to: None,
            }),
            ..NotificationFilter::default()
        };
        let ids: Vec<_> = filter_notifications(&list, &filter)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["1"]);

        assert_eq!(
            filter_notifications(&list, &NotificationFilter::default()).len(),
            4
        );
    }

    #[test]
    fn test_summarize_counts() {
        let now = Utc::now();
        let list = vec![
            notification("1", NotificationType::Mention, false, now - Duration::hours(2)),
            notification("2", NotificationType::Mention, true, now),
            notification("3", NotificationType::EventUpdate, false, now - Duration::hours(1)),
        ];

        let summary = summarize(&list);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.unread, 2);
        assert_eq!(summary.by_type[&NotificationType::Mention], 2);
        assert_eq!(summary.by_type[&NotificationType::EventUpdate], 1);
        assert_eq!(summary.most_recent.map(|n| n.id), Some("2".to_string()));

        let empty = summarize(&[]);
        assert_eq!(empty.total, 0);
        assert!(empty.most_recent.is_none());
    }

    #[test]
    fn test_badge_needs_unread_high_priority() {
        let now = Utc::now();
        assert!(should_show_badge(&notification(
            "1",
            NotificationType::PaymentReminder,
            false,
            now
        )));
        assert!(!should_show_badge(&notification(
            "2",
            NotificationType::PaymentReminder,
            true,
            now
        )));
        assert!(!should_show_badge(&notification(
            "3",
            NotificationType::Mention,
            false,
            now
        )));

        let mut urgent = notification("4", NotificationType::Mention, false, now);
        urgent.priority = NotificationPriority::Urgent;
        assert!(should_show_badge(&urgent));
    }
}
