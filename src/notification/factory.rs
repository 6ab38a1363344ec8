//! Construction of unsaved notifications from domain events.
//!
//! Every builder here is free of I/O. Persisting the drafts is up to the caller, which
//! must treat it as best-effort.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::comment::model::Comment;
use crate::event::model::{EventRef, EventReminder, EventUpdate, PaymentDue, ResultsPosted};
use crate::member::model::{Member, MemberId};
use crate::mention::parse_mentions;
use crate::notification::model::{NotificationDraft, NotificationPriority, NotificationType};
use crate::store::now_millis;

/// Preview text is cut to this many characters.
pub const PREVIEW_LENGTH: usize = 100;

/// Controls mention fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MentionOptions {
    /// Notify authors who mention themselves.
    pub allow_self_mentions: bool,
}

impl Default for MentionOptions {
    fn default() -> Self {
        Self {
            allow_self_mentions: true,
        }
    }
}

/// Inputs available to the message templates. Unused fields are ignored per type.
#[derive(Debug, Clone, Default)]
pub struct MessageContext<'a> {
    pub actor_name: Option<&'a str>,
    pub event_name: Option<&'a str>,
    pub content: Option<&'a str>,
    pub summary: Option<&'a str>,
    pub amount_cents: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub division_id: Option<&'a str>,
    pub starts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedMessage {
    pub title: String,
    pub message: String,
    pub preview: String,
    pub icon: String,
}

/// Single type-to-priority table.
pub fn notification_priority(kind: NotificationType) -> NotificationPriority {
    match kind {
        NotificationType::Mention
        | NotificationType::CommentReply
        | NotificationType::EventUpdate => NotificationPriority::Medium,
        NotificationType::PaymentReminder | NotificationType::EventReminder => {
            NotificationPriority::High
        }
        NotificationType::ResultPosted => NotificationPriority::Low,
    }
}

/// Cuts `text` to [`PREVIEW_LENGTH`] characters, marking the cut with `...`.
pub fn truncate_preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= PREVIEW_LENGTH {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_LENGTH).collect();
    format!("{}...", cut.trim_end())
}

fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, cents / 100, cents % 100)
}

/// Title, body, preview and icon for a notification of `kind`.
pub fn format_notification_message(
    kind: NotificationType,
    context: &MessageContext<'_>,
) -> FormattedMessage {
    let actor = context.actor_name.unwrap_or("Someone");
    let event = context.event_name.unwrap_or("an event");

    let (title, message, preview, icon) = match kind {
        NotificationType::CommentReply => (
            "New reply to your comment".to_string(),
            format!("{} replied to your comment on {}", actor, event),
            context.content.unwrap_or_default().to_string(),
            "message-circle",
        ),
        NotificationType::Mention => (
            "You were mentioned".to_string(),
            format!("{} mentioned you in a comment on {}", actor, event),
            context.content.unwrap_or_default().to_string(),
            "at-sign",
        ),
        NotificationType::EventUpdate => {
            let summary = context.summary.unwrap_or("Event details have changed");
            (
                format!("{} was updated", event),
                summary.to_string(),
                summary.to_string(),
                "calendar",
            )
        }
        NotificationType::PaymentReminder => {
            let amount = context
                .amount_cents
                .map(format_amount)
                .unwrap_or_else(|| "a payment".to_string());
            let message = match context.due_date {
                Some(due) => format!("You owe {} for {}, due {}", amount, event, due),
                None => format!("You owe {} for {}", amount, event),
            };
            (
                format!("Payment due for {}", event),
                message.clone(),
                message,
                "credit-card",
            )
        }
        NotificationType::ResultPosted => {
            let message = match context.division_id {
                Some(division) => {
                    format!("Results for {} ({}) are now available", event, division)
                }
                None => format!("Results for {} are now available", event),
            };
            (
                format!("Results posted for {}", event),
                message,
                context.summary.unwrap_or_default().to_string(),
                "trophy",
            )
        }
        NotificationType::EventReminder => {
            let message = match context.starts_at {
                Some(starts_at) => format!(
                    "{} starts {}",
                    event,
                    starts_at.format("%a %b %-d at %H:%M UTC")
                ),
                None => format!("{} is starting soon", event),
            };
            (
                format!("{} is coming up", event),
                message.clone(),
                message,
                "bell",
            )
        }
    };

    FormattedMessage {
        title,
        message,
        preview: truncate_preview(&preview),
        icon: icon.to_string(),
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn draft(
    recipient_id: &str,
    kind: NotificationType,
    context: &MessageContext<'_>,
    data: Map<String, Value>,
) -> NotificationDraft {
    let formatted = format_notification_message(kind, context);
    NotificationDraft {
        recipient_id: recipient_id.to_string(),
        notification_type: kind,
        title: formatted.title,
        message: formatted.message,
        preview: formatted.preview,
        icon: formatted.icon,
        priority: notification_priority(kind),
        data,
        created_at: now_millis(),
    }
}

fn comment_data(comment: &Comment) -> Map<String, Value> {
    object(json!({
        "commentId": comment.id,
        "eventId": comment.event_id,
        "eventType": comment.event_type,
        "divisionId": comment.division_id,
        "authorId": comment.author_id,
        "authorName": comment.author_name,
    }))
}

/// Tells the parent's author about a reply. Replying to yourself yields nothing.
pub fn reply_notifications(
    comment: &Comment,
    parent: &Comment,
    event: &EventRef,
) -> Vec<NotificationDraft> {
    if comment.author_id == parent.author_id {
        return Vec::new();
    }

    let mut data = comment_data(comment);
    data.insert("parentCommentId".to_string(), json!(parent.id));

    let context = MessageContext {
        actor_name: Some(&comment.author_name),
        event_name: Some(&event.name),
        content: Some(&comment.content),
        ..MessageContext::default()
    };

    vec![draft(
        &parent.author_id,
        NotificationType::CommentReply,
        &context,
        data,
    )]
}

/// One notification per member mentioned in the comment.
pub fn mention_notifications(
    comment: &Comment,
    event: &EventRef,
    members: &[Member],
    options: &MentionOptions,
) -> Vec<NotificationDraft> {
    let context = MessageContext {
        actor_name: Some(&comment.author_name),
        event_name: Some(&event.name),
        content: Some(&comment.content),
        ..MessageContext::default()
    };

    parse_mentions(&comment.content, members)
        .into_iter()
        .filter_map(|member| {
            let is_self_mention = member.id == comment.author_id;
            if is_self_mention && !options.allow_self_mentions {
                return None;
            }

            let mut data = comment_data(comment);
            data.insert("parentCommentId".to_string(), json!(comment.parent_id));
            data.insert("mentionedMemberId".to_string(), json!(member.id));
            data.insert("mentionedMemberName".to_string(), json!(member.full_name()));
            data.insert("isSelfMention".to_string(), json!(is_self_mention));

            Some(draft(&member.id, NotificationType::Mention, &context, data))
        })
        .collect()
}

fn unique_recipients(recipients: &[MemberId]) -> Vec<&str> {
    let mut seen = HashSet::new();
    recipients
        .iter()
        .map(String::as_str)
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .collect()
}

fn event_data(event: &EventRef) -> Map<String, Value> {
    object(json!({
        "eventId": event.id,
        "eventType": event.event_type,
        "eventName": event.name,
    }))
}

fn fan_out(
    recipients: &[MemberId],
    kind: NotificationType,
    context: &MessageContext<'_>,
    data: Map<String, Value>,
) -> Vec<NotificationDraft> {
    unique_recipients(recipients)
        .into_iter()
        .map(|recipient| draft(recipient, kind, context, data.clone()))
        .collect()
}

pub fn event_update_notifications(
    event: &EventRef,
    update: &EventUpdate,
    recipients: &[MemberId],
) -> Vec<NotificationDraft> {
    let mut data = event_data(event);
    data.insert("summary".to_string(), json!(update.summary));

    let context = MessageContext {
        event_name: Some(&event.name),
        summary: Some(&update.summary),
        ..MessageContext::default()
    };
    fan_out(recipients, NotificationType::EventUpdate, &context, data)
}

pub fn payment_reminder_notifications(
    event: &EventRef,
    payment: &PaymentDue,
    recipients: &[MemberId],
) -> Vec<NotificationDraft> {
    let mut data = event_data(event);
    data.insert("amountCents".to_string(), json!(payment.amount_cents));
    data.insert(
        "dueDate".to_string(),
        json!(payment.due_date.map(|d| d.to_string())),
    );

    let context = MessageContext {
        event_name: Some(&event.name),
        amount_cents: Some(payment.amount_cents),
        due_date: payment.due_date,
        ..MessageContext::default()
    };
    fan_out(recipients, NotificationType::PaymentReminder, &context, data)
}

pub fn result_posted_notifications(
    event: &EventRef,
    results: &ResultsPosted,
    recipients: &[MemberId],
) -> Vec<NotificationDraft> {
    let mut data = event_data(event);
    data.insert("divisionId".to_string(), json!(results.division_id));

    let context = MessageContext {
        event_name: Some(&event.name),
        division_id: results.division_id.as_deref(),
        summary: results.summary.as_deref(),
        ..MessageContext::default()
    };
    fan_out(recipients, NotificationType::ResultPosted, &context, data)
}

pub fn event_reminder_notifications(
    event: &EventRef,
    reminder: &EventReminder,
    recipients: &[MemberId],
) -> Vec<NotificationDraft> {
    let mut data = event_data(event);
    data.insert(
        "startsAt".to_string(),
        json!(reminder.starts_at.timestamp_millis()),
    );

    let context = MessageContext {
        event_name: Some(&event.name),
        starts_at: Some(reminder.starts_at),
        ..MessageContext::default()
    };
    fan_out(recipients, NotificationType::EventReminder, &context, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::model::{CommentStatus, CommentType};
    use crate::event::model::EventType;
    use chrono::TimeZone;

    fn members() -> Vec<Member> {
        vec![Member::new("m1", "Jane", "Doe"), Member::new("m2", "Bob", "Lee")]
    }

    fn event() -> EventRef {
        EventRef::new("e1", EventType::Tournament, "Spring Open")
    }

    fn comment(id: &str, author: &Member, content: &str, parent_id: Option<&str>) -> Comment {
        Comment {
            id: id.to_string(),
            event_id: "e1".to_string(),
            event_type: EventType::Tournament,
            division_id: Some("d1".to_string()),
            author_id: author.id.clone(),
            author_name: author.full_name(),
            content: content.to_string(),
            parent_id: parent_id.map(str::to_string),
            comment_type: if parent_id.is_some() {
                CommentType::Reply
            } else {
                CommentType::Comment
            },
            depth: if parent_id.is_some() { 1 } else { 0 },
            status: CommentStatus::Active,
            mentions: Vec::new(),
            reply_count: 0,
            is_edited: false,
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    #[test]
    fn test_priority_table() {
        use NotificationPriority::*;
        use NotificationType::*;
        assert_eq!(notification_priority(Mention), Medium);
        assert_eq!(notification_priority(CommentReply), Medium);
        assert_eq!(notification_priority(EventUpdate), Medium);
        assert_eq!(notification_priority(PaymentReminder), High);
        assert_eq!(notification_priority(EventReminder), High);
        assert_eq!(notification_priority(ResultPosted), Low);
    }

    #[test]
    fn test_reply_notifies_parent_author_with_cross_references() {
        let [jane, bob] = [members()[0].clone(), members()[1].clone()];
        let parent = comment("c1", &jane, "first", None);
        let reply = comment("c2", &bob, "nice", Some("c1"));

        let drafts = reply_notifications(&reply, &parent, &event());
        assert_eq!(drafts.len(), 1);

        let draft = &drafts[0];
        assert_eq!(draft.recipient_id, "m1");
        assert_eq!(draft.notification_type, NotificationType::CommentReply);
        assert_eq!(draft.priority, NotificationPriority::Medium);
        assert_eq!(draft.message, "Bob Lee replied to your comment on Spring Open");
        assert_eq!(draft.data["commentId"], "c2");
        assert_eq!(draft.data["parentCommentId"], "c1");
        assert_eq!(draft.data["eventId"], "e1");
        assert_eq!(draft.data["eventType"], "tournament");
        assert_eq!(draft.data["divisionId"], "d1");
        assert_eq!(draft.data["authorId"], "m2");
        assert_eq!(draft.data["authorName"], "Bob Lee");
    }

    #[test]
    fn test_self_reply_is_suppressed() {
        let jane = members()[0].clone();
        let parent = comment("c1", &jane, "first", None);
        let reply = comment("c2", &jane, "@Bob Lee adding to my own point", Some("c1"));
        assert!(reply_notifications(&reply, &parent, &event()).is_empty());
    }

    #[test]
    fn test_mention_notifies_each_resolved_member() {
        let bob = members()[1].clone();
        let post = comment("c1", &bob, "Great game @Jane Doe!", None);

        let drafts = mention_notifications(&post, &event(), &members(), &MentionOptions::default());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].recipient_id, "m1");
        assert_eq!(drafts[0].notification_type, NotificationType::Mention);
        assert_eq!(drafts[0].data["mentionedMemberId"], "m1");
        assert_eq!(drafts[0].data["mentionedMemberName"], "Jane Doe");
        assert_eq!(drafts[0].data["isSelfMention"], false);
        assert_eq!(drafts[0].preview, "Great game @Jane Doe!");
    }

    #[test]
    fn test_self_mention_follows_option() {
        let jane = members()[0].clone();
        let post = comment("c1", &jane, "note to self @Jane Doe.", None);

        let drafts = mention_notifications(&post, &event(), &members(), &MentionOptions::default());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].recipient_id, "m1");
        assert_eq!(drafts[0].data["isSelfMention"], true);

        let strict = MentionOptions {
            allow_self_mentions: false,
        };
        assert!(mention_notifications(&post, &event(), &members(), &strict).is_empty());
    }

    #[test]
    fn test_event_fan_out_dedupes_recipients() {
        let recipients = vec!["m1".to_string(), "m2".to_string(), "m1".to_string()];
        let update = EventUpdate {
            summary: "Courts moved".to_string(),
        };

        let drafts = event_update_notifications(&event(), &update, &recipients);
        let ids: Vec<_> = drafts.iter().map(|d| d.recipient_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(drafts[0].title, "Spring Open was updated");
        assert_eq!(drafts[0].data["summary"], "Courts moved");
    }

    #[test]
    fn test_payment_reminder_formats_amount() {
        let payment = PaymentDue {
            amount_cents: 2505,
            due_date: NaiveDate::from_ymd_opt(2024, 5, 1),
        };
        let drafts = payment_reminder_notifications(&event(), &payment, &["m1".to_string()]);
        assert_eq!(drafts[0].priority, NotificationPriority::High);
        assert_eq!(
            drafts[0].message,
            "You owe $25.05 for Spring Open, due 2024-05-01"
        );
        assert_eq!(drafts[0].data["dueDate"], "2024-05-01");
    }

    #[test]
    fn test_format_amount_handles_extremes() {
        let context = MessageContext {
            amount_cents: Some(i64::MIN),
            ..MessageContext::default()
        };
        let formatted = format_notification_message(NotificationType::PaymentReminder, &context);
        assert_eq!(
            formatted.message,
            "You owe -$92233720368547758.08 for an event"
        );
        assert_eq!(format_amount(7), "$0.07");
    }

    #[test]
    fn test_result_and_reminder_builders() {
        let results = ResultsPosted {
            division_id: Some("4.0 Mixed".to_string()),
            summary: None,
        };
        let drafts = result_posted_notifications(&event(), &results, &["m2".to_string()]);
        assert_eq!(drafts[0].priority, NotificationPriority::Low);
        assert_eq!(
            drafts[0].message,
            "Results for Spring Open (4.0 Mixed) are now available"
        );

        let reminder = EventReminder {
            starts_at: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        };
        let drafts = event_reminder_notifications(&event(), &reminder, &["m2".to_string()]);
        assert_eq!(drafts[0].icon, "bell");
        assert_eq!(drafts[0].message, "Spring Open starts Sat Jun 1 at 09:00 UTC");
    }

    #[test]
    fn test_preview_is_truncated() {
        let long = "a".repeat(PREVIEW_LENGTH + 20);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_LENGTH + 3);
        assert!(preview.ends_with("..."));
        assert_eq!(truncate_preview("  short  "), "short");
    }
}
