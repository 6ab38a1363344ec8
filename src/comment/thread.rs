use std::collections::HashMap;

use crate::comment::model::{Comment, CommentNode, CommentStatus, HIDDEN_PLACEHOLDER};

/// Comments oldest first, with hidden content replaced by a placeholder unless the
/// viewer moderates.
pub fn visible_comments(comments: &[Comment], viewer_is_moderator: bool) -> Vec<Comment> {
    let mut ordered: Vec<Comment> = comments.to_vec();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    if !viewer_is_moderator {
        for comment in ordered.iter_mut() {
            if comment.status == CommentStatus::Hidden {
                comment.content = HIDDEN_PLACEHOLDER.to_string();
                comment.mentions.clear();
            }
        }
    }
    ordered
}

/// Nests a flat comment list into reply trees, oldest first at every level.
///
/// Deleted and hidden comments keep their place so their replies stay attached.
/// Replies whose parent is not in `comments` surface at the root.
pub fn build_thread(comments: &[Comment], viewer_is_moderator: bool) -> Vec<CommentNode> {
    let ordered = visible_comments(comments, viewer_is_moderator);

    let present: HashMap<&str, usize> = ordered
        .iter()
        .enumerate()
        .map(|(index, comment)| (comment.id.as_str(), index))
        .collect();

    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (index, comment) in ordered.iter().enumerate() {
        match comment
            .parent_id
            .as_deref()
            .and_then(|parent| present.get(parent))
        {
            Some(&parent) if parent != index => children.entry(parent).or_default().push(index),
            _ => roots.push(index),
        }
    }

    roots
        .into_iter()
        .map(|index| build_node(index, &ordered, &children))
        .collect()
}

fn build_node(
    index: usize,
    comments: &[Comment],
    children: &HashMap<usize, Vec<usize>>,
) -> CommentNode {
    let replies = children
        .get(&index)
        .map(|kids| {
            kids.iter()
                .map(|&kid| build_node(kid, comments, children))
                .collect()
        })
        .unwrap_or_default();

    CommentNode {
        comment: comments[index].clone(),
        replies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::model::CommentType;
    use crate::event::model::EventType;
    use chrono::{Duration, TimeZone, Utc};

    fn comment(id: &str, parent: Option<&str>, minute: i64, status: CommentStatus) -> Comment {
        Comment {
            id: id.to_string(),
            event_id: "e1".to_string(),
            event_type: EventType::Tournament,
            division_id: None,
            author_id: "m1".to_string(),
            author_name: "Jane Doe".to_string(),
            content: format!("content {}", id),
            parent_id: parent.map(str::to_string),
            comment_type: if parent.is_some() {
                CommentType::Reply
            } else {
                CommentType::Comment
            },
            depth: 0,
            status,
            mentions: Vec::new(),
            reply_count: 0,
            is_edited: false,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minute),
            edited_at: None,
        }
    }

    #[test]
    fn test_nests_replies_in_time_order() {
        let comments = vec![
            comment("r2", Some("a"), 3, CommentStatus::Active),
            comment("a", None, 0, CommentStatus::Active),
            comment("b", None, 1, CommentStatus::Active),
            comment("r1", Some("a"), 2, CommentStatus::Active),
            comment("rr", Some("r1"), 4, CommentStatus::Active),
        ];

        let thread = build_thread(&comments, false);
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].comment.id, "a");
        assert_eq!(thread[1].comment.id, "b");

        let replies: Vec<_> = thread[0].replies.iter().map(|n| n.comment.id.as_str()).collect();
        assert_eq!(replies, vec!["r1", "r2"]);
        assert_eq!(thread[0].replies[0].replies[0].comment.id, "rr");
        assert!(thread[1].replies.is_empty());
    }

    #[test]
    fn test_deleted_parent_keeps_replies_attached() {
        let comments = vec![
            comment("a", None, 0, CommentStatus::Deleted),
            comment("r1", Some("a"), 1, CommentStatus::Active),
        ];
        let thread = build_thread(&comments, false);
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].replies[0].comment.id, "r1");
    }

    #[test]
    fn test_hidden_content_masked_for_members_only() {
        let comments = vec![comment("a", None, 0, CommentStatus::Hidden)];

        let member_view = build_thread(&comments, false);
        assert_eq!(member_view[0].comment.content, HIDDEN_PLACEHOLDER);

        let moderator_view = build_thread(&comments, true);
        assert_eq!(moderator_view[0].comment.content, "content a");
    }

    #[test]
    fn test_orphans_surface_at_root() {
        let comments = vec![
            comment("r1", Some("gone"), 0, CommentStatus::Active),
            comment("self", Some("self"), 1, CommentStatus::Active),
        ];
        let thread = build_thread(&comments, false);
        let ids: Vec<_> = thread.iter().map(|n| n.comment.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "self"]);
    }
}
