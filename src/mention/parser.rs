use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::member::model::{Member, MemberId};

/// Maximum number of members offered while typing a mention.
pub const MAX_SUGGESTIONS: usize = 5;

/// `@` followed by one or more whitespace-separated letter runs. The run is greedy:
/// `@John Smith Said Hi` captures `John Smith Said Hi` as a single candidate.
static MENTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@([A-Za-z]+(?:\s+[A-Za-z]+)*)").expect("mention pattern is a valid regex")
});

/// Exact, case-insensitive full-name match. No prefix or substring matching.
fn resolve<'a>(candidate: &str, members: &'a [Member]) -> Option<&'a Member> {
    let wanted = candidate.to_lowercase();
    members
        .iter()
        .find(|member| member.full_name().to_lowercase() == wanted)
}

/// Members mentioned in `text`, unique by id, in first-occurrence order.
pub fn parse_mentions(text: &str, members: &[Member]) -> Vec<Member> {
    if text.is_empty() || members.is_empty() {
        return Vec::new();
    }

    let mut found: Vec<Member> = Vec::new();
    for caps in MENTION_PATTERN.captures_iter(text) {
        if let Some(member) = resolve(&caps[1], members) {
            if !found.iter().any(|existing| existing.id == member.id) {
                found.push(member.clone());
            }
        }
    }
    found
}

/// Ids of the members mentioned in `text`.
pub fn mention_ids(text: &str, members: &[Member]) -> Vec<MemberId> {
    parse_mentions(text, members)
        .into_iter()
        .map(|member| member.id)
        .collect()
}

/// Wraps every resolved `@Name` in a mention span. Unresolved `@word` runs are left
/// exactly as written.
pub fn format_mention_text(text: &str, members: &[Member]) -> String {
    if text.is_empty() || members.is_empty() {
        return text.to_string();
    }

    MENTION_PATTERN
        .replace_all(text, |caps: &Captures<'_>| match resolve(&caps[1], members) {
            Some(member) => format!(
                r#"<span class="mention" data-member-id="{}">@{}</span>"#,
                html_escape::encode_double_quoted_attribute(&member.id),
                &caps[1]
            ),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// HTML for a comment body: the raw text is escaped, then mentions are highlighted.
pub fn render_comment_html(text: &str, members: &[Member]) -> String {
    format_mention_text(&html_escape::encode_text(text), members)
}

/// Members matching the partial name typed after the last `@` before `caret`
/// (a character offset). A space after the `@` ends the mention, so nothing is offered.
pub fn suggest_mentions(text: &str, caret: usize, members: &[Member]) -> Vec<Member> {
    let before: String = text.chars().take(caret).collect();

    let Some(at) = before.rfind('@') else {
        return Vec::new();
    };

    let partial = &before[at + 1..];
    if partial.chars().any(char::is_whitespace) {
        return Vec::new();
    }

    let needle = partial.to_lowercase();
    members
        .iter()
        .filter(|member| member.full_name().to_lowercase().contains(&needle))
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}
