use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type MemberId = String;

/// Club member as read from the member directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[schema(example = "m1")]
    pub id: MemberId,

    #[schema(example = "Jane")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    /// Identity of the member's login, when they have one.
    #[serde(default)]
    pub auth_uid: Option<String>,
}

impl Member {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            auth_uid: None,
        }
    }

    /// "{first} {last}", the form mentions are matched against.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Looks up a member by id.
pub fn find_member<'a>(members: &'a [Member], id: &str) -> Option<&'a Member> {
    members.iter().find(|member| member.id == id)
}

/// Display name for `member_id`, falling back to the id itself.
pub fn member_name(members: &[Member], member_id: &str) -> String {
    find_member(members, member_id)
        .map(Member::full_name)
        .unwrap_or_else(|| member_id.to_string())
}
