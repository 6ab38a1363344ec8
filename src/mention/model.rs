use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::member::model::{Member, MemberId};

/// A resolved mention. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub member_id: MemberId,
    pub first_name: String,
    pub last_name: String,
}

impl From<&Member> for Mention {
    fn from(member: &Member) -> Self {
        Self {
            member_id: member.id.clone(),
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
        }
    }
}
