use std::collections::HashSet;
use tracing::warn;

use crate::member::model::MemberId;

/// Actions gated by the permission predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Hide comments, and edit or delete other members' comments.
    ModerateComments,
    /// Fan out event updates, payment and event reminders, and results.
    SendEventNotifications,
}

/// External authorization predicate.
#[cfg_attr(test, mockall::automock)]
pub trait PermissionCheck: Send + Sync {
    fn has_permission(&self, member_id: &str, action: Action) -> bool;
}

/// Grants every action to a fixed set of moderators and nothing to anyone else.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    moderators: HashSet<MemberId>,
}

impl StaticPermissions {
    pub fn new<I, S>(moderators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MemberId>,
    {
        Self {
            moderators: moderators.into_iter().map(Into::into).collect(),
        }
    }
}

impl PermissionCheck for StaticPermissions {
    fn has_permission(&self, member_id: &str, _action: Action) -> bool {
        self.moderators.contains(member_id)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Member {member_id} may not {action:?}")]
pub struct PermissionDenied {
    pub member_id: MemberId,
    pub action: Action,
}

pub fn require_permission(
    permissions: &dyn PermissionCheck,
    member_id: &str,
    action: Action,
) -> Result<(), PermissionDenied> {
    if permissions.has_permission(member_id, action) {
        return Ok(());
    }

    warn!("Denied {:?} to member {}", action, member_id);
    Err(PermissionDenied {
        member_id: member_id.to_string(),
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_static_permissions_grant_moderators_only() {
        let permissions = StaticPermissions::new(["mod1"]);
        assert!(permissions.has_permission("mod1", Action::ModerateComments));
        assert!(permissions.has_permission("mod1", Action::SendEventNotifications));
        assert!(!permissions.has_permission("m1", Action::ModerateComments));
    }

    #[test]
    fn test_require_permission_consults_predicate() {
        let mut mock = MockPermissionCheck::new();
        mock.expect_has_permission()
            .with(eq("m1"), eq(Action::ModerateComments))
            .times(1)
            .return_const(true);
        mock.expect_has_permission()
            .with(eq("m2"), eq(Action::ModerateComments))
            .times(1)
            .return_const(false);

        assert!(require_permission(&mock, "m1", Action::ModerateComments).is_ok());
        assert_eq!(
            require_permission(&mock, "m2", Action::ModerateComments),
            Err(PermissionDenied {
                member_id: "m2".to_string(),
                action: Action::ModerateComments,
            })
        );
    }
}
