/// Authorization module for community-service
///
/// Decides whether a caller may act on a resolved node, given three
/// overlapping authority tiers: the node's author, the owner of the post that
/// contains it, and privileged roles.
///
/// | Action        | Granted when                                                   |
/// |---------------|----------------------------------------------------------------|
/// | EditContent   | caller wrote the node                                          |
/// | DeleteContent | caller wrote the node, owns the post, is Institution, or is    |
/// |               | Organizer within the configured [`OrganizerScope`]             |
/// | Reply         | any authenticated caller                                       |
/// | ToggleLike    | any authenticated caller                                       |
/// | Vote          | any authenticated caller                                       |
///
/// Editing has no moderation override. Roles are compared only in their
/// canonical form.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::domain::thread::OwnershipChain;
use crate::domain::{CanonicalRole, Role};
use crate::error::AppError;
use crate::metrics::community::AUTHZ_DENIALS_TOTAL;
use crate::models::PostKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    EditContent,
    DeleteContent,
    Reply,
    ToggleLike,
    Vote,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::EditContent => "edit",
            Action::DeleteContent => "delete",
            Action::Reply => "reply",
            Action::ToggleLike => "like",
            Action::Vote => "vote",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an Organizer's deletion override applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizerScope {
    /// No override; organizers delete like members do.
    #[default]
    None,
    /// Nodes inside announcement posts.
    Announcements,
    /// Any node.
    Everywhere,
}

impl OrganizerScope {
    fn covers(self, kind: PostKind) -> bool {
        match self {
            OrganizerScope::None => false,
            OrganizerScope::Announcements => kind == PostKind::Announcement,
            OrganizerScope::Everywhere => true,
        }
    }
}

impl FromStr for OrganizerScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(OrganizerScope::None),
            "announcements" => Ok(OrganizerScope::Announcements),
            "everywhere" => Ok(OrganizerScope::Everywhere),
            other => Err(format!(
                "unknown organizer scope '{other}' (expected none, announcements or everywhere)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModerationPolicy {
    pub organizer_scope: OrganizerScope,
    /// Report denials as not-found so callers cannot probe for existence.
    pub mask_forbidden_as_not_found: bool,
}

/// Which tier granted an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Author,
    PostOwner,
    Institution,
    Organizer,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Grant),
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationResolver {
    policy: ModerationPolicy,
}

impl AuthorizationResolver {
    pub fn new(policy: ModerationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ModerationPolicy {
        self.policy
    }

    pub fn decide(
        &self,
        caller: Uuid,
        role: CanonicalRole,
        chain: &OwnershipChain,
        action: Action,
    ) -> Decision {
        match action {
            Action::Reply | Action::ToggleLike | Action::Vote => {
                Decision::Allow(Grant::Authenticated)
            }
            Action::EditContent => {
                if caller == chain.node_owner {
                    Decision::Allow(Grant::Author)
                } else {
                    Decision::Deny
                }
            }
            Action::DeleteContent => {
                if caller == chain.node_owner {
                    Decision::Allow(Grant::Author)
                } else if caller == chain.post_owner {
                    Decision::Allow(Grant::PostOwner)
                } else {
                    match role.known() {
                        Some(Role::Institution) => Decision::Allow(Grant::Institution),
                        Some(Role::Organizer)
                            if self.policy.organizer_scope.covers(chain.post_kind) =>
                        {
                            Decision::Allow(Grant::Organizer)
                        }
                        _ => Decision::Deny,
                    }
                }
            }
        }
    }

    pub fn can_mutate(
        &self,
        caller: Uuid,
        role: CanonicalRole,
        chain: &OwnershipChain,
        action: Action,
    ) -> bool {
        self.decide(caller, role, chain, action).is_allowed()
    }

    /// Decide and turn a denial into the boundary error, honoring the masking
    /// policy.
    pub fn authorize(
        &self,
        caller: Uuid,
        role: CanonicalRole,
        chain: &OwnershipChain,
        action: Action,
    ) -> Result<Grant, AppError> {
        match self.decide(caller, role, chain, action) {
            Decision::Allow(grant) => Ok(grant),
            Decision::Deny => {
                AUTHZ_DENIALS_TOTAL.with_label_values(&[action.as_str()]).inc();
                info!(
                    caller = %caller,
                    role = %role,
                    action = %action,
                    post_id = %chain.post_id,
                    level = %chain.level,
                    "authorization denied"
                );
                if self.policy.mask_forbidden_as_not_found {
                    Err(AppError::NotFound(format!("{} not found", chain.level)))
                } else {
                    Err(AppError::Forbidden(format!(
                        "not allowed to {} this {}",
                        action, chain.level
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::canonicalize;
    use crate::models::NodeLevel;

    fn chain(kind: PostKind, node_owner: Uuid, post_owner: Uuid) -> OwnershipChain {
        OwnershipChain {
            post_id: Uuid::new_v4(),
            post_kind: kind,
            level: NodeLevel::Comment,
            node_owner,
            post_owner,
        }
    }

    const MEMBER: CanonicalRole = CanonicalRole::Known(Role::Member);
    const ORGANIZER: CanonicalRole = CanonicalRole::Known(Role::Organizer);
    const INSTITUTION: CanonicalRole = CanonicalRole::Known(Role::Institution);

    #[test]
    fn test_edit_is_author_only_even_for_privileged_roles() {
        let resolver = AuthorizationResolver::new(ModerationPolicy {
            organizer_scope: OrganizerScope::Everywhere,
            mask_forbidden_as_not_found: false,
        });
        let author = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let c = chain(PostKind::Question, author, owner);

        assert!(resolver.can_mutate(author, MEMBER, &c, Action::EditContent));
        assert!(!resolver.can_mutate(owner, MEMBER, &c, Action::EditContent));
        assert!(!resolver.can_mutate(Uuid::new_v4(), INSTITUTION, &c, Action::EditContent));
        assert!(!resolver.can_mutate(Uuid::new_v4(), ORGANIZER, &c, Action::EditContent));
    }

    #[test]
    fn test_delete_tiers() {
        let resolver = AuthorizationResolver::default();
        let author = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let c = chain(PostKind::Question, author, owner);

        assert_eq!(
            resolver.decide(author, MEMBER, &c, Action::DeleteContent),
            Decision::Allow(Grant::Author)
        );
        assert_eq!(
            resolver.decide(owner, MEMBER, &c, Action::DeleteContent),
            Decision::Allow(Grant::PostOwner)
        );
        assert_eq!(
            resolver.decide(stranger, INSTITUTION, &c, Action::DeleteContent),
            Decision::Allow(Grant::Institution)
        );
        assert_eq!(
            resolver.decide(stranger, MEMBER, &c, Action::DeleteContent),
            Decision::Deny
        );
        // Default scope grants organizers nothing extra
        assert_eq!(
            resolver.decide(stranger, ORGANIZER, &c, Action::DeleteContent),
            Decision::Deny
        );
    }

    #[test]
    fn test_organizer_scope() {
        let stranger = Uuid::new_v4();
        let question = chain(PostKind::Question, Uuid::new_v4(), Uuid::new_v4());
        let announcement = chain(PostKind::Announcement, Uuid::new_v4(), Uuid::new_v4());

        let scoped = AuthorizationResolver::new(ModerationPolicy {
            organizer_scope: OrganizerScope::Announcements,
            mask_forbidden_as_not_found: false,
        });
        assert!(scoped.can_mutate(stranger, ORGANIZER, &announcement, Action::DeleteContent));
        assert!(!scoped.can_mutate(stranger, ORGANIZER, &question, Action::DeleteContent));

        let broad = AuthorizationResolver::new(ModerationPolicy {
            organizer_scope: OrganizerScope::Everywhere,
            mask_forbidden_as_not_found: false,
        });
        assert!(broad.can_mutate(stranger, ORGANIZER, &question, Action::DeleteContent));
    }

    #[test]
    fn test_spelling_drift_does_not_change_the_decision() {
        let resolver = AuthorizationResolver::new(ModerationPolicy {
            organizer_scope: OrganizerScope::Everywhere,
            mask_forbidden_as_not_found: false,
        });
        let c = chain(PostKind::Question, Uuid::new_v4(), Uuid::new_v4());
        let stranger = Uuid::new_v4();

        for raw in ["Club Head", "clubhead", "ClubHead", " club_head "] {
            assert!(
                resolver.can_mutate(stranger, canonicalize(raw), &c, Action::DeleteContent),
                "{raw:?} should be treated as an organizer"
            );
        }
        assert!(!resolver.can_mutate(stranger, canonicalize("janitor"), &c, Action::DeleteContent));
    }

    #[test]
    fn test_reply_and_like_are_open_to_everyone() {
        let resolver = AuthorizationResolver::default();
        let author = Uuid::new_v4();
        let c = chain(PostKind::Announcement, author, Uuid::new_v4());

        for action in [Action::Reply, Action::ToggleLike, Action::Vote] {
            assert!(resolver.can_mutate(Uuid::new_v4(), MEMBER, &c, action));
        }
        // Liking one's own content is allowed
        assert!(resolver.can_mutate(author, MEMBER, &c, Action::ToggleLike));
    }

    #[test]
    fn test_masking_turns_forbidden_into_not_found() {
        let c = chain(PostKind::Question, Uuid::new_v4(), Uuid::new_v4());
        let stranger = Uuid::new_v4();

        let plain = AuthorizationResolver::default();
        assert!(matches!(
            plain.authorize(stranger, MEMBER, &c, Action::EditContent),
            Err(AppError::Forbidden(_))
        ));

        let masked = AuthorizationResolver::new(ModerationPolicy {
            organizer_scope: OrganizerScope::None,
            mask_forbidden_as_not_found: true,
        });
        assert!(matches!(
            masked.authorize(stranger, MEMBER, &c, Action::EditContent),
            Err(AppError::NotFound(_))
        ));
    }
}
