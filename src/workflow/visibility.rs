use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use utoipa::ToSchema;

use crate::db::models::submission::{SubmissionKind, SubmissionStatus};
use crate::middleware::auth::UserPermissions;
use crate::workflow::policy::{Action, Policy};

/// Which rows of a submission table an actor may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    OwnedBy(i32),
}

impl Scope {
    pub fn for_actor(kind: SubmissionKind, policy: &Policy, actor: &UserPermissions) -> Self {
        if policy.allows(kind, Action::ViewAll, actor) {
            Scope::All
        } else {
            Scope::OwnedBy(actor.user_id)
        }
    }

    pub fn includes(&self, owner_id: Option<i32>) -> bool {
        match self {
            Scope::All => true,
            Scope::OwnedBy(user_id) => owner_id == Some(*user_id),
        }
    }

    /// Appends an `AND` condition; the builder must already hold a `WHERE` clause.
    pub fn push_filter(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if let Scope::OwnedBy(user_id) = self {
            builder.push(" AND user_id = ").push_bind(*user_id);
        }
    }
}

/// Per-record permissions, recomputed on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ActionFlags {
    /// Owner may revise and resubmit
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_mark_done: bool,
    /// Admin may revise regardless of status
    pub can_admin_edit: bool,
    /// Actor may approve or reject
    pub can_review: bool,
}

pub fn is_owner(actor: &UserPermissions, owner_id: Option<i32>) -> bool {
    owner_id == Some(actor.user_id)
}

/// Owner while rejected, or anyone holding `EditAny`.
pub fn may_edit(
    kind: SubmissionKind,
    policy: &Policy,
    actor: &UserPermissions,
    owner_id: Option<i32>,
    status: SubmissionStatus,
) -> bool {
    (is_owner(actor, owner_id) && status == SubmissionStatus::Rejected)
        || policy.allows(kind, Action::EditAny, actor)
}

/// Attachments follow edit rights, and owners may also attach while still pending.
pub fn may_attach(
    kind: SubmissionKind,
    policy: &Policy,
    actor: &UserPermissions,
    owner_id: Option<i32>,
    status: SubmissionStatus,
) -> bool {
    kind.supports_attachment()
        && ((is_owner(actor, owner_id) && status == SubmissionStatus::Pending)
            || may_edit(kind, policy, actor, owner_id, status))
}

/// Owner or `Complete` role holder, and only for completable kinds.
pub fn may_complete(
    kind: SubmissionKind,
    policy: &Policy,
    actor: &UserPermissions,
    owner_id: Option<i32>,
) -> bool {
    kind.supports_completion()
        && (is_owner(actor, owner_id) || policy.allows(kind, Action::Complete, actor))
}

pub fn action_flags(
    kind: SubmissionKind,
    policy: &Policy,
    actor: &UserPermissions,
    owner_id: Option<i32>,
    status: SubmissionStatus,
) -> ActionFlags {
    ActionFlags {
        can_edit: is_owner(actor, owner_id) && status == SubmissionStatus::Rejected,
        can_delete: policy.allows(kind, Action::Delete, actor),
        can_mark_done: status == SubmissionStatus::Approved
            && may_complete(kind, policy, actor, owner_id),
        can_admin_edit: policy.allows(kind, Action::EditAny, actor),
        can_review: status == SubmissionStatus::Pending
            && policy.allows(kind, Action::Approve, actor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::user::Role;
    use crate::workflow::policy::tests::actor;

    #[test]
    fn elevated_roles_see_everything() {
        let policy = Policy::office_defaults();
        let manager = actor(1, &[Role::Manager]);
        assert_eq!(Scope::for_actor(SubmissionKind::Invoice, &policy, &manager), Scope::All);

        let supervisor = actor(2, &[Role::Supervisor]);
        assert_eq!(Scope::for_actor(SubmissionKind::AtkRequest, &policy, &supervisor), Scope::All);
        assert_eq!(
            Scope::for_actor(SubmissionKind::Invoice, &policy, &supervisor),
            Scope::OwnedBy(2)
        );
    }

    #[test]
    fn owned_scope_excludes_orphaned_rows() {
        let scope = Scope::OwnedBy(9);
        assert!(scope.includes(Some(9)));
        assert!(!scope.includes(Some(10)));
        assert!(!scope.includes(None));
        assert!(Scope::All.includes(None));
    }

    #[test]
    fn owner_flags_follow_status() {
        let policy = Policy::office_defaults();
        let staff = actor(5, &[Role::Karyawan]);
        let kind = SubmissionKind::AtkRequest;

        let rejected = action_flags(kind, &policy, &staff, Some(5), SubmissionStatus::Rejected);
        assert!(rejected.can_edit);
        assert!(!rejected.can_mark_done);
        assert!(!rejected.can_delete);

        let approved = action_flags(kind, &policy, &staff, Some(5), SubmissionStatus::Approved);
        assert!(!approved.can_edit);
        assert!(approved.can_mark_done);

        let someone_elses = action_flags(kind, &policy, &staff, Some(6), SubmissionStatus::Approved);
        assert_eq!(someone_elses, ActionFlags::default());
    }

    #[test]
    fn admin_flags_cover_any_status() {
        let policy = Policy::office_defaults();
        let admin = actor(1, &[Role::Admin]);
        let flags = action_flags(
            SubmissionKind::Invoice,
            &policy,
            &admin,
            Some(5),
            SubmissionStatus::Approved,
        );
        assert!(flags.can_admin_edit);
        assert!(flags.can_delete);
        assert!(!flags.can_edit);
        assert!(!flags.can_review);
        assert!(!flags.can_mark_done, "invoices have no completion step");
    }

    #[test]
    fn attachments_follow_kind_and_edit_rights() {
        let policy = Policy::office_defaults();
        let owner = actor(5, &[Role::Karyawan]);
        let pending = SubmissionStatus::Pending;
        let approved = SubmissionStatus::Approved;

        assert!(may_attach(SubmissionKind::Invoice, &policy, &owner, Some(5), pending));
        assert!(may_attach(SubmissionKind::Invoice, &policy, &owner, Some(5), SubmissionStatus::Rejected));
        assert!(!may_attach(SubmissionKind::Invoice, &policy, &owner, Some(5), approved));
        assert!(!may_attach(SubmissionKind::AtkRequest, &policy, &owner, Some(5), pending));

        let admin = actor(1, &[Role::Admin]);
        assert!(may_attach(SubmissionKind::AssignmentLetter, &policy, &admin, Some(5), approved));
    }

    #[test]
    fn reviewers_only_see_review_flag_while_pending() {
        let policy = Policy::office_defaults();
        let manager = actor(2, &[Role::Manager]);
        let kind = SubmissionKind::LetterNumber;
        assert!(action_flags(kind, &policy, &manager, Some(5), SubmissionStatus::Pending).can_review);
        assert!(!action_flags(kind, &policy, &manager, Some(5), SubmissionStatus::Rejected).can_review);
    }
}
