use std::collections::HashMap;

use crate::db::models::submission::SubmissionKind;
use crate::db::models::user::Role;
use crate::middleware::auth::UserPermissions;

/// Policy as shared with handlers through an `Extension`.
pub type SharedPolicy = std::sync::Arc<Policy>;

/// Things a user may try to do with a kind of submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Open the list at all (own records only unless `ViewAll`)
    View,
    /// See every user's records, not just their own
    ViewAll,
    Create,
    /// Approve or reject pending records
    Approve,
    /// Mark approved records as done on someone else's behalf
    Complete,
    /// Revise a record whatever its status
    EditAny,
    Delete,
}

/// Capability table: which roles may perform an action on a kind.
///
/// Built once at startup and shared through an `Extension`, so handlers never
/// compare role names themselves.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    rules: HashMap<(SubmissionKind, Action), Vec<Role>>,
}

impl Policy {
    pub fn empty() -> Self {
        Policy { rules: HashMap::new() }
    }

    pub fn grant(mut self, kind: SubmissionKind, action: Action, roles: &[Role]) -> Self {
        let entry = self.rules.entry((kind, action)).or_default();
        for role in roles {
            if !entry.contains(role) {
                entry.push(*role);
            }
        }
        self
    }

    pub fn roles(&self, kind: SubmissionKind, action: Action) -> &[Role] {
        self.rules
            .get(&(kind, action))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn allows(&self, kind: SubmissionKind, action: Action, actor: &UserPermissions) -> bool {
        actor.has_any_role(self.roles(kind, action))
    }

    /// The office's standard role table.
    pub fn office_defaults() -> Self {
        use Role::*;
        use SubmissionKind::*;

        const EVERYONE: &[Role] = &[Admin, Manager, Supervisor, Karyawan, Pic];
        const SUPERVISORS: &[Role] = &[Admin, Manager, Supervisor];
        const MANAGERS: &[Role] = &[Admin, Manager];

        let mut policy = Policy::empty();
        for kind in SubmissionKind::ALL {
            let (view, reviewers): (&[Role], &[Role]) = match kind {
                AtkRequest | InventoryLoan => (EVERYONE, SUPERVISORS),
                Invoice | LetterNumber | AssignmentLetter => (EVERYONE, MANAGERS),
                ExpenseReport => (&[Admin, Manager, Pic], MANAGERS),
            };
            policy = policy
                .grant(kind, Action::View, view)
                .grant(kind, Action::Create, view)
                .grant(kind, Action::ViewAll, reviewers)
                .grant(kind, Action::Approve, reviewers)
                .grant(kind, Action::EditAny, &[Admin])
                .grant(kind, Action::Delete, &[Admin]);
            if kind.supports_completion() {
                policy = policy.grant(kind, Action::Complete, &[Admin]);
            }
        }
        policy
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn actor(user_id: i32, roles: &[Role]) -> UserPermissions {
        UserPermissions {
            user_id,
            username: format!("user{}", user_id),
            roles: roles.to_vec(),
        }
    }

    #[test]
    fn only_admin_deletes_anything() {
        let policy = Policy::office_defaults();
        for kind in SubmissionKind::ALL {
            assert_eq!(policy.roles(kind, Action::Delete), &[Role::Admin]);
            assert!(!policy.allows(kind, Action::Delete, &actor(2, &[Role::Manager, Role::Supervisor])));
        }
    }

    #[test]
    fn supervisors_review_stationery_but_not_invoices() {
        let policy = Policy::office_defaults();
        let supervisor = actor(3, &[Role::Supervisor]);
        assert!(policy.allows(SubmissionKind::AtkRequest, Action::Approve, &supervisor));
        assert!(policy.allows(SubmissionKind::InventoryLoan, Action::ViewAll, &supervisor));
        assert!(!policy.allows(SubmissionKind::Invoice, Action::Approve, &supervisor));
        assert!(!policy.allows(SubmissionKind::LetterNumber, Action::ViewAll, &supervisor));
    }

    #[test]
    fn expense_reports_are_hidden_from_plain_staff() {
        let policy = Policy::office_defaults();
        assert!(!policy.allows(SubmissionKind::ExpenseReport, Action::View, &actor(4, &[Role::Karyawan])));
        assert!(policy.allows(SubmissionKind::ExpenseReport, Action::Create, &actor(5, &[Role::Pic])));
    }

    #[test]
    fn completion_rule_exists_only_for_completable_kinds() {
        let policy = Policy::office_defaults();
        assert_eq!(policy.roles(SubmissionKind::AtkRequest, Action::Complete), &[Role::Admin]);
        assert!(policy.roles(SubmissionKind::Invoice, Action::Complete).is_empty());
    }

    #[test]
    fn grant_merges_without_duplicates() {
        let policy = Policy::empty()
            .grant(SubmissionKind::Invoice, Action::Approve, &[Role::Manager])
            .grant(SubmissionKind::Invoice, Action::Approve, &[Role::Manager, Role::Admin]);
        assert_eq!(
            policy.roles(SubmissionKind::Invoice, Action::Approve),
            &[Role::Manager, Role::Admin]
        );
        assert!(policy.roles(SubmissionKind::Invoice, Action::Delete).is_empty());
    }
}
