use chrono::NaiveDateTime;

use crate::db::models::submission::{ReviewState, SubmissionKind, SubmissionStatus};
use crate::middleware::auth::UserPermissions;
use crate::utils::validation::FieldErrors;
use crate::workflow::error::WorkflowError;
use crate::workflow::policy::{Action, Policy};
use crate::workflow::visibility::{may_complete, may_edit};

pub const MAX_NOTE_CHARS: usize = 1000;

/// Review transitions for one kind of submission, as seen by one actor.
///
/// ```text
/// pending ──approve──▶ approved ──complete──▶ completed
///    │                                 (ATK, loans only)
///    └──reject──▶ rejected ──resubmit──▶ pending
/// ```
///
/// Every method is pure: it checks authorization, then input, then the
/// current status, and returns the review columns to persist.
pub struct Lifecycle<'a> {
    kind: SubmissionKind,
    policy: &'a Policy,
    actor: &'a UserPermissions,
}

impl<'a> Lifecycle<'a> {
    pub fn new(kind: SubmissionKind, policy: &'a Policy, actor: &'a UserPermissions) -> Self {
        Lifecycle { kind, policy, actor }
    }

    pub fn approve(&self, state: &ReviewState, now: NaiveDateTime) -> Result<ReviewState, WorkflowError> {
        self.require(Action::Approve, "approve")?;
        expect_status(state, SubmissionStatus::Pending, "Only pending requests can be approved.")?;

        Ok(ReviewState {
            status: SubmissionStatus::Approved,
            note: None,
            processed_by: Some(self.actor.user_id),
            processed_at: Some(now),
            completed_at: None,
        })
    }

    pub fn reject(
        &self,
        state: &ReviewState,
        note: &str,
        now: NaiveDateTime,
    ) -> Result<ReviewState, WorkflowError> {
        self.require(Action::Approve, "reject")?;

        let mut errors = FieldErrors::new();
        errors.require_text("note", note, MAX_NOTE_CHARS);
        if !errors.is_empty() {
            return Err(WorkflowError::Invalid(errors));
        }
        expect_status(state, SubmissionStatus::Pending, "Only pending requests can be rejected.")?;

        Ok(ReviewState {
            status: SubmissionStatus::Rejected,
            note: Some(note.trim().to_string()),
            processed_by: Some(self.actor.user_id),
            processed_at: Some(now),
            completed_at: None,
        })
    }

    pub fn complete(
        &self,
        state: &ReviewState,
        owner_id: Option<i32>,
        now: NaiveDateTime,
    ) -> Result<ReviewState, WorkflowError> {
        if !may_complete(self.kind, self.policy, self.actor, owner_id) {
            return Err(self.forbidden("mark this request as done"));
        }
        expect_status(
            state,
            SubmissionStatus::Approved,
            "Only approved requests can be marked as done.",
        )?;

        Ok(ReviewState {
            status: SubmissionStatus::Completed,
            completed_at: Some(now),
            ..state.clone()
        })
    }

    /// Revision by the owner (while rejected) or an admin (any status).
    /// Whatever was sent, the record goes back to pending with review data cleared.
    pub fn resubmit(
        &self,
        state: &ReviewState,
        owner_id: Option<i32>,
    ) -> Result<ReviewState, WorkflowError> {
        if !may_edit(self.kind, self.policy, self.actor, owner_id, state.status) {
            return Err(self.forbidden("edit this request"));
        }
        Ok(ReviewState::pending())
    }

    pub fn authorize_delete(&self) -> Result<(), WorkflowError> {
        self.require(Action::Delete, "delete")
    }

    pub fn authorize_create(&self) -> Result<(), WorkflowError> {
        self.require(Action::Create, "create")
    }

    fn require(&self, action: Action, verb: &str) -> Result<(), WorkflowError> {
        if self.policy.allows(self.kind, action, self.actor) {
            Ok(())
        } else {
            Err(self.forbidden(&format!("{} this request", verb)))
        }
    }

    fn forbidden(&self, what: &str) -> WorkflowError {
        WorkflowError::Forbidden(format!(
            "You are not allowed to {} ({}).",
            what,
            self.kind.label()
        ))
    }
}

fn expect_status(
    state: &ReviewState,
    expected: SubmissionStatus,
    message: &str,
) -> Result<(), WorkflowError> {
    if state.status == expected {
        Ok(())
    } else {
        Err(WorkflowError::Conflict(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::user::Role;
    use crate::workflow::policy::tests::actor;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 21)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn state(status: SubmissionStatus) -> ReviewState {
        ReviewState { status, ..ReviewState::pending() }
    }

    fn rejected_by(manager: i32) -> ReviewState {
        ReviewState {
            status: SubmissionStatus::Rejected,
            note: Some("Budget exceeded".into()),
            processed_by: Some(manager),
            processed_at: Some(now()),
            completed_at: None,
        }
    }

    #[test]
    fn approve_only_from_pending() {
        let policy = Policy::office_defaults();
        let manager = actor(2, &[Role::Manager]);
        let flow = Lifecycle::new(SubmissionKind::Invoice, &policy, &manager);

        let approved = flow.approve(&state(SubmissionStatus::Pending), now()).unwrap();
        assert_eq!(approved.status, SubmissionStatus::Approved);
        assert_eq!(approved.note, None);
        assert_eq!(approved.processed_by, Some(2));
        assert_eq!(approved.processed_at, Some(now()));

        for status in [
            SubmissionStatus::Approved,
            SubmissionStatus::Rejected,
            SubmissionStatus::Completed,
        ] {
            assert!(matches!(
                flow.approve(&state(status), now()),
                Err(WorkflowError::Conflict(_))
            ));
        }
    }

    #[test]
    fn approve_requires_reviewer_role() {
        let policy = Policy::office_defaults();
        let staff = actor(5, &[Role::Karyawan]);
        let flow = Lifecycle::new(SubmissionKind::AtkRequest, &policy, &staff);
        assert!(matches!(
            flow.approve(&ReviewState::pending(), now()),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn reject_requires_a_note() {
        let policy = Policy::office_defaults();
        let manager = actor(2, &[Role::Manager]);
        let flow = Lifecycle::new(SubmissionKind::LetterNumber, &policy, &manager);

        match flow.reject(&ReviewState::pending(), "   ", now()) {
            Err(WorkflowError::Invalid(errors)) => assert!(errors.get("note").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }

        let too_long = "x".repeat(MAX_NOTE_CHARS + 1);
        assert!(matches!(
            flow.reject(&ReviewState::pending(), &too_long, now()),
            Err(WorkflowError::Invalid(_))
        ));

        let rejected = flow
            .reject(&ReviewState::pending(), " Wrong recipient ", now())
            .unwrap();
        assert_eq!(rejected.status, SubmissionStatus::Rejected);
        assert_eq!(rejected.note.as_deref(), Some("Wrong recipient"));
        assert_eq!(rejected.processed_by, Some(2));
    }

    #[test]
    fn reject_of_processed_record_is_a_conflict() {
        let policy = Policy::office_defaults();
        let manager = actor(2, &[Role::Manager]);
        let flow = Lifecycle::new(SubmissionKind::ExpenseReport, &policy, &manager);
        assert!(matches!(
            flow.reject(&state(SubmissionStatus::Approved), "late", now()),
            Err(WorkflowError::Conflict(_))
        ));
    }

    #[test]
    fn complete_only_from_approved_by_owner_or_admin() {
        let policy = Policy::office_defaults();
        let approved = ReviewState {
            status: SubmissionStatus::Approved,
            processed_by: Some(2),
            processed_at: Some(now()),
            ..ReviewState::pending()
        };

        let owner = actor(5, &[Role::Karyawan]);
        let flow = Lifecycle::new(SubmissionKind::InventoryLoan, &policy, &owner);
        let done = flow.complete(&approved, Some(5), now()).unwrap();
        assert_eq!(done.status, SubmissionStatus::Completed);
        assert_eq!(done.completed_at, Some(now()));
        assert_eq!(done.processed_by, Some(2));

        assert!(matches!(
            flow.complete(&ReviewState::pending(), Some(5), now()),
            Err(WorkflowError::Conflict(_))
        ));

        let manager = actor(2, &[Role::Manager]);
        let flow = Lifecycle::new(SubmissionKind::InventoryLoan, &policy, &manager);
        assert!(matches!(
            flow.complete(&approved, Some(5), now()),
            Err(WorkflowError::Forbidden(_))
        ));

        let admin = actor(1, &[Role::Admin]);
        let flow = Lifecycle::new(SubmissionKind::AtkRequest, &policy, &admin);
        assert!(flow.complete(&approved, Some(5), now()).is_ok());
    }

    #[test]
    fn kinds_without_completion_refuse_it() {
        let policy = Policy::office_defaults();
        let admin = actor(1, &[Role::Admin]);
        let flow = Lifecycle::new(SubmissionKind::Invoice, &policy, &admin);
        assert!(matches!(
            flow.complete(&state(SubmissionStatus::Approved), Some(1), now()),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn owner_resubmission_resets_review_data() {
        let policy = Policy::office_defaults();
        let owner = actor(5, &[Role::Karyawan]);
        let flow = Lifecycle::new(SubmissionKind::AtkRequest, &policy, &owner);

        let next = flow.resubmit(&rejected_by(2), Some(5)).unwrap();
        assert_eq!(next, ReviewState::pending());
    }

    #[test]
    fn owner_cannot_revise_outside_rejection() {
        let policy = Policy::office_defaults();
        let owner = actor(5, &[Role::Karyawan]);
        let flow = Lifecycle::new(SubmissionKind::AtkRequest, &policy, &owner);
        for status in [SubmissionStatus::Pending, SubmissionStatus::Approved] {
            assert!(matches!(
                flow.resubmit(&state(status), Some(5)),
                Err(WorkflowError::Forbidden(_))
            ));
        }

        let stranger = actor(6, &[Role::Karyawan]);
        let flow = Lifecycle::new(SubmissionKind::AtkRequest, &policy, &stranger);
        assert!(flow.resubmit(&rejected_by(2), Some(5)).is_err());
    }

    #[test]
    fn admin_revision_works_at_any_status() {
        let policy = Policy::office_defaults();
        let admin = actor(1, &[Role::Admin]);
        let flow = Lifecycle::new(SubmissionKind::AtkRequest, &policy, &admin);
        let completed = ReviewState {
            status: SubmissionStatus::Completed,
            completed_at: Some(now()),
            processed_by: Some(2),
            processed_at: Some(now()),
            note: None,
        };
        assert_eq!(flow.resubmit(&completed, Some(5)).unwrap(), ReviewState::pending());
    }

    #[test]
    fn delete_is_admin_only() {
        let policy = Policy::office_defaults();
        for kind in SubmissionKind::ALL {
            let admin = actor(1, &[Role::Admin]);
            assert!(Lifecycle::new(kind, &policy, &admin).authorize_delete().is_ok());

            for role in [Role::Manager, Role::Supervisor, Role::Karyawan, Role::Pic] {
                let other = actor(7, &[role]);
                assert!(matches!(
                    Lifecycle::new(kind, &policy, &other).authorize_delete(),
                    Err(WorkflowError::Forbidden(_))
                ));
            }
        }
    }
}
