use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::submission::SubmissionKind;
use crate::middleware::auth::UserPermissions;
use crate::workflow::policy::{Action, Policy};
use crate::workflow::visibility::Scope;

/// Record counts for one kind, within the actor's scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCount {
    pub total: i64,
    pub pending: i64,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct DashboardWidget {
    pub kind: SubmissionKind,
    pub label: String,
    pub count: i64,
    pub pending: i64,
    /// `true` when the count covers every user's records
    pub all_records: bool,
    pub route: String,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct QuickLink {
    pub kind: SubmissionKind,
    pub label: String,
    pub route: String,
    /// `"create"` or `"view"`
    pub action: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub widgets: Vec<DashboardWidget>,
    pub quick_links: Vec<QuickLink>,
}

/// Kinds the actor may open, with the scope their counts should use.
pub fn visible_kinds(policy: &Policy, actor: &UserPermissions) -> Vec<(SubmissionKind, Scope)> {
    SubmissionKind::ALL
        .into_iter()
        .filter(|kind| policy.allows(*kind, Action::View, actor))
        .map(|kind| (kind, Scope::for_actor(kind, policy, actor)))
        .collect()
}

pub fn assemble(
    policy: &Policy,
    actor: &UserPermissions,
    counts: &HashMap<SubmissionKind, KindCount>,
) -> Dashboard {
    let mut widgets = Vec::new();
    let mut quick_links = Vec::new();

    for (kind, scope) in visible_kinds(policy, actor) {
        let count = counts.get(&kind).copied().unwrap_or_default();
        widgets.push(DashboardWidget {
            kind,
            label: kind.label().to_string(),
            count: count.total,
            pending: count.pending,
            all_records: scope == Scope::All,
            route: kind.resource().to_string(),
        });

        let link = if policy.allows(kind, Action::Create, actor) {
            QuickLink {
                kind,
                label: format!("New {}", kind.label().to_lowercase()),
                route: format!("{}/create", kind.resource()),
                action: "create".into(),
            }
        } else {
            QuickLink {
                kind,
                label: kind.label().to_string(),
                route: kind.resource().to_string(),
                action: "view".into(),
            }
        };
        quick_links.push(link);
    }

    Dashboard { widgets, quick_links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::user::Role;
    use crate::workflow::policy::tests::actor;

    /// (owner, status is pending) pairs standing in for table rows.
    fn rows() -> Vec<(Option<i32>, bool)> {
        vec![(Some(5), true), (Some(5), false), (Some(6), true), (None, false)]
    }

    fn count_rows(scope: Scope) -> KindCount {
        let visible: Vec<_> = rows().into_iter().filter(|(owner, _)| scope.includes(*owner)).collect();
        KindCount {
            total: visible.len() as i64,
            pending: visible.iter().filter(|(_, pending)| *pending).count() as i64,
        }
    }

    fn counts_for(policy: &Policy, who: &UserPermissions) -> HashMap<SubmissionKind, KindCount> {
        visible_kinds(policy, who)
            .into_iter()
            .map(|(kind, scope)| (kind, count_rows(scope)))
            .collect()
    }

    #[test]
    fn staff_counts_only_their_own_records() {
        let policy = Policy::office_defaults();
        let staff = actor(5, &[Role::Karyawan]);
        let dashboard = assemble(&policy, &staff, &counts_for(&policy, &staff));

        let atk = dashboard
            .widgets
            .iter()
            .find(|w| w.kind == SubmissionKind::AtkRequest)
            .unwrap();
        assert_eq!((atk.count, atk.pending), (2, 1));
        assert!(!atk.all_records);
    }

    #[test]
    fn elevated_roles_count_every_record() {
        let policy = Policy::office_defaults();
        let manager = actor(2, &[Role::Manager]);
        let dashboard = assemble(&policy, &manager, &counts_for(&policy, &manager));

        assert_eq!(dashboard.widgets.len(), 6);
        for widget in &dashboard.widgets {
            assert_eq!(widget.count, 4);
            assert_eq!(widget.pending, 2);
            assert!(widget.all_records);
        }
    }

    #[test]
    fn widgets_are_limited_to_viewable_kinds() {
        let policy = Policy::office_defaults();
        let staff = actor(5, &[Role::Karyawan]);
        let dashboard = assemble(&policy, &staff, &HashMap::new());

        assert!(dashboard.widgets.iter().all(|w| w.kind != SubmissionKind::ExpenseReport));
        assert_eq!(dashboard.widgets.len(), 5);
        assert!(dashboard.widgets.iter().all(|w| w.count == 0));
    }

    #[test]
    fn quick_links_prefer_create_routes() {
        let policy = Policy::office_defaults()
            .grant(SubmissionKind::ExpenseReport, Action::View, &[Role::Supervisor]);
        let supervisor = actor(3, &[Role::Supervisor]);
        let dashboard = assemble(&policy, &supervisor, &HashMap::new());

        let atk = dashboard
            .quick_links
            .iter()
            .find(|l| l.kind == SubmissionKind::AtkRequest)
            .unwrap();
        assert_eq!(atk.route, "/atk-requests/create");
        assert_eq!(atk.action, "create");

        let spj = dashboard
            .quick_links
            .iter()
            .find(|l| l.kind == SubmissionKind::ExpenseReport)
            .unwrap();
        assert_eq!(spj.route, "/expense-reports");
        assert_eq!(spj.action, "view");
    }
}
