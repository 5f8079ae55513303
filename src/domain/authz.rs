//! Explicit authorization: every lifecycle operation receives the acting
//! [`Actor`] and checks its [`Capabilities`] instead of querying global state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{AppError, AppResult};
use crate::model::employee::Employee;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Review requests of every employee
    ReviewAll,
    /// Review requests of direct reports
    ReviewManaged,
    ApproveLeave,
    RejectLeave,
    DeleteLeave,
    /// Read-only access to holiday overviews
    ViewHoliday,
    ViewAllEmployees,
    ViewManagedEmployees,
    ExportHolidays,
    ViewSpecialUsageAll,
    ViewSpecialUsageManaged,
    ManageEmployees,
    /// Public holidays and special leave types
    ManageCalendar,
    TriggerRollover,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    pub fn all() -> Self {
        Self(Capability::iter().collect())
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How far a read/review permission reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Only employees whose manager is the given employee id
    Managed(u64),
}

impl Scope {
    pub fn includes(&self, employee: &Employee) -> bool {
        match self {
            Scope::All => true,
            Scope::Managed(manager_id) => employee.manager_id == Some(*manager_id),
        }
    }

    pub fn manager_id(&self) -> Option<u64> {
        match self {
            Scope::All => None,
            Scope::Managed(id) => Some(*id),
        }
    }
}

/// The authenticated user performing an operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: u64,
    pub employee_id: Option<u64>,
    pub capabilities: Capabilities,
}

impl Actor {
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.capabilities.has(capability) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "You don't have permission to perform this action.",
            ))
        }
    }

    pub fn employee_id(&self) -> AppResult<u64> {
        self.employee_id
            .ok_or_else(|| AppError::forbidden("You must be linked to an employee profile."))
    }

    /// Resolves an all/managed capability pair into a scope.
    pub fn scope(&self, all: Capability, managed: Capability) -> AppResult<Scope> {
        if self.capabilities.has(all) {
            return Ok(Scope::All);
        }
        if self.capabilities.has(managed) {
            return Ok(Scope::Managed(self.employee_id()?));
        }
        Err(AppError::forbidden(
            "You don't have permission to view this data.",
        ))
    }

    pub fn review_scope(&self) -> AppResult<Scope> {
        self.scope(Capability::ReviewAll, Capability::ReviewManaged)
    }

    /// Review authority over `employee` plus the decision-specific capability.
    pub fn require_review_of(&self, employee: &Employee, decision: Capability) -> AppResult<()> {
        self.require(decision)?;
        if self.review_scope()?.includes(employee) {
            Ok(())
        } else {
            Err(AppError::forbidden("You don't manage this employee."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(id: u64, manager_id: Option<u64>) -> Employee {
        Employee {
            id,
            first_name: "Ann".into(),
            last_name: "Smith".into(),
            email: "ann@example.com".into(),
            country_code: "NL".into(),
            annual_entitlement: 25,
            available_balance: 25,
            last_rollover_year: 2025,
            manager_id,
            position: None,
        }
    }

    fn actor(employee_id: Option<u64>, caps: &[Capability]) -> Actor {
        Actor {
            user_id: 99,
            employee_id,
            capabilities: caps.iter().copied().collect(),
        }
    }

    #[test]
    fn capability_names_round_trip_through_strings() {
        for cap in Capability::iter() {
            let parsed: Capability = cap.to_string().parse().unwrap();
            assert_eq!(parsed, cap);
        }
        assert_eq!(Capability::ReviewAll.as_ref(), "review_all");
    }

    #[test]
    fn organisation_wide_reviewer_reviews_anyone() {
        let hr = actor(None, &[Capability::ReviewAll, Capability::ApproveLeave]);
        assert!(hr
            .require_review_of(&employee(1, None), Capability::ApproveLeave)
            .is_ok());
    }

    #[test]
    fn managed_reviewer_limited_to_direct_reports() {
        let manager = actor(Some(4), &[Capability::ReviewManaged, Capability::ApproveLeave]);
        assert!(manager
            .require_review_of(&employee(1, Some(4)), Capability::ApproveLeave)
            .is_ok());
        let err = manager
            .require_review_of(&employee(2, Some(5)), Capability::ApproveLeave)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn review_requires_the_decision_capability() {
        let reviewer = actor(Some(4), &[Capability::ReviewAll]);
        assert!(reviewer
            .require_review_of(&employee(1, Some(4)), Capability::RejectLeave)
            .is_err());
    }

    #[test]
    fn managed_scope_needs_an_employee_profile() {
        let orphan = actor(None, &[Capability::ReviewManaged]);
        assert!(matches!(orphan.review_scope(), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn no_capability_means_no_scope() {
        let plain = actor(Some(1), &[]);
        assert!(plain
            .scope(Capability::ViewAllEmployees, Capability::ViewManagedEmployees)
            .is_err());
    }
}
