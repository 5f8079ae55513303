use strum_macros::{Display, EnumIter};

use crate::domain::authz::{Capabilities, Capability};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin = 1,
    /// HR / general management: reviews every request
    Hr = 2,
    Employee = 3,
    /// Line manager: reviews direct reports only
    Manager = 4,
    /// Read-only access to holiday overviews and exports
    Auditor = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::Manager),
            5 => Some(Role::Auditor),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Capabilities granted to every user holding this role.
    pub fn capabilities(self) -> Capabilities {
        use Capability::*;

        match self {
            Role::Admin => Capabilities::all(),
            Role::Hr => Capabilities::from_iter([
                ReviewAll,
                ApproveLeave,
                RejectLeave,
                DeleteLeave,
                ViewHoliday,
                ViewAllEmployees,
                ExportHolidays,
                ViewSpecialUsageAll,
                ManageEmployees,
                ManageCalendar,
            ]),
            Role::Manager => Capabilities::from_iter([
                ReviewManaged,
                ApproveLeave,
                RejectLeave,
                ViewHoliday,
                ViewManagedEmployees,
                ViewSpecialUsageManaged,
            ]),
            Role::Auditor => Capabilities::from_iter([
                ViewHoliday,
                ViewAllEmployees,
                ExportHolidays,
            ]),
            Role::Employee => Capabilities::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ids_round_trip() {
        for role in Role::iter() {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn employees_hold_no_elevated_capabilities() {
        assert!(Role::Employee.capabilities().is_empty());
    }

    #[test]
    fn managers_review_only_their_reports() {
        let caps = Role::Manager.capabilities();
        assert!(caps.has(Capability::ReviewManaged));
        assert!(!caps.has(Capability::ReviewAll));
        assert!(!caps.has(Capability::DeleteLeave));
    }
}
