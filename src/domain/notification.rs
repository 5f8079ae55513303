use chrono::NaiveDate;

/// Side effects produced by lifecycle transitions. They are collected while the
/// transaction runs and handed to the mailer only after commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Goes to the employee's manager and to every organisation-wide reviewer.
    RequestCreated {
        employee_id: u64,
        employee_name: String,
        manager_id: Option<u64>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        days: i32,
    },
    /// Goes to the employee who submitted the request.
    RequestDecided {
        request_id: u64,
        employee_id: u64,
        approved: bool,
    },
}

impl Notification {
    pub fn subject(&self) -> String {
        match self {
            Notification::RequestCreated { employee_name, .. } => {
                format!("New Holiday Request: {employee_name}")
            }
            Notification::RequestDecided { approved, .. } => {
                format!("Holiday Request {}", decision_label(*approved))
            }
        }
    }

    pub fn body(&self, site_url: &str) -> String {
        match self {
            Notification::RequestCreated {
                employee_name,
                start_date,
                end_date,
                days,
                ..
            } => format!(
                "{employee_name} requested {days} day(s) off from {start_date} to {end_date}.\n\n\
                 Review the request at {site_url}"
            ),
            Notification::RequestDecided {
                request_id,
                approved,
                ..
            } => format!(
                "Your holiday request #{request_id} has been {}.\n\n{site_url}",
                decision_label(*approved).to_lowercase()
            ),
        }
    }
}

fn decision_label(approved: bool) -> &'static str {
    if approved { "Approved" } else { "Rejected" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decided_subject_carries_status() {
        let n = Notification::RequestDecided {
            request_id: 3,
            employee_id: 1,
            approved: false,
        };
        assert_eq!(n.subject(), "Holiday Request Rejected");
        assert!(n.body("http://localhost").contains("#3 has been rejected"));
    }

    #[test]
    fn created_subject_names_employee() {
        let n = Notification::RequestCreated {
            employee_id: 1,
            employee_name: "Ann Smith".into(),
            manager_id: Some(2),
            start_date: NaiveDate::from_ymd_opt(2025, 7, 21).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 7, 23).unwrap(),
            days: 3,
        };
        assert_eq!(n.subject(), "New Holiday Request: Ann Smith");
        assert!(n.body("http://hr.local").contains("2025-07-21 to 2025-07-23"));
    }
}
