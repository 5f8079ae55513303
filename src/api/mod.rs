pub mod dashboard;
pub mod employee;
pub mod leave_request;
pub mod public_holiday;
pub mod report;
pub mod special_leave;
