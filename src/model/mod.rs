pub mod employee;
pub mod leave_request;
pub mod public_holiday;
pub mod role;
pub mod special_leave;
pub mod user;
