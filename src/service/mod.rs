//! Operations that span the database and the pure domain rules.

pub mod leave_service;
pub mod reporting;
pub mod rollover;
