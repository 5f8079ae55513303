pub mod authz;
pub mod ledger;
pub mod lifecycle;
pub mod notification;
pub mod rollover;
