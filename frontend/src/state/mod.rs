pub mod auth;
pub mod cache;
pub mod leave_requests;
pub mod reference;
