//! Client-side data access and request state for the HRMS web app.

pub mod api;
pub mod config;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError};
pub use config::Config;
pub use state::{
    auth::{auth_status, use_current_user, AuthStatus},
    cache::{CacheKey, CachePolicy, RequestCache, RevalidateEvent, Snapshot, UseResource},
    leave_requests::{LeavePhase, LeaveRequestsContext, LeaveRequestsScope},
    reference::{use_flex_types, use_status_choices},
};
pub use utils::storage::SessionStore;
