mod accounts;
pub mod client;
mod common;
mod leave;
mod policies;
pub mod types;

pub use accounts::CURRENT_USER_PATH;
pub use client::*;
pub use common::STATUS_CHOICES_PATH;
pub use leave::LEAVE_REQUESTS_PATH;
pub use policies::FLEX_TYPES_PATH;
pub use types::*;

#[cfg(test)]
pub mod test_support;
