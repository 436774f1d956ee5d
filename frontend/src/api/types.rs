use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Successful response: decoded body plus the status the server answered with.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Network(String),
    #[error("{message} (HTTP {status})")]
    Http {
        status: u16,
        message: String,
        code: Option<String>,
    },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Request timed out")]
    Timeout,
    /// The owning scope was torn down before the request could be applied.
    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status: status.as_u16(),
            message: message.into(),
            code: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `401` and `403` are the statuses a higher layer turns into a login redirect.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Error body shape the backend uses; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, alias = "error", alias = "message")]
    pub detail: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub is_superuser: Option<bool>,
    #[serde(default)]
    pub is_staff: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl CurrentUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.is_superuser.unwrap_or(false) || self.is_staff.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexType {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub duration_minutes: u32,
    pub max_per_month: u32,
    pub is_late: bool,
    pub is_early: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChoice {
    pub id: i64,
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub color_code: Option<String>,
    pub is_active: bool,
}

pub type LeaveRequestId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    #[serde(default)]
    pub employee: Option<i64>,
    #[serde(default)]
    pub employee_name: Option<String>,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: LeaveStatus,
    #[serde(default)]
    pub decision_comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeaveRequest {
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaveDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_user_tolerates_unknown_fields_and_missing_flags() {
        let user: CurrentUser = serde_json::from_value(json!({
            "id": "u1",
            "username": "alice",
            "email": "a@x.com",
            "first_name": "Alice",
            "last_name": "Zeta",
            "department": "ops"
        }))
        .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.is_staff, None);
        assert!(!user.is_admin());
        assert_eq!(user.full_name(), "Alice Zeta");
    }

    #[test]
    fn flex_type_requires_code() {
        let err = serde_json::from_value::<FlexType>(json!({
            "id": 1,
            "name": "Late Arrival",
            "duration_minutes": 30,
            "max_per_month": 3,
            "is_late": true,
            "is_early": false,
            "is_active": true
        }))
        .unwrap_err();
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn leave_status_falls_back_to_unknown() {
        let status: LeaveStatus = serde_json::from_value(json!("escalated")).unwrap();
        assert_eq!(status, LeaveStatus::Unknown);
        let status: LeaveStatus = serde_json::from_value(json!("approved")).unwrap();
        assert_eq!(status, LeaveStatus::Approved);
    }

    #[test]
    fn error_payload_accepts_detail_aliases() {
        let payload: ErrorPayload =
            serde_json::from_value(json!({ "error": "nope", "code": "FORBIDDEN" })).unwrap();
        assert_eq!(payload.detail.as_deref(), Some("nope"));
        assert_eq!(payload.code.as_deref(), Some("FORBIDDEN"));
    }

    #[test]
    fn auth_failures_are_401_and_403() {
        assert!(ApiError::http(StatusCode::FORBIDDEN, "no").is_auth_failure());
        assert!(ApiError::http(StatusCode::UNAUTHORIZED, "no").is_auth_failure());
        assert!(!ApiError::http(StatusCode::NOT_FOUND, "no").is_auth_failure());
        assert!(!ApiError::Timeout.is_auth_failure());
    }
}
