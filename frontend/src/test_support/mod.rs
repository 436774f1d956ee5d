#[cfg(test)]
pub mod helpers {
    use chrono::NaiveDate;

    use crate::api::{CurrentUser, LeaveRequest, LeaveRequestId, LeaveStatus};

    pub fn admin_user() -> CurrentUser {
        CurrentUser {
            id: "u-admin".into(),
            username: "admin".into(),
            email: "admin@example.com".into(),
            first_name: "Admin".into(),
            last_name: "User".into(),
            is_superuser: Some(false),
            is_staff: Some(true),
            is_active: Some(true),
        }
    }

    pub fn regular_user() -> CurrentUser {
        CurrentUser {
            id: "u-regular".into(),
            username: "member".into(),
            email: "member@example.com".into(),
            first_name: "Regular".into(),
            last_name: "User".into(),
            is_superuser: None,
            is_staff: None,
            is_active: Some(true),
        }
    }

    pub fn leave_request(id: LeaveRequestId, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id,
            employee: Some(7),
            employee_name: Some("Regular User".into()),
            leave_type: "annual".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            reason: None,
            status,
            decision_comment: None,
            created_at: None,
        }
    }
}
