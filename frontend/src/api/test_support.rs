use httpmock::MockServer;
use serde_json::{json, Value};

use crate::api::ApiClient;

pub fn api_client(server: &MockServer) -> ApiClient {
    ApiClient::new_with_base_url(server.url("/api"))
}

pub fn current_user_json() -> Value {
    json!({
        "id": "u1",
        "username": "alice",
        "email": "a@x.com",
        "first_name": "Alice",
        "last_name": "Zeta"
    })
}

pub fn flex_type_json() -> Value {
    json!({
        "id": 1,
        "name": "Late Arrival",
        "code": "LATE",
        "duration_minutes": 30,
        "max_per_month": 3,
        "is_late": true,
        "is_early": false,
        "is_active": true
    })
}

pub fn status_choice_json(id: i64, category: &str) -> Value {
    json!({
        "id": id,
        "category": category,
        "name": format!("{} status {}", category, id),
        "color_code": "#2e7d32",
        "is_active": true
    })
}

pub fn leave_request_json(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "employee": 7,
        "employee_name": "Alice Zeta",
        "leave_type": "annual",
        "start_date": "2025-03-03",
        "end_date": "2025-03-05",
        "reason": "Family trip",
        "status": status,
        "created_at": "2025-02-20T09:30:00Z"
    })
}
