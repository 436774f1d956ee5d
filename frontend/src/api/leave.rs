use super::{
    client::ApiClient,
    types::{ApiError, CreateLeaveRequest, LeaveDecision, LeaveRequest, LeaveRequestId},
};

pub const LEAVE_REQUESTS_PATH: &str = "/leave/requests/";

fn leave_action_path(id: LeaveRequestId, action: &str) -> String {
    format!("{}{}/{}/", LEAVE_REQUESTS_PATH, id, action)
}

impl ApiClient {
    pub async fn list_leave_requests(&self) -> Result<Vec<LeaveRequest>, ApiError> {
        Ok(self.get(LEAVE_REQUESTS_PATH).await?.data)
    }

    pub async fn create_leave_request(
        &self,
        payload: &CreateLeaveRequest,
    ) -> Result<LeaveRequest, ApiError> {
        Ok(self.post(LEAVE_REQUESTS_PATH, payload).await?.data)
    }

    pub async fn approve_leave_request(
        &self,
        id: LeaveRequestId,
        comment: Option<String>,
    ) -> Result<LeaveRequest, ApiError> {
        self.decide_leave_request(id, "approve", comment).await
    }

    pub async fn reject_leave_request(
        &self,
        id: LeaveRequestId,
        comment: Option<String>,
    ) -> Result<LeaveRequest, ApiError> {
        self.decide_leave_request(id, "reject", comment).await
    }

    pub async fn cancel_leave_request(&self, id: LeaveRequestId) -> Result<LeaveRequest, ApiError> {
        self.decide_leave_request(id, "cancel", None).await
    }

    async fn decide_leave_request(
        &self,
        id: LeaveRequestId,
        action: &str,
        comment: Option<String>,
    ) -> Result<LeaveRequest, ApiError> {
        let decision = LeaveDecision { comment };
        Ok(self
            .post(&leave_action_path(id, action), &decision)
            .await?
            .data)
    }
}
