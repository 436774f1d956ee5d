use super::{
    client::ApiClient,
    types::{ApiError, StatusChoice},
};

pub const STATUS_CHOICES_PATH: &str = "/common/status-choices/";

impl ApiClient {
    pub async fn list_status_choices(&self) -> Result<Vec<StatusChoice>, ApiError> {
        Ok(self.get(STATUS_CHOICES_PATH).await?.data)
    }
}
