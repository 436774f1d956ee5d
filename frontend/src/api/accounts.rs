use super::{
    client::ApiClient,
    types::{ApiError, CurrentUser},
};

pub const CURRENT_USER_PATH: &str = "/accounts/users/me/";

impl ApiClient {
    pub async fn get_current_user(&self) -> Result<CurrentUser, ApiError> {
        Ok(self.get(CURRENT_USER_PATH).await?.data)
    }
}
