use super::{
    client::ApiClient,
    types::{ApiError, FlexType},
};

pub const FLEX_TYPES_PATH: &str = "/policies/flex-allowance-types/";

impl ApiClient {
    /// Flex-allowance types in the order the server returned them.
    pub async fn list_flex_types(&self) -> Result<Vec<FlexType>, ApiError> {
        Ok(self.get(FLEX_TYPES_PATH).await?.data)
    }
}
