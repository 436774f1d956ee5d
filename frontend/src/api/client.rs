use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::Instrument;

use crate::{
    api::types::{ApiError, ApiResponse, ErrorPayload},
    config::Config,
    utils::storage::SessionStore,
};

/// Single point of HTTP egress for every accessor.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    pub fn new_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: normalize_base_url(base_url.into()),
            session: SessionStore::new(),
        }
    }

    pub fn from_config(config: &Config, session: SessionStore) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ApiError::from_transport)?;
        Ok(Self {
            client,
            base_url: normalize_base_url(config.api_base_url.clone()),
            session,
        })
    }

    pub fn with_session(mut self, session: SessionStore) -> Self {
        self.session = session;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ApiError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::from_transport)?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.execute(Method::GET, path, |request| request).await
    }

    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<ApiResponse<T>, ApiError> {
        self.execute(Method::GET, path, |request| {
            if params.is_empty() {
                request
            } else {
                request.query(params)
            }
        })
        .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, |request| request.json(body))
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::PUT, path, |request| request.json(body))
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::PATCH, path, |request| request.json(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.execute(Method::DELETE, path, |request| request).await
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn attach_credentials(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.access_token() {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    fn handle_unauthorized_status(&self, status: StatusCode) {
        if status == StatusCode::UNAUTHORIZED && self.session.is_authenticated() {
            tracing::warn!("Session rejected by the server; clearing stored credential");
            self.session.clear();
        }
    }

    async fn execute<T, F>(
        &self,
        method: Method,
        path: &str,
        build: F,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let span = tracing::debug_span!("api_request", method = %method, path);
        let request = build(self.attach_credentials(self.client.request(method, self.url(path))));

        async move {
            let response = request.send().await.map_err(|err| {
                let err = ApiError::from_transport(err);
                tracing::warn!(error = %err, "HTTP request did not complete");
                err
            })?;

            let status = response.status();
            self.handle_unauthorized_status(status);
            let body = response.bytes().await.map_err(ApiError::from_transport)?;

            if !status.is_success() {
                let err = error_from_body(status, &body);
                tracing::warn!(status = status.as_u16(), error = %err, "HTTP request failed");
                return Err(err);
            }

            tracing::debug!(status = status.as_u16(), bytes = body.len(), "HTTP request succeeded");
            let data = decode_body(&body)?;
            Ok(ApiResponse { data, status })
        }
        .instrument(span)
        .await
    }
}

fn normalize_base_url(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body: &[u8] = if body.is_empty() { b"null" } else { body };
    serde_json::from_slice(body).map_err(|err| ApiError::Parse(err.to_string()))
}

fn error_from_body(status: StatusCode, body: &[u8]) -> ApiError {
    let payload = serde_json::from_slice::<ErrorPayload>(body).unwrap_or_default();
    let message = payload.detail.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });
    ApiError::Http {
        status: status.as_u16(),
        message,
        code: payload.code,
    }
}
