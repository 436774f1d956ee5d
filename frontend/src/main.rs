use anyhow::Context;
use hrms_frontend::{
    auth_status,
    state::reference::{active_only, group_by_category},
    use_current_user, use_flex_types, use_status_choices, ApiClient, AuthStatus, Config,
    RequestCache, SessionStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hrms_frontend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(api_base_url = %config.api_base_url, "Starting HRMS client");

    let session = match config.access_token.as_deref() {
        Some(token) => SessionStore::with_token(token),
        None => SessionStore::new(),
    };
    let client = ApiClient::from_config(&config, session).context("Failed to build HTTP client")?;
    let cache = RequestCache::from_config(&config);

    let current_user = use_current_user(&cache, &client);
    let flex_types = use_flex_types(&cache, &client);
    let status_choices = use_status_choices(&cache, &client);

    current_user.settle().await;
    let user = match auth_status(&current_user) {
        AuthStatus::Authenticated(user) => user,
        AuthStatus::Unauthenticated(Some(err)) => {
            anyhow::bail!("Not signed in: {}", err);
        }
        AuthStatus::Unauthenticated(None) | AuthStatus::Pending => {
            anyhow::bail!("Not signed in; set HRMS_ACCESS_TOKEN");
        }
    };
    tracing::info!(user = %user.username, admin = user.is_admin(), "Signed in");

    flex_types.settle().await;
    status_choices.settle().await;
    if let Some(err) = flex_types.error() {
        tracing::warn!(error = %err, "Flex allowance types unavailable");
    }
    if let Some(err) = status_choices.error() {
        tracing::warn!(error = %err, "Status choices unavailable");
    }

    let flex_types = flex_types.items();
    let choices = status_choices.items();
    let groups = group_by_category(&choices);
    tracing::info!(
        flex_types = flex_types.len(),
        active_flex_types = active_only(flex_types.as_slice(), |flex| flex.is_active).len(),
        status_categories = groups.len(),
        "Reference data loaded"
    );

    cache.close();
    Ok(())
}
