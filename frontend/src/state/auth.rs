use std::sync::Arc;

use crate::{
    api::{ApiClient, ApiError, CurrentUser, CURRENT_USER_PATH},
    state::cache::{CacheKey, CachePolicy, RequestCache, Snapshot, UseResource},
    utils::storage::SessionStore,
};

pub fn current_user_key() -> CacheKey {
    CacheKey::new(CURRENT_USER_PATH)
}

/// Mounts the signed-in user. Focus and reconnect never refetch identity;
/// use `revalidate` after anything that changes it.
pub fn use_current_user(cache: &RequestCache, client: &ApiClient) -> UseResource<CurrentUser> {
    let client = client.clone();
    cache.use_resource(
        current_user_key(),
        CachePolicy::identity().with_dedupe_interval(cache.dedupe_interval()),
        move || {
            let client = client.clone();
            async move { client.get_current_user().await }
        },
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn of(user: &CurrentUser) -> Self {
        if user.is_admin() {
            Role::Admin
        } else {
            Role::Employee
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthStatus {
    Pending,
    Authenticated(Arc<CurrentUser>),
    Unauthenticated(Option<ApiError>),
}

impl AuthStatus {
    /// A rejected credential always means signed out. Other failures keep a
    /// previously resolved user, since identity does not change on a network blip.
    pub fn from_snapshot(snapshot: &Snapshot<CurrentUser>) -> Self {
        match (&snapshot.data, &snapshot.error) {
            (_, Some(err)) if err.is_auth_failure() => {
                AuthStatus::Unauthenticated(Some(err.clone()))
            }
            (Some(user), _) => AuthStatus::Authenticated(Arc::clone(user)),
            (None, Some(err)) => AuthStatus::Unauthenticated(Some(err.clone())),
            (None, None) if snapshot.is_loading => AuthStatus::Pending,
            (None, None) => AuthStatus::Unauthenticated(None),
        }
    }

    pub fn user(&self) -> Option<&Arc<CurrentUser>> {
        match self {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(|user| Role::of(user))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated(_))
    }
}

pub fn auth_status(current_user: &UseResource<CurrentUser>) -> AuthStatus {
    AuthStatus::from_snapshot(&current_user.snapshot())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAccess {
    Authenticated,
    Admin,
}

pub const LOGIN_ROUTE: &str = "/login";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Where a role-gated route should send the visitor, or `None` to render it.
/// Nothing redirects while identity is still resolving.
pub fn redirect_target(status: &AuthStatus, access: RouteAccess) -> Option<&'static str> {
    match status {
        AuthStatus::Pending => None,
        AuthStatus::Unauthenticated(_) => Some(LOGIN_ROUTE),
        AuthStatus::Authenticated(user) => match access {
            RouteAccess::Admin if Role::of(user) != Role::Admin => Some(DASHBOARD_ROUTE),
            _ => None,
        },
    }
}

/// Drops the stored credential and the cached identity.
pub fn logout(cache: &RequestCache, session: &SessionStore) {
    tracing::info!("Signing out");
    session.clear();
    cache.invalidate(&current_user_key());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{admin_user, regular_user};

    fn snapshot(
        data: Option<CurrentUser>,
        error: Option<ApiError>,
        is_loading: bool,
    ) -> Snapshot<CurrentUser> {
        Snapshot {
            data: data.map(Arc::new),
            error,
            is_loading,
            last_fetched_at: None,
        }
    }

    #[test]
    fn role_follows_staff_and_superuser_flags() {
        assert_eq!(Role::of(&admin_user()), Role::Admin);
        assert_eq!(Role::of(&regular_user()), Role::Employee);
    }

    #[test]
    fn loading_without_data_is_pending() {
        let status = AuthStatus::from_snapshot(&snapshot(None, None, true));
        assert_eq!(status, AuthStatus::Pending);
        assert_eq!(redirect_target(&status, RouteAccess::Admin), None);
    }

    #[test]
    fn forbidden_identity_is_unauthenticated_even_with_stale_user() {
        let err = ApiError::Http {
            status: 401,
            message: "expired".into(),
            code: None,
        };
        let status = AuthStatus::from_snapshot(&snapshot(Some(regular_user()), Some(err), false));
        assert!(!status.is_authenticated());
        assert_eq!(
            redirect_target(&status, RouteAccess::Authenticated),
            Some(LOGIN_ROUTE)
        );
    }

    #[test]
    fn network_blip_keeps_resolved_user() {
        let err = ApiError::Network("offline".into());
        let status = AuthStatus::from_snapshot(&snapshot(Some(regular_user()), Some(err), false));
        assert_eq!(status.role(), Some(Role::Employee));
    }

    #[test]
    fn employee_is_sent_to_dashboard_from_admin_routes() {
        let employee = AuthStatus::Authenticated(Arc::new(regular_user()));
        assert_eq!(
            redirect_target(&employee, RouteAccess::Admin),
            Some(DASHBOARD_ROUTE)
        );
        assert_eq!(redirect_target(&employee, RouteAccess::Authenticated), None);

        let admin = AuthStatus::Authenticated(Arc::new(admin_user()));
        assert_eq!(redirect_target(&admin, RouteAccess::Admin), None);
    }
}

#[cfg(test)]
mod host_tests {
    use super::*;
    use crate::api::test_support::{api_client, current_user_json};
    use httpmock::prelude::*;
    use std::time::Duration;

    #[tokio::test]
    async fn current_user_resolves_and_ignores_focus() {
        let server = MockServer::start_async().await;
        let me = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/accounts/users/me/");
                then.status(200).json_body(current_user_json());
            })
            .await;

        let cache = RequestCache::new(Duration::ZERO);
        let client = api_client(&server);
        let current_user = use_current_user(&cache, &client);
        let snapshot = current_user.settle().await;
        let user = snapshot.data.expect("current user");
        assert_eq!(user.username, "alice");

        cache.dispatch(crate::state::cache::RevalidateEvent::Focus);
        cache.dispatch(crate::state::cache::RevalidateEvent::Reconnect);
        current_user.settle().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(me.hits_async().await, 1);
        assert!(auth_status(&current_user).is_authenticated());
    }

    #[tokio::test]
    async fn rejected_session_is_unauthenticated() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/accounts/users/me/");
                then.status(401)
                    .json_body(serde_json::json!({
                        "detail": "Authentication credentials were not provided."
                    }));
            })
            .await;

        let cache = RequestCache::default();
        let client = api_client(&server);
        client.session().set_access_token("expired");
        let current_user = use_current_user(&cache, &client);
        current_user.settle().await;

        let status = auth_status(&current_user);
        assert!(matches!(
            status,
            AuthStatus::Unauthenticated(Some(ref err)) if err.status() == Some(401)
        ));
        assert_eq!(
            redirect_target(&status, RouteAccess::Authenticated),
            Some(LOGIN_ROUTE)
        );
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_identity_and_credential() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/accounts/users/me/");
                then.status(200).json_body(current_user_json());
            })
            .await;

        let cache = RequestCache::default();
        let session = SessionStore::with_token("token-1");
        let client = api_client(&server).with_session(session.clone());
        let current_user = use_current_user(&cache, &client);
        current_user.settle().await;
        assert!(auth_status(&current_user).is_authenticated());

        logout(&cache, &session);
        assert!(!session.is_authenticated());
        assert_eq!(auth_status(&current_user), AuthStatus::Unauthenticated(None));
    }
}
