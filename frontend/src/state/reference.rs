//! Reference-data hooks: flex-allowance types and status choices.
//!
//! These lists change rarely but are cheap to refetch, so they keep the
//! default focus/reconnect revalidation. A failed fetch degrades to an empty
//! list through [`UseResource::items`] while `error()` stays visible.

use std::collections::BTreeMap;

use crate::{
    api::{ApiClient, FlexType, StatusChoice, FLEX_TYPES_PATH, STATUS_CHOICES_PATH},
    state::cache::{CacheKey, CachePolicy, RequestCache, UseResource},
};

fn reference_policy(cache: &RequestCache) -> CachePolicy {
    CachePolicy::default().with_dedupe_interval(cache.dedupe_interval())
}

pub fn use_flex_types(cache: &RequestCache, client: &ApiClient) -> UseResource<Vec<FlexType>> {
    let client = client.clone();
    cache.use_resource(CacheKey::new(FLEX_TYPES_PATH), reference_policy(cache), move || {
        let client = client.clone();
        async move { client.list_flex_types().await }
    })
}

pub fn use_status_choices(
    cache: &RequestCache,
    client: &ApiClient,
) -> UseResource<Vec<StatusChoice>> {
    let client = client.clone();
    cache.use_resource(
        CacheKey::new(STATUS_CHOICES_PATH),
        reference_policy(cache),
        move || {
            let client = client.clone();
            async move { client.list_status_choices().await }
        },
    )
}

/// Groups choices by category for dropdowns, keeping server order inside each group.
pub fn group_by_category(choices: &[StatusChoice]) -> BTreeMap<&str, Vec<&StatusChoice>> {
    let mut groups: BTreeMap<&str, Vec<&StatusChoice>> = BTreeMap::new();
    for choice in choices {
        groups.entry(choice.category.as_str()).or_default().push(choice);
    }
    groups
}

pub fn active_only<T, F>(items: &[T], is_active: F) -> Vec<&T>
where
    F: Fn(&T) -> bool,
{
    items.iter().filter(|item| is_active(item)).collect()
}


#[cfg(test)]
mod host_tests {
    use super::*;
    use crate::api::{
        test_support::{api_client, flex_type_json, status_choice_json},
        ApiError,
    };
    use httpmock::prelude::*;
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_mounts_issue_one_request() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/policies/flex-allowance-types/");
                then.status(200)
                    .delay(Duration::from_millis(100))
                    .json_body(serde_json::json!([flex_type_json()]));
            })
            .await;

        let cache = RequestCache::default();
        let client = api_client(&server);
        let mounts: Vec<_> = (0..4).map(|_| use_flex_types(&cache, &client)).collect();
        for mount in &mounts {
            let snapshot = mount.settle().await;
            assert_eq!(snapshot.data.expect("flex types")[0].code, "LATE");
        }
        assert_eq!(list.hits_async().await, 1);
    }

    #[tokio::test]
    async fn reference_data_refetches_on_focus() {
        let server = MockServer::start_async().await;
        let list = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/common/status-choices/");
                then.status(200)
                    .json_body(serde_json::json!([status_choice_json(1, "leave")]));
            })
            .await;

        let cache = RequestCache::new(Duration::ZERO);
        let client = api_client(&server);
        let choices = use_status_choices(&cache, &client);
        choices.settle().await;

        cache.dispatch(crate::state::cache::RevalidateEvent::Focus);
        choices.settle().await;
        assert_eq!(list.hits_async().await, 2);
        assert_eq!(choices.items().len(), 1);
    }

    #[tokio::test]
    async fn failed_reference_fetch_degrades_to_empty_list() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/common/status-choices/");
                then.status(500).body("boom");
            })
            .await;

        let cache = RequestCache::default();
        let choices = use_status_choices(&cache, &api_client(&server));
        choices.settle().await;

        assert!(choices.items().is_empty());
        assert!(matches!(
            choices.error(),
            Some(ApiError::Http { status: 500, .. })
        ));
    }
}
