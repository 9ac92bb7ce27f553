//! Bookmark pagination against a live mock search endpoint

use super::*;
use carrier_auth::{with_json_bookmark, Grant, HttpRequest, Page};
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use wiremock::matchers::body_string_contains;

const SEARCH: &str = "/api/locations/v3/search/availabilities/64";

async fn mount_pages(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SEARCH))
        .and(body_string_contains(r#""bookmark":"page-2""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"locations": ["c"]})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEARCH))
        .and(body_string_contains(r#""bookmark":"page-1""#))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"locations": ["b"], "bookmark": "page-2"})),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEARCH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"locations": ["a"], "bookmark": "page-1"})),
        )
        .with_priority(10)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_three_pages_streamed() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;
    mount_pages(&server).await;

    let url = api_url(&server, SEARCH);
    let pages: Vec<Page> = client(&server)
        .paginate(Grant::ClientCredentials, None, move |bookmark| {
            let body = with_json_bookmark(&json!({"radius": 25}), "bookmark", bookmark);
            HttpRequest::post(url.as_str()).json(&body)
        })
        .into_stream()
        .try_collect()
        .await
        .unwrap();

    let locations: Vec<String> = pages
        .iter()
        .map(|p| p.json::<serde_json::Value>().unwrap()["locations"][0].as_str().unwrap().to_string())
        .collect();
    assert_eq!(locations, vec!["a", "b", "c"]);
    assert!(!pages[2].has_next());

    let searches = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == SEARCH)
        .count();
    assert_eq!(searches, 3);
}
