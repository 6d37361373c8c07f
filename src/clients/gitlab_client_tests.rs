use super::GitLabClient;
use crate::clients::ReviewServer;
use crate::errors::ReviewError;
use crate::types::{MergeOptions, MergeRequestUpdate, NewMergeRequest, PipelineStatus};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn client(server: &MockServer) -> GitLabClient {
    GitLabClient::new(&server.base_url(), "42", "test_token")
        .unwrap()
        .with_retry(2, Duration::from_millis(1))
}

fn mr_json(iid: u64, description: &str) -> serde_json::Value {
    json!({
        "iid": iid,
        "title": "Draft: autobot: Update foo",
        "description": description,
        "source_branch": "scheduled/bot/foo",
        "target_branch": "main",
        "labels": ["AUTOBOT", "SKIP_CHANGELOG"],
        "sha": "abc123",
        "merge_status": "can_be_merged"
    })
}

#[test]
fn test_project_path_is_encoded() {
    let client = GitLabClient::new("https://gitlab.example.com/", "group/sub/project", "t").unwrap();
    let url = client.project_url(&["merge_requests", "7"]).unwrap();
    assert_eq!(
        url.as_str(),
        "https://gitlab.example.com/api/v4/projects/group%2Fsub%2Fproject/merge_requests/7"
    );
}

#[test]
fn test_invalid_server_url() {
    assert!(matches!(
        GitLabClient::new("not a url", "1", "t"),
        Err(ReviewError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn test_open_merge_requests_follows_pages() {
    let server = MockServer::start_async().await;
    let page1 = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v4/projects/42/merge_requests")
                .query_param("state", "opened")
                .query_param("page", "1")
                .header("PRIVATE-TOKEN", "test_token");
            then.status(200)
                .header("x-next-page", "2")
                .json_body(json!([mr_json(1, "a")]));
        })
        .await;
    let page2 = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v4/projects/42/merge_requests")
                .query_param("page", "2");
            then.status(200)
                .header("x-next-page", "")
                .json_body(json!([mr_json(2, "b"), mr_json(3, "c")]));
        })
        .await;

    let mrs = client(&server).open_merge_requests().await.unwrap();
    page1.assert_async().await;
    page2.assert_async().await;
    assert_eq!(mrs.iter().map(|m| m.iid).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(mrs[0].sha.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_create_merge_request_sends_labels() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v4/projects/42/merge_requests")
                .json_body(json!({
                    "source_branch": "scheduled/bot/foo",
                    "target_branch": "main",
                    "title": "Draft: autobot: Update foo",
                    "labels": "AUTOBOT,SKIP_CHANGELOG",
                    "description": "BEGIN_ID:https://x/foo.git:END_ID"
                }));
            then.status(201)
                .json_body(mr_json(9, "BEGIN_ID:https://x/foo.git:END_ID"));
        })
        .await;

    let request = NewMergeRequest {
        source_branch: "scheduled/bot/foo".to_string(),
        target_branch: "main".to_string(),
        title: "Draft: autobot: Update foo".to_string(),
        labels: vec!["AUTOBOT".to_string(), "SKIP_CHANGELOG".to_string()],
        description: "BEGIN_ID:https://x/foo.git:END_ID".to_string(),
    };
    let mr = client(&server).create_merge_request(&request).await.unwrap();
    create.assert_async().await;
    assert_eq!(mr.iid, 9);
}

#[tokio::test]
async fn test_update_approve_and_merge() {
    let server = MockServer::start_async().await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/v4/projects/42/merge_requests/5")
                .json_body(json!({"add_labels": "SKIP_AUTOBOT"}));
            then.status(200).json_body(mr_json(5, ""));
        })
        .await;
    let approve = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v4/projects/42/merge_requests/5/approve");
            then.status(201).json_body(json!({}));
        })
        .await;
    let merge = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/v4/projects/42/merge_requests/5/merge")
                .json_body(json!({
                    "merge_when_pipeline_succeeds": true,
                    "should_remove_source_branch": true
                }));
            then.status(200).json_body(json!({}));
        })
        .await;

    let client = client(&server);
    client
        .update_merge_request(
            5,
            &MergeRequestUpdate {
                add_labels: Some(vec!["SKIP_AUTOBOT".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    client.approve_merge_request(5).await.unwrap();
    client
        .merge_merge_request(
            5,
            &MergeOptions {
                merge_when_pipeline_succeeds: true,
                should_remove_source_branch: true,
            },
        )
        .await
        .unwrap();

    update.assert_async().await;
    approve.assert_async().await;
    merge.assert_async().await;
}

#[tokio::test]
async fn test_pipelines_and_commits() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v4/projects/42/merge_requests/5/pipelines");
            then.status(200).json_body(json!([
                {"id": 2, "sha": "new", "status": "running"},
                {"id": 1, "sha": "old", "status": "failed"}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v4/projects/42/merge_requests/5/commits");
            then.status(200).json_body(json!([
                {"id": "c1", "author_name": "autobot", "title": "autobot: Update foo"}
            ]));
        })
        .await;

    let client = client(&server);
    let pipelines = client.merge_request_pipelines(5).await.unwrap();
    assert_eq!(pipelines[0].status, PipelineStatus::Running);
    assert_eq!(pipelines[1].status, PipelineStatus::Failed);
    let commits = client.merge_request_commits(5).await.unwrap();
    assert_eq!(commits[0].author_name, "autobot");
}

#[tokio::test]
async fn test_authentication_error_401_is_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(401);
        })
        .await;

    let result = client(&server).merge_request(1).await;
    assert!(matches!(result, Err(ReviewError::AuthenticationError)));
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_not_found_404() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(404);
        })
        .await;

    let result = client(&server).merge_request(77).await;
    match result {
        Err(ReviewError::NotFound(path)) => assert!(path.ends_with("/merge_requests/77")),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_500_is_retried_then_reported() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(500).body("boom");
        })
        .await;

    let result = client(&server).merge_request(1).await;
    match result {
        Err(ReviewError::ServerError {
            status_code,
            message,
        }) => {
            assert_eq!(status_code, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("Expected ServerError, got {:?}", other),
    }
    assert_eq!(mock.hits_async().await, 2);
}

#[tokio::test]
async fn test_parse_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).body("this is not json");
        })
        .await;

    let result = client(&server).merge_request(1).await;
    assert!(matches!(result, Err(ReviewError::ParseError(_))));
}

#[tokio::test]
async fn test_post_is_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(503);
        })
        .await;

    let result = client(&server).approve_merge_request(3).await;
    assert!(matches!(
        result,
        Err(ReviewError::ServerError { status_code: 503, .. })
    ));
    assert_eq!(mock.hits_async().await, 1);
}
