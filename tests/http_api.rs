use std::time::Duration;

use drafthouse::application::api::{ApiError, BlogApi};
use drafthouse::domain::types::DraftId;
use drafthouse::infra::{blog_api::HttpBlogApi, credentials::CredentialSource};
use drafthouse_api_types::{BlogPostPayload, PostStatus};
use httpmock::MockServer;
use serde_json::json;

fn client(server: &MockServer) -> HttpBlogApi {
    HttpBlogApi::new(
        &server.base_url(),
        CredentialSource::from_token("key"),
        Duration::from_secs(5),
    )
    .expect("client")
}

#[tokio::test]
async fn create_draft_posts_title_with_bearer_key() -> Result<(), ApiError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/blogs")
            .header("authorization", "Bearer key")
            .json_body(json!({"title": "Hello", "content": "", "status": "draft"}));
        then.status(201)
            .header("content-type", "application/json")
            .body(r#"{"id":"d1","message":"Draft created"}"#);
    });

    let created = client(&server).create_draft("Hello").await?;
    mock.assert();
    assert_eq!(created.id, "d1");
    Ok(())
}

#[tokio::test]
async fn create_draft_without_id_is_a_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/blogs");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":""}"#);
    });

    let err = client(&server)
        .create_draft("Hello")
        .await
        .expect_err("empty id");
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn update_puts_payload_with_id_query() -> Result<(), ApiError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("PUT")
            .path("/blogs")
            .query_param("id", "d1")
            .header("authorization", "Bearer key")
            .json_body(json!({
                "title": "Hello",
                "content": "<p>Hi</p>",
                "images": ["posts/d1/image_0.png"],
                "status": "published"
            }));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":"d1","title":"Hello","content":"<p>Hi</p>","status":"published"}"#);
    });

    let payload = BlogPostPayload {
        title: "Hello".into(),
        content: "<p>Hi</p>".into(),
        images: vec!["posts/d1/image_0.png".into()],
        status: PostStatus::Published,
    };
    let post = client(&server)
        .update_post(&DraftId::from("d1"), &payload)
        .await?;
    mock.assert();
    assert_eq!(post.status.as_deref(), Some("published"));
    Ok(())
}

#[tokio::test]
async fn get_post_reads_by_path_id() -> Result<(), ApiError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/blogs/d1");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":"d1","title":"Old","content":"<p>x</p>"}"#);
    });

    let post = client(&server).get_post(&DraftId::from("d1")).await?;
    mock.assert();
    assert_eq!(post.title, "Old");
    Ok(())
}

#[tokio::test]
async fn missing_route_maps_to_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/blogs/nope");
        then.status(404)
            .header("content-type", "application/json")
            .body(r#"{"message":"Blog not found."}"#);
    });

    let err = client(&server)
        .get_post(&DraftId::from("nope"))
        .await
        .expect_err("not found");
    assert_eq!(
        err,
        ApiError::NotFound {
            path: "/blogs/nope".into()
        }
    );
}

#[tokio::test]
async fn server_errors_carry_the_body_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("PUT").path("/blogs");
        then.status(500)
            .header("content-type", "application/json")
            .body(r#"{"error":"database unavailable"}"#);
    });

    let payload = BlogPostPayload {
        title: "Hello".into(),
        content: String::new(),
        images: Vec::new(),
        status: PostStatus::Draft,
    };
    let err = client(&server)
        .update_post(&DraftId::from("d1"), &payload)
        .await
        .expect_err("rejected");
    assert_eq!(
        err,
        ApiError::Rejected {
            status: 500,
            message: "database unavailable".into()
        }
    );
}

#[tokio::test]
async fn requests_without_key_never_leave_the_process() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/blogs");
        then.status(200).body(r#"{"id":"d1"}"#);
    });

    let api = HttpBlogApi::new(
        &server.base_url(),
        CredentialSource::none(),
        Duration::from_secs(5),
    )
    .expect("client");
    assert_eq!(api.ensure_credential(), Err(ApiError::MissingCredential));
    let err = api.create_draft("Hello").await.expect_err("no key");
    assert_eq!(err, ApiError::MissingCredential);
    mock.assert_calls(0);
}

#[tokio::test]
async fn presign_then_put_object() -> Result<(), ApiError> {
    let server = MockServer::start();
    let upload_url = server.url("/bucket/posts/d1/image_0.png");
    let presign = server.mock(|when, then| {
        when.method("GET")
            .path("/get-presigned-url")
            .query_param("fileName", "posts/d1/image_0.png")
            .header("authorization", "Bearer key");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "presignedUrl": upload_url,
                "publicUrl": "https://cdn.example.com/posts/d1/image_0.png",
                "fileName": "posts/d1/image_0.png"
            }));
    });
    let put = server.mock(|when, then| {
        when.method("PUT")
            .path("/bucket/posts/d1/image_0.png")
            .header("content-type", "image/png")
            .body("png-bytes");
        then.status(200);
    });

    let api = client(&server);
    let presigned = api.presign_upload("posts/d1/image_0.png").await?;
    api.upload_object(&presigned.presigned_url, "image/png", b"png-bytes".to_vec())
        .await?;

    presign.assert();
    put.assert();
    assert_eq!(
        presigned.public_url,
        "https://cdn.example.com/posts/d1/image_0.png"
    );
    Ok(())
}
