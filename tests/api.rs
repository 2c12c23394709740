use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use url::Url;

use scrawl::application::compose::{ComposeError, ComposeService};
use scrawl::application::feed::FeedService;
use scrawl::application::images::{ImageError, ImageService};
use scrawl::application::stores::{
    ContentStore, CreatedPost, ImageHost, ImagePayload, StoreError,
};
use scrawl::domain::error::DomainError;
use scrawl::domain::posts::{PostDraft, PostFields, PostRecord};
use scrawl::infra::http::{HttpState, build_router};

#[derive(Default)]
struct RecordingStore {
    drafts: Mutex<Vec<PostDraft>>,
    list: Vec<PostRecord>,
    created_id: Option<String>,
    fail_create: bool,
    fail_list: bool,
}

#[async_trait]
impl ContentStore for RecordingStore {
    async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost, StoreError> {
        if self.fail_create {
            return Err(StoreError::upstream_status(500, "mutation rejected"));
        }
        self.drafts.lock().await.push(draft.clone());
        Ok(CreatedPost {
            id: self.created_id.clone(),
        })
    }

    async fn list_posts(&self) -> Result<Vec<PostRecord>, StoreError> {
        if self.fail_list {
            return Err(StoreError::transport("connection refused"));
        }
        Ok(self.list.clone())
    }
}

struct StaticImageHost {
    url: &'static str,
    fail: bool,
}

impl StaticImageHost {
    fn ok(url: &'static str) -> Self {
        Self { url, fail: false }
    }

    fn failing() -> Self {
        Self {
            url: "https://i.ibb.co/unused.png",
            fail: true,
        }
    }
}

#[async_trait]
impl ImageHost for StaticImageHost {
    async fn upload(&self, _payload: ImagePayload) -> Result<Url, StoreError> {
        if self.fail {
            return Err(StoreError::upstream_status(400, "Invalid API key"));
        }
        Ok(Url::parse(self.url).expect("static test URL"))
    }
}

fn fields() -> PostFields {
    PostFields {
        title: "Hello".to_string(),
        body: "First\n\npost".to_string(),
        author: "Ada".to_string(),
        categories: "a, b ,c".to_string(),
        main_image: "https://i.ibb.co/x/cover.png".to_string(),
    }
}

fn record(id: &str, published_at: OffsetDateTime) -> PostRecord {
    PostRecord {
        id: id.to_string(),
        title: format!("Post {id}"),
        body: "Body".to_string(),
        author: "Ada".to_string(),
        categories: vec!["rust".to_string(), "web".to_string()],
        main_image: None,
        published_at: Some(published_at),
    }
}

fn allowed_hosts() -> Vec<String> {
    vec!["i.ibb.co".to_string()]
}

fn state_with(
    store: Arc<RecordingStore>,
    image_host: Arc<StaticImageHost>,
    allowed: Vec<String>,
) -> HttpState {
    let allowed = Arc::new(allowed);
    HttpState {
        feed: Arc::new(FeedService::new(store.clone())),
        compose: Arc::new(ComposeService::new(store, allowed.clone())),
        images: Arc::new(ImageService::new(image_host)),
        allowed_image_hosts: allowed,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn create_post_sends_one_normalized_mutation() {
    let store = Arc::new(RecordingStore::default());
    let service = ComposeService::new(store.clone(), Arc::new(allowed_hosts()));

    let before = OffsetDateTime::now_utc();
    let created = service.create_post(fields()).await.expect("post created");
    assert_eq!(created, CreatedPost { id: None });

    let drafts = store.drafts.lock().await;
    assert_eq!(drafts.len(), 1);
    let draft = &drafts[0];
    assert_eq!(draft.categories, vec!["a", "b", "c"]);
    assert_eq!(draft.body, "First\n\npost");
    assert!(draft.published_at >= before);
}

#[tokio::test]
async fn create_post_rejects_missing_required_field() {
    let store = Arc::new(RecordingStore::default());
    let service = ComposeService::new(store.clone(), Arc::new(allowed_hosts()));

    let mut input = fields();
    input.title = "  ".to_string();

    let err = service.create_post(input).await.expect_err("must fail");
    assert!(matches!(
        err,
        ComposeError::Domain(DomainError::Validation { .. })
    ));
    assert!(store.drafts.lock().await.is_empty());
}

#[tokio::test]
async fn create_post_rejects_unlisted_image_host() {
    let store = Arc::new(RecordingStore::default());
    let service = ComposeService::new(store.clone(), Arc::new(allowed_hosts()));

    let mut input = fields();
    input.main_image = "https://evil.example/cover.png".to_string();

    let err = service.create_post(input).await.expect_err("must fail");
    assert!(matches!(err, ComposeError::Domain(_)));
    assert!(store.drafts.lock().await.is_empty());
}

#[tokio::test]
async fn create_post_surfaces_store_failure() {
    let store = Arc::new(RecordingStore {
        fail_create: true,
        ..RecordingStore::default()
    });
    let service = ComposeService::new(store.clone(), Arc::new(allowed_hosts()));

    let err = service.create_post(fields()).await.expect_err("must fail");
    assert!(matches!(err, ComposeError::Store(_)));
    assert!(store.drafts.lock().await.is_empty());
}

#[tokio::test]
async fn feed_degrades_to_empty_list_on_store_failure() {
    let store = Arc::new(RecordingStore {
        fail_list: true,
        ..RecordingStore::default()
    });
    let feed = FeedService::new(store);
    assert!(feed.load_posts().await.is_empty());
}

#[tokio::test]
async fn feed_orders_posts_newest_first() {
    let store = Arc::new(RecordingStore {
        list: vec![
            record("old", datetime!(2024-01-01 00:00 UTC)),
            record("new", datetime!(2025-01-01 00:00 UTC)),
        ],
        ..RecordingStore::default()
    });
    let feed = FeedService::new(store);

    let posts = feed.load_posts().await;
    let order: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(order, vec!["new", "old"]);
}

#[tokio::test]
async fn image_upload_returns_public_url() {
    let service = ImageService::new(Arc::new(StaticImageHost::ok(
        "https://i.ibb.co/abc/cover.png",
    )));
    let url = service
        .upload(ImagePayload {
            filename: "cover.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: b"PNGDATA".as_ref().into(),
        })
        .await
        .expect("upload succeeds");
    assert_eq!(url.as_str(), "https://i.ibb.co/abc/cover.png");
}

#[tokio::test]
async fn image_upload_rejects_empty_file() {
    let service = ImageService::new(Arc::new(StaticImageHost::ok(
        "https://i.ibb.co/abc/cover.png",
    )));
    let err = service
        .upload(ImagePayload {
            filename: "cover.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: bytes::Bytes::new(),
        })
        .await
        .expect_err("must fail");
    assert!(matches!(err, ImageError::Domain(_)));
}

#[tokio::test]
async fn image_upload_maps_host_failure() {
    let service = ImageService::new(Arc::new(StaticImageHost::failing()));
    let err = service
        .upload(ImagePayload {
            filename: "cover.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: b"PNGDATA".as_ref().into(),
        })
        .await
        .expect_err("must fail");
    assert!(matches!(err, ImageError::Host(_)));
}

#[tokio::test]
async fn index_renders_placeholder_when_store_is_empty() {
    let state = state_with(
        Arc::new(RecordingStore::default()),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/a/b.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("No posts yet"));
}

#[tokio::test]
async fn index_renders_one_card_per_post_with_tags() {
    let state = state_with(
        Arc::new(RecordingStore {
            list: vec![
                record("a", datetime!(2025-01-01 00:00 UTC)),
                record("b", datetime!(2025-02-01 00:00 UTC)),
            ],
            ..RecordingStore::default()
        }),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/a/b.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert_eq!(html.matches("<article class=\"card\">").count(), 2);
    assert!(html.contains("#rust"));
    assert!(html.contains("#web"));
    assert!(!html.contains("No posts yet"));
}

#[tokio::test]
async fn index_still_renders_when_store_query_fails() {
    let state = state_with(
        Arc::new(RecordingStore {
            fail_list: true,
            ..RecordingStore::default()
        }),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/a/b.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("No posts yet"));
}

#[tokio::test]
async fn create_post_endpoint_echoes_store_assigned_id() {
    let store = Arc::new(RecordingStore {
        created_id: Some("abc123".to_string()),
        ..RecordingStore::default()
    });
    let state = state_with(
        store.clone(),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/a/b.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/createPost")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "title": "Hello",
                        "body": "First post",
                        "author": "Ada",
                        "categories": "rust, web",
                        "mainImage": "https://i.ibb.co/x/cover.png"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["id"], "abc123");
    assert_eq!(store.drafts.lock().await.len(), 1);
}

#[tokio::test]
async fn create_post_endpoint_rejects_invalid_fields() {
    let state = state_with(
        Arc::new(RecordingStore::default()),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/a/b.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/createPost")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "title": "",
                        "body": "First post",
                        "author": "Ada",
                        "categories": "rust",
                        "mainImage": "https://i.ibb.co/x/cover.png"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid post fields");
}

#[tokio::test]
async fn create_post_endpoint_maps_store_failure_to_generic_500() {
    let state = state_with(
        Arc::new(RecordingStore {
            fail_create: true,
            ..RecordingStore::default()
        }),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/a/b.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/createPost")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "title": "Hello",
                        "body": "First post",
                        "author": "Ada",
                        "categories": "rust",
                        "mainImage": "https://i.ibb.co/x/cover.png"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to create post");
    assert!(json.get("detail").is_none());
}

fn multipart_body(boundary: &str, field_name: &str) -> String {
    format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field_name}\"; filename=\"cover.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         PNGDATA\r\n\
         --{boundary}--\r\n"
    )
}

#[tokio::test]
async fn upload_endpoint_returns_url_for_image_field() {
    let state = state_with(
        Arc::new(RecordingStore::default()),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/abc/cover.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let boundary = "scrawl-test-boundary";
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploadImage")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart_body(boundary, "image")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["url"], "https://i.ibb.co/abc/cover.png");
}

#[tokio::test]
async fn upload_endpoint_requires_an_image_field() {
    let state = state_with(
        Arc::new(RecordingStore::default()),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/abc/cover.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let boundary = "scrawl-test-boundary";
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploadImage")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart_body(boundary, "attachment")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_endpoint_maps_host_failure_to_bad_gateway() {
    let state = state_with(
        Arc::new(RecordingStore::default()),
        Arc::new(StaticImageHost::failing()),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let boundary = "scrawl-test-boundary";
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploadImage")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart_body(boundary, "image")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Image upload failed");
}

#[tokio::test]
async fn health_endpoint_answers_no_content() {
    let state = state_with(
        Arc::new(RecordingStore::default()),
        Arc::new(StaticImageHost::ok("https://i.ibb.co/a/b.png")),
        allowed_hosts(),
    );
    let app = build_router(state, 1024 * 1024);

    let response = app
        .oneshot(Request::builder().uri("/_health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
