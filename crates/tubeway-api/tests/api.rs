use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use tubeway_api::auth::{TokenConfig, hash_password, issue_access_token};
use tubeway_api::media::DiskMediaStore;
use tubeway_api::{AppState, AppStateInner, router};
use tubeway_db::models::to_document;
use tubeway_db::{Collection, Database, DocumentStore};
use tubeway_types::models::{Comment, User, Video};

struct TestApp {
    app: Router,
    state: AppState,
    media_root: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.media_root);
    }
}

fn test_app() -> TestApp {
    let media_root = std::env::temp_dir().join(format!("tubeway-api-{}", Uuid::new_v4()));
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        media: Arc::new(DiskMediaStore::new(&media_root, "http://localhost:8000")),
        tokens: TokenConfig {
            access_secret: "test-access-secret".into(),
            access_ttl_secs: 300,
            refresh_secret: "test-refresh-secret".into(),
            refresh_ttl_secs: 3000,
        },
    });
    TestApp {
        app: router(state.clone()),
        state,
        media_root,
    }
}

impl TestApp {
    /// Insert a user directly and return it with a valid access token.
    fn user(&self, username: &str) -> (User, String) {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            full_name: format!("{} Example", username),
            avatar: format!("http://localhost:8000/media/image/{}.png", username),
            avatar_public_id: format!("image/{}.png", username),
            cover_image: String::new(),
            cover_image_public_id: None,
            watch_history: Vec::new(),
            password: hash_password("password123").unwrap(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        self.state.db.create_user(&user).unwrap();
        let token = issue_access_token(&self.state.tokens, &user).unwrap();
        (user, token)
    }

    fn video(&self, owner: &User, title: &str, age_secs: i64) -> Video {
        let at = Utc::now() - Duration::seconds(age_secs);
        let video = Video {
            id: Uuid::new_v4(),
            owner: owner.id,
            title: title.to_string(),
            description: format!("About {}", title),
            video_file: "http://localhost:8000/media/video/v.mp4".into(),
            video_file_public_id: "video/v.mp4".into(),
            thumbnail: "http://localhost:8000/media/image/t.png".into(),
            thumbnail_public_id: "image/t.png".into(),
            duration: 12.5,
            views: 0,
            is_published: true,
            created_at: at,
            updated_at: at,
        };
        self.state.db.insert(Collection::Videos, to_document(&video).unwrap()).unwrap();
        video
    }

    fn comment(&self, video: &Video, owner: &User, content: &str, age_secs: i64) {
        let at = Utc::now() - Duration::seconds(age_secs);
        let comment = Comment {
            id: Uuid::new_v4(),
            content: content.to_string(),
            video: video.id,
            owner: owner.id,
            created_at: at,
            updated_at: at,
        };
        self.state.db.insert(Collection::Comments, to_document(&comment).unwrap()).unwrap();
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(authed("GET", uri, token).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: &str, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let req = authed(method, uri, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }
}

fn authed(method: &str, uri: &str, token: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
}

#[tokio::test]
async fn healthcheck_is_public() {
    let t = test_app();
    let (status, body) = t
        .send(Request::get("/api/v1/healthcheck").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "statusCode": 200, "data": {}, "message": "All OK", "success": true }));
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let t = test_app();
    let (status, body) = t
        .send(Request::get("/api/v1/users/current-user").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["errors"], json!([]));

    let (status, _) = t.get("/api/v1/users/current-user", "garbage").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, token) = t.user("ada");
    let (status, body) = t.get("/api/v1/users/current-user", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "ada");
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("refreshToken").is_none());
}

#[tokio::test]
async fn comments_page_newest_first_with_author_and_video() {
    let t = test_app();
    let (owner, _) = t.user("owner");
    let (fan, token) = t.user("fan");
    let video = t.video(&owner, "Rust in Action", 100);
    t.comment(&video, &fan, "oldest", 30);
    t.comment(&video, &fan, "middle", 20);
    t.comment(&video, &owner, "newest", 10);

    let uri = format!("/api/v1/comments/{}?page=1&limit=2", video.id);
    let (status, body) = t.get(&uri, &token).await;
    assert_eq!(status, StatusCode::OK);

    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["content"], "newest");
    assert_eq!(rows[1]["content"], "middle");

    assert_eq!(rows[0]["username"], "owner");
    assert_eq!(rows[1]["username"], "fan");
    assert_eq!(rows[1]["fullName"], "fan Example");
    assert!(rows[1]["avatar"].as_str().unwrap().ends_with("fan.png"));
    assert_eq!(rows[1]["videoTitle"], "Rust in Action");
    assert_eq!(rows[1]["videoDescription"], "About Rust in Action");
    assert_eq!(rows[1]["channel"], "owner");

    let (status, body) = t.get(&format!("/api/v1/comments/{}?page=3&limit=2", video.id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Comments exhausted");

    let quiet = t.video(&owner, "Quiet", 5);
    let (status, body) = t.get(&format!("/api/v1/comments/{}", quiet.id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No comments found for this video");
}

#[tokio::test]
async fn empty_playlist_is_distinct_from_missing_playlist() {
    let t = test_app();
    let (user, token) = t.user("curator");

    let (status, body) = t
        .json("POST", "/api/v1/playlist", &token, json!({ "name": "Later", "description": "to watch" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let playlist_id = body["data"]["_id"].as_str().unwrap().to_string();

    let (status, body) = t
        .json("POST", "/api/v1/playlist", &token, json!({ "name": "Later" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Playlist already exist");

    let (status, body) = t.get(&format!("/api/v1/playlist/{}", playlist_id), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({}));
    assert_eq!(body["message"], "Playlist does not have videos yet");

    let (status, body) = t.get(&format!("/api/v1/playlist/{}", Uuid::new_v4()), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Playlist does not exist");

    let (status, _) = t.get("/api/v1/playlist/not-an-id", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let video = t.video(&user, "Clip", 1);
    let uri = format!("/api/v1/playlist/add/{}/{}", video.id, playlist_id);
    let (status, _) = t.send(authed("PATCH", &uri, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = t.get(&format!("/api/v1/playlist/{}", playlist_id), &token).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["_id"], video.id.to_string());
    assert_eq!(rows[0]["name"], "Later");
    assert_eq!(rows[0]["videoTitle"], "Clip");
    assert_eq!(rows[0]["username"], "curator");

    let uri = format!("/api/v1/playlist/remove/{}/{}", video.id, playlist_id);
    let (status, _) = t.send(authed("PATCH", &uri, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = t.send(authed("PATCH", &uri, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Video does not exist in the playlist");
}

#[tokio::test]
async fn subscription_toggles_on_then_off() {
    let t = test_app();
    let (channel, channel_token) = t.user("channel");
    let (_, token) = t.user("viewer");
    let uri = format!("/api/v1/subscriptions/c/{}", channel.id);

    let (status, body) = t.send(authed("POST", &uri, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Subscribed to channel successfully");
    assert_eq!(body["data"]["channel"], channel.id.to_string());

    let (status, body) = t.get(&uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["username"], "viewer");

    let (_, body) = t.get("/api/v1/users/c/channel", &token).await;
    assert_eq!(body["data"]["subscribersCount"], 1);
    assert_eq!(body["data"]["isSubscribed"], true);

    let (status, body) = t.send(authed("POST", &uri, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({}));
    assert_eq!(body["message"], "Subscription removed successfully");

    let (status, _) = t
        .send(authed("POST", &uri, &channel_token).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = format!("/api/v1/subscriptions/c/{}", Uuid::new_v4());
    let (status, body) = t.send(authed("POST", &unknown, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Channel does not exist");
}

#[tokio::test]
async fn video_listing_reports_empty_and_exhausted_differently() {
    let t = test_app();
    let (owner, token) = t.user("maker");

    let (status, body) = t.get("/api/v1/videos", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No video found");

    t.video(&owner, "Borrow checker", 20);
    t.video(&owner, "Lifetimes", 10);

    let (status, body) = t.get("/api/v1/videos?sortBy=createdAt&sortType=desc&limit=abc", &token).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = body["data"].as_array().unwrap().iter().map(|v| v["title"].clone()).collect();
    assert_eq!(titles, vec![json!("Lifetimes"), json!("Borrow checker")]);
    assert_eq!(body["data"][0]["username"], "maker");

    let (status, body) = t.get("/api/v1/videos?title=LIFE", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = t.get("/api/v1/videos?page=2&limit=5", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Videos exhausted");

    let (status, _) = t.get("/api/v1/videos?sortBy=views;drop", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn viewing_counts_views_and_fills_history_once() {
    let t = test_app();
    let (owner, _) = t.user("maker");
    let (_, token) = t.user("watcher");
    let video = t.video(&owner, "Ownership", 10);
    let uri = format!("/api/v1/videos/{}", video.id);

    t.get(&uri, &token).await;
    let (status, body) = t.get(&uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["views"], 2);
    assert_eq!(body["data"]["username"], "maker");

    let (status, body) = t.get("/api/v1/users/history", &token).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["_id"], video.id.to_string());
    assert_eq!(rows[0]["username"], "maker");

    let (status, body) = t.get(&format!("/api/v1/videos/{}", Uuid::new_v4()), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Video does not exist");
}

#[tokio::test]
async fn likes_toggle_and_list_liked_videos() {
    let t = test_app();
    let (owner, _) = t.user("maker");
    let (_, token) = t.user("fan");
    let video = t.video(&owner, "Traits", 10);
    let uri = format!("/api/v1/likes/toggle/v/{}", video.id);

    let (status, body) = t.send(authed("POST", &uri, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["target"], json!({ "kind": "video", "id": video.id.to_string() }));

    let (_, body) = t.get("/api/v1/likes/videos", &token).await;
    assert_eq!(body["data"][0]["title"], "Traits");
    assert_eq!(body["data"][0]["username"], "maker");

    let (_, body) = t.send(authed("POST", &uri, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(body["data"], json!({}));
    let (_, body) = t.get("/api/v1/likes/videos", &token).await;
    assert_eq!(body["data"], json!([]));

    let missing = format!("/api/v1/likes/toggle/t/{}", Uuid::new_v4());
    let (status, body) = t.send(authed("POST", &missing, &token).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Tweet does not exist");
}

#[tokio::test]
async fn only_owners_change_their_tweets() {
    let t = test_app();
    let (_, author_token) = t.user("author");
    let (_, other_token) = t.user("other");

    let (status, body) = t.get("/api/v1/tweets", &author_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({}));
    assert_eq!(body["message"], "User does not have any tweets");

    let (status, body) = t
        .json("POST", "/api/v1/tweets", &author_token, json!({ "content": "hello" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let tweet_uri = format!("/api/v1/tweets/{}", body["data"]["_id"].as_str().unwrap());

    let (status, body) = t
        .json("PATCH", &tweet_uri, &other_token, json!({ "content": "hijacked" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Tweet does not exist");

    let (status, body) = t
        .json("PATCH", &tweet_uri, &author_token, json!({ "content": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Content is required");

    let (status, body) = t
        .json("PATCH", &tweet_uri, &author_token, json!({ "content": "hello again" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "hello again");

    let (status, _) = t
        .send(authed("DELETE", &tweet_uri, &author_token).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.state.db.count(Collection::Tweets, &tubeway_db::Filter::all()).unwrap(), 0);
}

#[tokio::test]
async fn login_sets_session_cookies_and_refresh_rotates() {
    let t = test_app();
    t.user("ada");

    let req = Request::post("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "username": "ADA", "password": "password123" }).to_string()))
        .unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=") && c.contains("HttpOnly") && c.contains("Secure")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=") && c.contains("HttpOnly") && c.contains("Secure")));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["data"]["user"].get("password").is_none());
    let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let refresh_req = |token: &str| {
        Request::post("/api/v1/users/refresh-token")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "refreshToken": token }).to_string()))
            .unwrap()
    };
    let (status, body) = t.send(refresh_req(&refresh)).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["refreshToken"], refresh.as_str());

    // the old refresh token was rotated out
    let (status, _) = t.send(refresh_req(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let bad_password = Request::post("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "email": "ada@example.com", "password": "nope" }).to_string()))
        .unwrap();
    let (status, _) = t.send(bad_password).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unknown = Request::post("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "username": "nobody", "password": "password123" }).to_string()))
        .unwrap();
    let (status, body) = t.send(unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User does not exist");
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n", boundary, name, value).as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>, boundary: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn register_stores_avatar_and_rejects_duplicates() {
    let t = test_app();
    let boundary = "tubewayboundary";
    let fields = [
        ("fullName", "Grace Hopper"),
        ("email", "Grace@Example.com"),
        ("username", " Grace "),
        ("password", "cobol-forever"),
    ];

    let body = multipart_body(boundary, &fields, &[("avatar", "me.PNG", b"fake png")]);
    let (status, body) = t.send(multipart_request("/api/v1/users/register", body, boundary)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["username"], "grace");
    assert_eq!(body["data"]["email"], "grace@example.com");
    assert!(body["data"].get("password").is_none());
    let public_id = body["data"]["avatarPublicId"].as_str().unwrap();
    assert!(public_id.ends_with(".png"));
    assert!(t.media_root.join(public_id).exists());

    let again = multipart_body(boundary, &fields, &[("avatar", "me.png", b"fake png")]);
    let (status, _) = t.send(multipart_request("/api/v1/users/register", again, boundary)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let no_avatar = multipart_body(boundary, &fields, &[]);
    let (status, body) = t.send(multipart_request("/api/v1/users/register", no_avatar, boundary)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Avatar file is required");
}

#[tokio::test]
async fn dashboard_stats_cover_the_callers_channel() {
    let t = test_app();
    let (owner, token) = t.user("studio");
    let (_, fan_token) = t.user("fan");
    let video = t.video(&owner, "Pinning", 10);

    t.get(&format!("/api/v1/videos/{}", video.id), &fan_token).await;
    let like = format!("/api/v1/likes/toggle/v/{}", video.id);
    t.send(authed("POST", &like, &fan_token).body(Body::empty()).unwrap()).await;
    let subscribe = format!("/api/v1/subscriptions/c/{}", owner.id);
    t.send(authed("POST", &subscribe, &fan_token).body(Body::empty()).unwrap()).await;

    let (status, body) = t.get("/api/v1/dashboard/stats", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({
            "totalVideosCount": 1,
            "totalVideoLikesCount": 1,
            "totalSubscribersCount": 1,
            "totalViews": 1,
        })
    );

    let (_, body) = t.get(&format!("/api/v1/dashboard/videos/channel/{}", owner.id), &fan_token).await;
    assert_eq!(body["data"][0]["title"], "Pinning");
    assert_eq!(body["data"][0]["username"], "studio");
}

fn set_cookies(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn assert_cleared(cookies: &[String]) {
    assert_eq!(cookies.len(), 2, "{:?}", cookies);
    for name in ["accessToken", "refreshToken"] {
        let cookie = cookies
            .iter()
            .find(|c| c.starts_with(&format!("{}=;", name)))
            .unwrap_or_else(|| panic!("{} not cleared: {:?}", name, cookies));
        for attribute in ["HttpOnly", "Secure", "Path=/", "Max-Age=0"] {
            assert!(cookie.contains(attribute), "{} lacks {}", cookie, attribute);
        }
    }
}

/// Log in through the API and return the issued (access, refresh) pair.
async fn login(t: &TestApp, username: &str) -> (String, String) {
    let req = Request::post("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "username": username, "password": "password123" }).to_string()))
        .unwrap();
    let (status, body) = t.send(req).await;
    assert_eq!(status, StatusCode::OK);
    (
        body["data"]["accessToken"].as_str().unwrap().to_string(),
        body["data"]["refreshToken"].as_str().unwrap().to_string(),
    )
}

fn refresh_request(token: &str) -> Request<Body> {
    Request::post("/api/v1/users/refresh-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "refreshToken": token }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn logout_clears_cookies_and_revokes_the_refresh_token() {
    let t = test_app();
    t.user("ada");
    let (access, refresh) = login(&t, "ada").await;

    let req = Request::post("/api/v1/users/logout")
        .header(header::COOKIE, format!("accessToken={}; refreshToken={}", access, refresh))
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_cleared(&set_cookies(&response));

    let (status, body) = t.send(refresh_request(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Refresh token is expired or used");
}

#[tokio::test]
async fn bearer_only_logout_still_clears_cookies() {
    let t = test_app();
    t.user("ada");
    let (access, _) = login(&t, "ada").await;

    let req = authed("POST", "/api/v1/users/logout", &access).body(Body::empty()).unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_cleared(&set_cookies(&response));
}

#[tokio::test]
async fn refresh_sets_new_session_cookies_from_the_cookie_token() {
    let t = test_app();
    t.user("ada");
    let (_, refresh) = login(&t, "ada").await;

    let req = Request::post("/api/v1/users/refresh-token")
        .header(header::COOKIE, format!("refreshToken={}", refresh))
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("HttpOnly") && c.contains("Secure")));
    assert!(!cookies.iter().any(|c| c.contains(&refresh)));
}

#[tokio::test]
async fn concurrent_refreshes_with_one_token_succeed_once() {
    let t = test_app();
    t.user("ada");
    let (_, refresh) = login(&t, "ada").await;

    let (a, b) = tokio::join!(t.send(refresh_request(&refresh)), t.send(refresh_request(&refresh)));
    let mut statuses = vec![a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::UNAUTHORIZED]);
}

#[tokio::test]
async fn malformed_refresh_body_is_a_bad_request() {
    let t = test_app();
    let req = Request::post("/api/v1/users/refresh-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = t.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn pages_far_past_the_end_are_exhausted() {
    let t = test_app();
    let (owner, token) = t.user("maker");
    t.video(&owner, "Only one", 1);

    let (status, body) = t.get("/api/v1/videos?page=1000000000000000000&limit=10", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Videos exhausted");
}
