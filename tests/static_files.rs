//! Static file serving through the router.

use std::fs;
use std::path::PathBuf;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http_body_util::{BodyExt, Full};
use trellis::Router;

fn request(uri: &str) -> http::Request<Full<Bytes>> {
    http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

async fn body_string(res: http::Response<Full<Bytes>>) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn temp_assets_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("trellis-static-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn serves_existing_files() {
    let dir = temp_assets_dir("serves");
    fs::write(dir.join("hello.txt"), "hi").unwrap();

    let app = Router::new();
    app.static_files("/assets", &dir);

    let res = app.dispatch(request("/assets/hello.txt")).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(body_string(res).await, "hi");
}

#[tokio::test]
async fn missing_file_renders_404_through_error_handlers() {
    let dir = temp_assets_dir("missing");

    let app = Router::new();
    app.static_files("/assets", &dir);

    let res = app.dispatch(request("/assets/nope.txt")).await;
    assert_eq!(res.status(), 404);
    let body = body_string(res).await;
    assert!(body.contains("could not find"), "got: {body}");
    assert!(body.contains("/assets/nope.txt"), "got: {body}");
}

#[tokio::test]
async fn traversal_is_treated_as_not_found() {
    let dir = temp_assets_dir("traversal").join("inner");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.parent().unwrap().join("secret.txt"), "secret").unwrap();

    let app = Router::new();
    app.static_files("/assets", &dir);

    let res = app.dispatch(request("/assets/../secret.txt")).await;
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn static_prefix_respects_group_prefixes() {
    let dir = temp_assets_dir("grouped");
    fs::write(dir.join("app.js"), "console.log(1)").unwrap();

    let app = Router::new();
    let ui = app.group("/ui");
    ui.static_files("/assets", &dir);

    let res = app.dispatch(request("/ui/assets/app.js")).await;
    assert_eq!(res.status(), 200);
    let ct = res.headers()[CONTENT_TYPE].to_str().unwrap().to_owned();
    assert!(ct.contains("javascript"), "got: {ct}");
}

#[tokio::test]
async fn content_type_covers_uncommon_extensions() {
    let dir = temp_assets_dir("mime");
    fs::write(dir.join("video.mp4"), "not really a video").unwrap();
    fs::write(dir.join("font.woff2"), "not really a font").unwrap();

    let app = Router::new();
    app.static_files("/assets", &dir);

    let res = app.dispatch(request("/assets/video.mp4")).await;
    assert_eq!(res.headers()[CONTENT_TYPE], "video/mp4");

    let res = app.dispatch(request("/assets/font.woff2")).await;
    assert_eq!(res.headers()[CONTENT_TYPE], "font/woff2");
}
