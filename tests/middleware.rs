//! Built-in middleware and middleware short-circuiting.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use trellis::{Context, ErasedHandler as _, Handler, Router, middleware};

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

#[tokio::test]
async fn recover_turns_a_panic_into_a_500() {
    let app = Router::new();
    app.wrap(middleware::recover());
    app.get("/", |_ctx: Context| async move {
        panic!("handler exploded");
        #[allow(unreachable_code)]
        Ok(())
    });

    let res = app.dispatch(request("/")).await;
    assert_eq!(res.status(), 500);
    assert!(body_string(res).await.contains("handler exploded"));
}

#[tokio::test]
async fn recover_passes_successes_through() {
    let app = Router::new();
    app.wrap(middleware::recover());
    app.get("/", |ctx: Context| async move { ctx.text(200, "fine") });

    let res = app.dispatch(request("/")).await;
    assert_eq!(res.status(), 200);
    assert_eq!(body_string(res).await, "fine");
}

#[tokio::test]
async fn middleware_can_short_circuit() {
    let app = Router::new();
    app.wrap(middleware::from_fn(|_next| {
        (|ctx: Context| async move { ctx.text(401, "denied") }).into_handler()
    }));
    app.get("/", |ctx: Context| async move { ctx.text(200, "never reached") });

    let res = app.dispatch(request("/")).await;
    assert_eq!(res.status(), 401);
    assert_eq!(body_string(res).await, "denied");
}

#[tokio::test]
async fn middleware_errors_reach_the_error_pipeline() {
    let app = Router::new();
    app.wrap(middleware::from_fn(|_next| {
        (|ctx: Context| async move { Err(ctx.error(403, "forbidden by middleware")) })
            .into_handler()
    }));
    app.get("/", |ctx: Context| async move { ctx.text(200, "never reached") });

    let res = app.dispatch(request("/")).await;
    assert_eq!(res.status(), 403);
    assert_eq!(body_string(res).await, "forbidden by middleware");
}

#[tokio::test]
async fn middleware_observes_the_written_response() {
    let app = Router::new();
    let seen = Arc::new(std::sync::Mutex::new((0_u16, 0_usize)));

    let probe = Arc::clone(&seen);
    app.wrap(middleware::from_fn(move |next| {
        let probe = Arc::clone(&probe);
        (move |ctx: Context| {
            let next = Arc::clone(&next);
            let probe = Arc::clone(&probe);
            async move {
                let res = next.call(ctx.clone()).await;
                let response = ctx.response();
                *probe.lock().unwrap() = (response.status(), response.size());
                res
            }
        })
        .into_handler()
    }));
    app.get("/", |ctx: Context| async move { ctx.text(201, "hello") });

    app.dispatch(request("/")).await;
    assert_eq!(*seen.lock().unwrap(), (201, 5));
}

fn gzip_request(uri: &str) -> http::Request<Full<Bytes>> {
    http::Request::builder()
        .method("GET")
        .uri(uri)
        .header(http::header::ACCEPT_ENCODING, "gzip, deflate")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[tokio::test]
async fn compress_gzips_accepted_responses() {
    use std::io::Read;

    let app = Router::new();
    app.wrap(middleware::compress());
    app.get("/", |ctx: Context| async move { ctx.text(200, "hello gzip") });

    let res = app.dispatch(gzip_request("/")).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[http::header::CONTENT_ENCODING], "gzip");

    let body = res.into_body().collect().await.unwrap().to_bytes();
    let mut decoded = String::new();
    flate2::read::GzDecoder::new(&body[..])
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, "hello gzip");
}

#[tokio::test]
async fn compress_skips_clients_not_accepting_gzip() {
    let app = Router::new();
    app.wrap(middleware::compress());
    app.get("/", |ctx: Context| async move { ctx.text(200, "plain") });

    let res = app.dispatch(request("/")).await;
    assert!(res.headers().get(http::header::CONTENT_ENCODING).is_none());
    assert_eq!(body_string(res).await, "plain");
}

#[tokio::test]
async fn compress_leaves_empty_responses_alone() {
    let app = Router::new();
    app.wrap(middleware::compress());
    app.get("/", |ctx: Context| async move { ctx.no_content() });

    let res = app.dispatch(gzip_request("/")).await;
    assert_eq!(res.status(), 204);
    assert!(res.headers().get(http::header::CONTENT_ENCODING).is_none());
    assert!(body_string(res).await.is_empty());
}

#[tokio::test]
async fn trace_middleware_is_transparent() {
    let app = Router::new();
    app.wrap(middleware::trace());
    app.get("/", |ctx: Context| async move { ctx.text(200, "traced") });

    let res = app.dispatch(request("/")).await;
    assert_eq!(res.status(), 200);
    assert_eq!(body_string(res).await, "traced");
}
