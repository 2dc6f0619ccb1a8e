use flate2::read::GzDecoder;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use std::fs;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wam::compress::{self, CompressOptions};
use wam::static_files::StaticOptions;
use wam::{
    Application, Body, Finalize, Flow, PipelineError, RequestBody, ResponseBody, Server, endpoint_fn, middleware_fn,
    router,
};

fn request(method: Method, uri: &str) -> http::Request<RequestBody> {
    http::Request::builder().method(method).uri(uri).body(RequestBody::empty()).unwrap()
}

async fn read(response: http::Response<ResponseBody>) -> (http::response::Parts, Vec<u8>) {
    let (parts, body) = response.into_parts();
    (parts, body.collect().await.unwrap().to_bytes().to_vec())
}

fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, flow: Flow) -> impl wam::Middleware + 'static {
    let log = Arc::clone(log);
    middleware_fn(move |_ctx| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().unwrap().push(name);
            Ok(flow)
        })
    })
}

#[tokio::test]
async fn test_chain_runs_in_order_until_finalized() {
    let log = Arc::new(Mutex::new(vec![]));
    let app = Application::builder()
        .middleware(recorder(&log, "first", Flow::Continue))
        .middleware(recorder(&log, "second", Flow::Finalize(Finalize::SkipDefaultResponder)))
        .middleware(recorder(&log, "third", Flow::Continue))
        .build()
        .unwrap();

    let (parts, body) = read(app.handle(request(Method::GET, "/"), None).await).await;
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(parts.status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_handler_error_becomes_500_page() {
    let reported = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reported);
    let log = Arc::new(Mutex::new(vec![]));

    let app = Application::builder()
        .middleware(middleware_fn(|ctx| {
            Box::pin(async move {
                ctx.set_body("partial");
                Err(PipelineError::handler("database unreachable"))
            })
        }))
        .middleware(recorder(&log, "after", Flow::Continue))
        .on_error(move |_err| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let (parts, body) = read(app.handle(request(Method::GET, "/"), None).await).await;
    assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(parts.headers["content-type"].to_str().unwrap().starts_with("text/html"));
    assert_eq!(body, b"Internal Server Error");
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(reported.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_handler_is_contained() {
    let app = Application::builder()
        .middleware(middleware_fn(|ctx| {
            Box::pin(async move {
                if ctx.path() == "/" {
                    panic!("boom");
                }
                Ok(Flow::Continue)
            })
        }))
        .build()
        .unwrap();

    let (parts, _) = read(app.handle(request(Method::GET, "/"), None).await).await;
    assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_route_params_and_json() {
    let app = Application::builder()
        .route(
            "/api/:resource/:id",
            router::get(endpoint_fn(|ctx| {
                Box::pin(async move {
                    let resource = ctx.params().get("resource").unwrap_or_default().to_owned();
                    let id = ctx.params().get("id").unwrap_or_default().to_owned();
                    ctx.set_body(serde_json::json!({ "resource": resource, "id": id }));
                    Ok(())
                })
            })),
        )
        .build()
        .unwrap();

    let (parts, body) = read(app.handle(request(Method::GET, "/api/users/7"), None).await).await;
    assert_eq!(parts.status, StatusCode::OK);
    assert_eq!(parts.headers["content-type"], "application/json; charset=utf-8");
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value, serde_json::json!({ "resource": "users", "id": "7" }));

    let (parts, _) = read(app.handle(request(Method::POST, "/api/users/7"), None).await).await;
    assert_eq!(parts.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_routes_and_compression_together() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<p>static</p>".repeat(200)).unwrap();

    let app = Application::builder()
        .middleware(StaticOptions::new().watch(false).build(dir.path()).unwrap())
        .route(
            "/report",
            router::get(endpoint_fn(|ctx| {
                Box::pin(async move {
                    ctx.set_body("line of report\n".repeat(300));
                    Ok(())
                })
            })),
        )
        .middleware(compress::build(CompressOptions::default()))
        .build()
        .unwrap();

    // static asset served from its gzip artifact, compress never runs
    let (parts, body) = read(app.handle(request(Method::GET, "/index.html"), None).await).await;
    assert_eq!(parts.headers["content-encoding"], "gzip");
    assert_eq!(parts.headers["content-length"], body.len().to_string().as_str());
    let mut page = String::new();
    GzDecoder::new(body.as_slice()).read_to_string(&mut page).unwrap();
    assert_eq!(page, "<p>static</p>".repeat(200));

    // dynamic body compressed after the route
    let (parts, body) = read(app.handle(request(Method::GET, "/report"), None).await).await;
    assert_eq!(parts.headers["content-encoding"], "gzip");
    assert!(!parts.headers.contains_key("content-length"));
    let mut report = String::new();
    GzDecoder::new(body.as_slice()).read_to_string(&mut report).unwrap();
    assert_eq!(report, "line of report\n".repeat(300));

    // missing asset short-circuits with an empty 404
    let (parts, body) = read(app.handle(request(Method::GET, "/app.css"), None).await).await;
    assert_eq!(parts.status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let app = Application::builder()
        .middleware(middleware_fn(|ctx| {
            Box::pin(async move {
                let slow = ctx.path() == "/slow";
                ctx.state_mut().insert("slow".to_owned(), serde_json::Value::Bool(slow));
                if slow {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Ok(Flow::Continue)
            })
        }))
        .middleware(middleware_fn(|ctx| {
            Box::pin(async move {
                let slow = ctx.state().get("slow").cloned().unwrap_or_default();
                let body = format!("{} slow={slow}", ctx.path());
                ctx.set_body(Body::from(body));
                Ok(Flow::Continue)
            })
        }))
        .build()
        .unwrap();

    let (slow, fast) =
        tokio::join!(app.handle(request(Method::GET, "/slow"), None), app.handle(request(Method::GET, "/fast"), None));

    assert_eq!(read(slow).await.1, b"/slow slow=true");
    assert_eq!(read(fast).await.1, b"/fast slow=false");
}

#[tokio::test]
async fn test_server_round_trip() {
    let app = Application::builder()
        .route(
            "/ping",
            router::get(endpoint_fn(|ctx| {
                Box::pin(async move {
                    ctx.set_body("pong");
                    Ok(())
                })
            })),
        )
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let server = Server::builder().application(app).bind(address).build().unwrap();
    tokio::spawn(server.serve(listener));

    let mut stream = TcpStream::connect(address).await.unwrap();
    stream.write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await.unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
    assert!(raw.to_ascii_lowercase().contains("content-type: text/plain; charset=utf-8"));
    assert!(raw.ends_with("\r\n\r\npong"));
}
