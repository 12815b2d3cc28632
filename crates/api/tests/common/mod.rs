#![allow(dead_code)]

use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::routing;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use slicer_api::config::ServerConfig;
use slicer_api::router::build_app_router;
use slicer_api::state::AppState;
use slicer_core::config::SlicerConfig;
use slicer_core::job::JobCoordinator;

/// Input size limit used by every test app.
pub const MAX_INPUT_BYTES: u64 = 1024;

/// Engine body that writes a G-code header and reports success.
pub const SUCCEEDING_ENGINE: &str = "printf '; filament used [g] = 12.34\\n\
    ; estimated printing time (normal mode) = 1h 30m\\n\
    ; total layers count = 120\\nG28\\n' > \"$out\"\n\
    echo 'Slicing done'";

/// Engine body that fails without producing output.
pub const FAILING_ENGINE: &str = "echo 'Object has zero volume' >&2\nexit 3";

/// A test app plus the temporary directory backing its workspace and engine.
pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub config: ServerConfig,
    pub router: Router,
}

impl TestApp {
    /// Build an app whose engine is a shell script running `engine_body`.
    ///
    /// `$out` inside the body is the `--output` path.
    pub fn new(engine_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let binary = write_engine(dir.path(), engine_body);
        let config = test_config(dir.path(), &binary);

        let jobs = JobCoordinator::new(Arc::new(config.slicer.clone())).expect("http client");
        let state = AppState {
            config: Arc::new(config.clone()),
            jobs: Arc::new(jobs),
        };
        let router = build_app_router(state, &config);

        Self {
            dir,
            config,
            router,
        }
    }

    /// Workspace directory a job with `job_id` would use.
    pub fn workspace(&self, job_id: &str) -> PathBuf {
        self.config.slicer.workspace_root.join(job_id)
    }
}

/// Build a test `ServerConfig` rooted in `dir`.
pub fn test_config(dir: &Path, binary: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".parse().expect("origin")],
        request_timeout_secs: 30,
        slicer: SlicerConfig {
            binary: binary.to_string_lossy().into_owned(),
            workspace_root: dir.join("work"),
            profiles_dir: dir.join("profiles"),
            max_input_bytes: MAX_INPUT_BYTES,
            fetch_timeout: Duration::from_secs(5),
            estimate_timeout: Duration::from_secs(5),
            slice_timeout: Duration::from_secs(5),
        },
    }
}

/// Write an executable `sh` script standing in for the slicing engine.
pub fn write_engine(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-slicer");
    let script = format!(
        "#!/bin/sh\n\
         out=\"\"\n\
         while [ $# -gt 0 ]; do\n\
           if [ \"$1\" = \"--output\" ]; then out=\"$2\"; fi\n\
           shift\n\
         done\n\
         {body}\n"
    );
    std::fs::write(&path, script).expect("write fake engine");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake engine");
    path
}

/// Serve model files on an ephemeral local port.
///
/// ```text
/// GET /cube.stl   -> 10 bytes
/// GET /big.stl    -> 2 KiB (over MAX_INPUT_BYTES)
/// anything else   -> 404
/// ```
pub async fn spawn_input_server() -> SocketAddr {
    let app = Router::new()
        .route("/cube.stl", routing::get(|| async { "solid cube" }))
        .route("/big.stl", routing::get(|| async { vec![b'x'; 2048] }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind input server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("input server");
    });
    addr
}

/// Send a GET request through the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    app.oneshot(request).await.expect("router is infallible")
}

/// Send a POST request with a JSON body through the router.
pub async fn post_json(app: Router, uri: &str, body: &Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

/// Send a POST request with an arbitrary `application/json` body.
pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .expect("build request");
    app.oneshot(request).await.expect("router is infallible")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Assert an error response's status and `code` field.
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) -> Value {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "unexpected error body: {json}");
    assert!(json["error"].is_string());
    json
}
