//! HTTP front for an in-process [`MemoryService`], served by axum on a
//! background thread so blocking sessions can talk to it over real sockets.

use std::net::SocketAddr;
use std::thread::JoinHandle;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method as HttpMethod, StatusCode, Uri};
use axum::response::Response as HttpResponse;
use axum::Router;
use roomshare_core::transport::IDEMPOTENCY_KEY_HEADER;
use roomshare_core::{MemoryService, Method, Request};
use tokio::sync::oneshot;

pub const TOKEN: &str = "mock";
pub const BASE_URL: &str = "/api/v1";

pub struct TestServer {
    pub addr: SocketAddr,
    pub service: MemoryService,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        let service = MemoryService::new(TOKEN);
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = service.clone();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();

                let app = Router::new().fallback(forward).with_state(state);
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .unwrap();
            });
        });

        let addr = addr_rx.recv().unwrap();
        Self {
            addr,
            service,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn forward(
    State(service): State<MemoryService>,
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    let Some(path) = uri.path().strip_prefix(BASE_URL) else {
        return plain(StatusCode::NOT_FOUND, "outside base url");
    };
    let Ok(method) = method.as_str().parse::<Method>() else {
        return plain(StatusCode::METHOD_NOT_ALLOWED, "unsupported method");
    };

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let token = header_str(header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer ").map(str::to_string));

    let request = Request {
        method,
        path: path.to_string(),
        content_type: header_str(header::CONTENT_TYPE.as_str()),
        idempotency_key: header_str(IDEMPOTENCY_KEY_HEADER),
        body: body.to_vec(),
    };
    let response = service.handle(token.as_deref(), request);

    let mut builder = axum::http::Response::builder().status(response.status);
    if let Some(content_type) = response.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(response.body)).unwrap()
}

fn plain(status: StatusCode, text: &'static str) -> HttpResponse {
    axum::http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(text))
        .unwrap()
}
