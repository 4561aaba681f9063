use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How the mock endpoint answers every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Serve,
    ReportFailure,
    Garbage,
    Unavailable,
}

#[derive(Clone)]
pub struct MockQrng {
    behavior: Arc<Mutex<MockBehavior>>,
    next: Arc<AtomicU64>,
    requests: Arc<AtomicUsize>,
    lengths: Arc<Mutex<Vec<usize>>>,
}

impl MockQrng {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            next: Arc::new(AtomicU64::new(1)),
            requests: Arc::new(AtomicUsize::new(0)),
            lengths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().expect("mock behavior poisoned") = behavior;
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.lengths.lock().expect("mock lengths poisoned").clone()
    }

    fn behavior(&self) -> MockBehavior {
        *self.behavior.lock().expect("mock behavior poisoned")
    }

    /// Values cycle through 1..=65535 like the uint16 endpoint.
    fn draw(&self, length: usize) -> Vec<u64> {
        let start = self.next.fetch_add(length as u64, Ordering::SeqCst);
        (start..start + length as u64)
            .map(|value| (value - 1) % 65_535 + 1)
            .collect()
    }
}

pub struct MockQrngServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockQrngServer {
    pub async fn start(qrng: MockQrng) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock QRNG listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let qrng = qrng.clone();
            async move { Ok::<_, Infallible>(service_fn(move |req| serve_request(qrng.clone(), req))) }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock QRNG server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{addr}/API/jsonI.php?type=uint16&length="),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(qrng: MockQrng, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        let mut response = Response::new(Body::from("Unsupported method"));
        *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        return Ok(response);
    }

    let length = req
        .uri()
        .query()
        .unwrap_or_default()
        .split('&')
        .find_map(|pair| pair.strip_prefix("length="))
        .and_then(|raw| raw.parse::<usize>().ok());

    let Some(length) = length else {
        let mut response = Response::new(Body::from("missing length"));
        *response.status_mut() = StatusCode::BAD_REQUEST;
        return Ok(response);
    };

    qrng.requests.fetch_add(1, Ordering::SeqCst);
    qrng.lengths
        .lock()
        .expect("mock lengths poisoned")
        .push(length);

    let body = match qrng.behavior() {
        MockBehavior::Serve => json!({
            "type": "uint16",
            "length": length,
            "data": qrng.draw(length),
            "success": true,
        })
        .to_string(),
        MockBehavior::ReportFailure => json!({ "success": false }).to_string(),
        MockBehavior::Garbage => "<html>rate limited</html>".to_string(),
        MockBehavior::Unavailable => {
            let mut response = Response::new(Body::from("busy"));
            *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            return Ok(response);
        }
    };

    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}
