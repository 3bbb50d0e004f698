//! Drives the real reqwest transport against a local hyper server standing in for the destination.

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use sqs_forwarder::{
    Config, DedupSet, FingerprintPolicy, Forwarder, Intake, InvocationResponse, Outcome, ReqwestTransport, Routing,
    Transport,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A request as seen by the destination.
#[derive(Debug)]
struct Captured {
    path: String,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl Captured {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("destination received invalid JSON")
    }
}

/// Starts a destination that answers 200 to everything except `/unavailable`, which gets 503.
async fn start_destination() -> (SocketAddr, mpsc::UnboundedReceiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::task::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(v) => v,
                Err(_) => return,
            };
            let io = TokioIo::new(stream);
            let tx = tx.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let tx = tx.clone();
                    async move {
                        let path = req.uri().path().to_owned();
                        let content_type = req
                            .headers()
                            .get(CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned);
                        let body = req.into_body().collect().await?.to_bytes().to_vec();

                        let status = if path == "/unavailable" {
                            StatusCode::SERVICE_UNAVAILABLE
                        } else {
                            StatusCode::OK
                        };

                        let _ = tx.send(Captured {
                            path,
                            content_type,
                            body,
                        });

                        let mut resp = Response::new(Full::new(Bytes::from_static(b"received")));
                        *resp.status_mut() = status;
                        Ok::<_, hyper::Error>(resp)
                    }
                });

                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    (addr, rx)
}

/// An address nothing listens on.
async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind");
    listener.local_addr().expect("no local addr")
}

fn forwarder(config: Config) -> Forwarder<ReqwestTransport> {
    Forwarder::new(
        config,
        ReqwestTransport::new().expect("failed to build the client"),
        Arc::new(DedupSet::new()),
    )
}

#[tokio::test]
async fn posts_json_and_reads_the_response() {
    let (addr, mut rx) = start_destination().await;
    let transport = ReqwestTransport::new().unwrap();

    let delivery = transport
        .post_json(&format!("http://{addr}/hook"), br#"{"a":1}"#.to_vec())
        .await
        .unwrap();

    assert_eq!(delivery.status, 200);
    assert_eq!(delivery.body.as_deref(), Some("received"));

    let captured = rx.recv().await.unwrap();
    assert_eq!(captured.path, "/hook");
    assert_eq!(captured.content_type.as_deref(), Some("application/json"));
    assert_eq!(captured.json(), json!({"a": 1}));
}

#[tokio::test]
async fn sqs_event_is_forwarded_record_by_record() {
    let (addr, mut rx) = start_destination().await;
    let config = Config {
        forward_url: Some(format!("http://{addr}/inbound")),
        routing: Routing::Static,
        dedup: Some(FingerprintPolicy::Body),
        intake: Intake::Records,
    };
    let f = forwarder(config);

    let event = json!({
        "Records": [
            {"messageId": "1", "receiptHandle": "r1", "body": "{\"order\":1}", "eventSource": "aws:sqs"},
            {"messageId": "2", "receiptHandle": "r2", "body": "{\"order\":2}", "eventSource": "aws:sqs"},
            {"messageId": "3", "receiptHandle": "r3", "body": "{\"order\":1}", "eventSource": "aws:sqs"}
        ]
    });

    let report = f.handle_event(event).await;

    assert_eq!(report.response, InvocationResponse::ok());
    assert_eq!(report.forwarded(), 2);
    assert_eq!(report.skipped(), 1);

    let first = rx.recv().await.unwrap().json();
    let second = rx.recv().await.unwrap().json();
    assert_eq!(first["messageId"], "1");
    assert_eq!(second["messageId"], "2");
    assert_eq!(second["receiptHandle"], "r2");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unreachable_destination_does_not_stop_later_records() {
    let (addr, mut rx) = start_destination().await;
    let down = closed_addr().await;
    let config = Config {
        forward_url: None,
        routing: Routing::Body,
        dedup: None,
        intake: Intake::Records,
    };
    let f = forwarder(config);

    let event = json!([
        {"body": json!({"url": format!("http://{down}/x"), "n": 1}).to_string()},
        {"body": json!({"url": format!("http://{addr}/unavailable"), "n": 2}).to_string()},
        {"body": json!({"url": format!("http://{addr}/ok"), "n": 3}).to_string()}
    ]);

    let report = f.handle_event(event).await;

    assert!(matches!(report.outcomes[0], Outcome::Failed { .. }));
    assert_eq!(
        report.outcomes[1],
        Outcome::Forwarded {
            url: format!("http://{addr}/unavailable"),
            status: 503
        }
    );
    assert_eq!(
        report.outcomes[2],
        Outcome::Forwarded {
            url: format!("http://{addr}/ok"),
            status: 200
        }
    );
    assert_eq!(report.response.status_code, 200);

    let unavailable = rx.recv().await.unwrap();
    assert_eq!(unavailable.path, "/unavailable");
    assert_eq!(unavailable.json(), json!({"n": 2}));
    assert_eq!(rx.recv().await.unwrap().json(), json!({"n": 3}));
}

#[tokio::test]
async fn raw_intake_forwards_bytes_verbatim() {
    let (addr, mut rx) = start_destination().await;
    let config = Config {
        forward_url: Some(format!("http://{addr}/raw")),
        routing: Routing::Static,
        dedup: Some(FingerprintPolicy::Body),
        intake: Intake::Raw,
    };
    let f = forwarder(config);

    let report = f.handle_bytes(b"opaque \x01 bytes").await;

    assert_eq!(report.response, InvocationResponse::ok());
    assert_eq!(report.forwarded(), 1);
    assert_eq!(rx.recv().await.unwrap().body, b"opaque \x01 bytes".to_vec());
}
