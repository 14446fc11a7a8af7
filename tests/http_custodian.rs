//! HttpCustodian against a local stub key service
//!
//! The stub speaks just enough HTTP/1.1 to answer one request per connection
//! and records every request it sees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use vault::crypto::SymmetricKey;
use vault::kms::{HttpCustodian, KeyCustodian, RemoteKeyWrapper, RetryPolicy};
use vault::{EnvelopeCodec, KeyIdentity, UnwrapCredential, VaultError, WrapMode};

const KEY_PATH: &str = "tenants/acme";

#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

impl Request {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

type Handler = Arc<dyn Fn(&Request) -> (u16, String) + Send + Sync>;

struct StubServer {
    endpoint: String,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl StubServer {
    async fn start(handler: impl Fn(&Request) -> (u16, String) + Send + Sync + 'static) -> Self {
        let handler: Handler = Arc::new(handler);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let request = read_request(&mut socket).await;
                    log.lock().push(request.clone());
                    let (status, body) = handler(&request);
                    let response = format!(
                        "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { endpoint, requests }
    }

    fn custodian(&self) -> HttpCustodian {
        HttpCustodian::new(&self.endpoint, Duration::from_secs(2)).unwrap()
    }

    fn wrapper(&self, custodian: HttpCustodian) -> RemoteKeyWrapper {
        RemoteKeyWrapper::new(Arc::new(custodian), KEY_PATH)
            .with_retry_policy(RetryPolicy::immediate(3))
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> Request {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers were complete");
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap().split_whitespace();
    let method = request_line.next().unwrap().to_string();
    let path = request_line.next().unwrap().to_string();

    let mut content_length = 0;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap(),
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    while buffer.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body was complete");
        buffer.extend_from_slice(&chunk[..n]);
    }

    Request {
        method,
        path,
        authorization,
        body: String::from_utf8_lossy(&buffer[header_end..header_end + content_length]).to_string(),
    }
}

/// The stub's "encryption": reverse the bytes
fn reversed(encoded: &str) -> String {
    let mut bytes = STANDARD.decode(encoded).unwrap();
    bytes.reverse();
    STANDARD.encode(bytes)
}

fn reversing_custodian(request: &Request) -> (u16, String) {
    let encrypt = format!("/v1/{}:encrypt", KEY_PATH);
    let decrypt = format!("/v1/{}/versions/7:decrypt", KEY_PATH);

    if request.method == "POST" && request.path == encrypt {
        let body = request.json();
        let version = body["keyVersion"].as_str().unwrap_or("7").to_string();
        let ciphertext = reversed(body["plaintext"].as_str().unwrap());
        (200, json!({ "ciphertext": ciphertext, "keyVersion": version }).to_string())
    } else if request.method == "POST" && request.path == decrypt {
        let plaintext = reversed(request.json()["ciphertext"].as_str().unwrap());
        (200, json!({ "plaintext": plaintext }).to_string())
    } else {
        (404, "no such key version".to_string())
    }
}

#[tokio::test]
async fn envelope_round_trip_through_http_custodian() {
    let server = StubServer::start(reversing_custodian).await;
    let codec = EnvelopeCodec::with_remote(server.wrapper(server.custodian().with_token("t0ken")));

    let envelope = codec
        .seal_string("ssn: 078-05-1120", WrapMode::Remote { key_version: None })
        .await
        .unwrap();
    assert_eq!(
        envelope.key_identity(),
        &KeyIdentity::Remote {
            key_path: KEY_PATH.to_string(),
            key_version: "7".to_string(),
        }
    );

    let opened = codec
        .open_string(&envelope, UnwrapCredential::Remote)
        .await
        .unwrap();
    assert_eq!(opened, "ssn: 078-05-1120");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/v1/tenants/acme:encrypt");
    assert!(requests[0].json().get("keyVersion").is_none());
    assert_eq!(requests[1].path, "/v1/tenants/acme/versions/7:decrypt");
    assert!(requests
        .iter()
        .all(|r| r.method == "POST" && r.authorization.as_deref() == Some("Bearer t0ken")));
}

#[tokio::test]
async fn requested_key_version_is_sent() {
    let server = StubServer::start(reversing_custodian).await;
    let wrapper = server.wrapper(server.custodian());

    let wrapped = wrapper
        .wrap(&SymmetricKey::generate(), Some("7"))
        .await
        .unwrap();
    assert_eq!(wrapped.key_version, "7");

    let requests = server.requests();
    assert_eq!(requests[0].json()["keyVersion"], "7");
    assert!(requests[0].authorization.is_none());
}

#[tokio::test]
async fn missing_version_is_not_retried() {
    let server = StubServer::start(|_| (404, "gone".to_string())).await;
    let wrapper = server.wrapper(server.custodian());

    let err = wrapper.unwrap(&[1, 2, 3], KEY_PATH, "9").await.unwrap_err();
    match err {
        VaultError::KeyVersionNotFound {
            key_path,
            key_version,
        } => {
            assert_eq!(key_path, KEY_PATH);
            assert_eq!(key_version, "9");
        }
        other => panic!("expected key version not found, got {:?}", other),
    }
    assert_eq!(server.requests().len(), 1);
    assert_eq!(server.requests()[0].path, "/v1/tenants/acme/versions/9:decrypt");
}

#[tokio::test]
async fn throttling_is_retried_until_attempts_run_out() {
    let server = StubServer::start(|_| (429, "slow down".to_string())).await;
    let wrapper = server.wrapper(server.custodian());

    let err = wrapper
        .wrap(&SymmetricKey::generate(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::KeyManagementUnavailable));
    assert!(err.is_retryable());
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn transient_outage_recovers_on_retry() {
    let calls = AtomicUsize::new(0);
    let server = StubServer::start(move |request| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            (503, "warming up".to_string())
        } else {
            reversing_custodian(request)
        }
    })
    .await;
    let wrapper = server.wrapper(server.custodian());

    let key = SymmetricKey::generate();
    let wrapped = wrapper.wrap(&key, None).await.unwrap();
    let mut expected = key.as_bytes().to_vec();
    expected.reverse();
    assert_eq!(wrapped.wrapped_key, expected);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn denied_request_is_not_retried() {
    let server = StubServer::start(|_| (403, "tenant mismatch".to_string())).await;
    let wrapper = server.wrapper(server.custodian());

    let err = wrapper
        .wrap(&SymmetricKey::generate(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::AccessDenied));
    assert!(!err.to_string().contains("tenant mismatch"));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn malformed_responses_are_crypto_failures() {
    for body in [
        "not json".to_string(),
        json!({ "ciphertext": "AAAA", "keyVersion": "" }).to_string(),
        json!({ "ciphertext": "***", "keyVersion": "7" }).to_string(),
    ] {
        let server = StubServer::start(move |_| (200, body.clone())).await;
        let wrapper = server.wrapper(server.custodian());

        let err = wrapper
            .wrap(&SymmetricKey::generate(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Crypto(_)), "got {:?}", err);
        assert_eq!(server.requests().len(), 1);
    }
}

#[tokio::test]
async fn health_check_probes_healthz() {
    let server = StubServer::start(|request| {
        if request.path == "/healthz" {
            (200, "{}".to_string())
        } else {
            (500, String::new())
        }
    })
    .await;

    server.custodian().health_check().await.unwrap();
    assert!(server.wrapper(server.custodian()).health_check().await.is_ok());

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.method == "GET" && r.path == "/healthz"));
}
