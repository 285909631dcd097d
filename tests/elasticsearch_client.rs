//! Bulk client against a minimal local HTTP responder

use std::time::Duration;

use es_bulk_loader::client::{Auth, ElasticsearchClient, ElasticsearchClientConfig, IndexClient, IndexTarget};
use es_bulk_loader::errors::ClientError;
use es_bulk_loader::models::Record;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct CapturedRequest {
    head: String,
    body: String,
}

/// Serve exactly one request with `status` and `body`, handing back what was received
async fn serve_once(status: u16, body: String) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buffer = [0u8; 4096];

        let header_end = loop {
            let read = socket.read(&mut buffer).await.unwrap();
            if read == 0 {
                break received.len();
            }
            received.extend_from_slice(&buffer[..read]);
            if let Some(position) = received.windows(4).position(|window| window == b"\r\n\r\n") {
                break position + 4;
            }
        };

        let head = String::from_utf8_lossy(&received[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        while received.len() < header_end + content_length {
            let read = socket.read(&mut buffer).await.unwrap();
            if read == 0 {
                break;
            }
            received.extend_from_slice(&buffer[..read]);
        }
        let request_body = String::from_utf8_lossy(&received[header_end..]).to_string();

        let response = format!(
            "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        let _ = tx.send(CapturedRequest {
            head,
            body: request_body,
        });
    });

    (url, rx)
}

fn client(url: String, auth: Option<Auth>) -> ElasticsearchClient {
    ElasticsearchClient::new(ElasticsearchClientConfig {
        urls: vec![url],
        auth,
        timeout: Duration::from_secs(5),
        accept_invalid_certs: false,
    })
    .unwrap()
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("test records are objects"),
    }
}

#[tokio::test]
async fn bulk_posts_ndjson_and_maps_items() {
    let response = json!({
        "took": 1,
        "errors": true,
        "items": [
            {"index": {"_index": "people", "_id": "a", "status": 201}},
            {"index": {"_index": "people", "_id": "b", "status": 400,
                       "error": {"type": "mapper_parsing_exception"}}}
        ]
    });
    let (url, captured) = serve_once(200, response.to_string()).await;
    let client = client(
        url,
        Some(Auth::Basic {
            username: "elastic".into(),
            password: "secret".into(),
        }),
    );

    let items = client
        .bulk(
            &IndexTarget::new("people", "doc"),
            vec![
                record(json!({"_id": "a", "name": "Ada"})),
                record(json!({"_id": "b", "name": "Bob"})),
            ],
        )
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert!(items[0].accepted);
    assert!(!items[1].accepted);
    assert_eq!(items[1].detail, json!({"type": "mapper_parsing_exception"}));

    let request = captured.await.unwrap();
    assert!(request.head.starts_with("POST /_bulk "));
    assert!(request.head.to_lowercase().contains("content-type: application/x-ndjson"));
    assert!(request.head.to_lowercase().contains("authorization: basic "));

    let lines: Vec<Value> = request
        .body
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], json!({"index": {"_index": "people", "_type": "doc", "_id": "a"}}));
    assert_eq!(lines[1], json!({"name": "Ada"}));
}

#[tokio::test]
async fn bulk_request_level_failure() {
    let (url, _captured) = serve_once(413, r#"{"error": "too large"}"#.to_string()).await;
    let client = client(url, Some(Auth::ApiKey("key".into())));

    let err = client
        .bulk(&IndexTarget::new("people", "doc"), vec![record(json!({"_id": "a"}))])
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::BulkRejected { status: 413, .. }));
}

#[tokio::test]
async fn ping_succeeds_on_2xx() {
    let (url, captured) = serve_once(200, json!({"tagline": "You Know, for Search"}).to_string()).await;
    let client = client(url, Some(Auth::ApiKey("key".into())));

    client.ping().await.unwrap();

    let request = captured.await.unwrap();
    assert!(request.head.starts_with("GET / "));
    assert!(request.head.contains("ApiKey key"));
}
