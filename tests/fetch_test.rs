use coachbook::application::AppError;
use coachbook::config::ApiConfig;
use coachbook::io::ApiClient;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Canned response for one collection: name, HTTP status, body.
type Route = (&'static str, u16, String);

/// Serve canned JSON responses on a local port. Unknown paths get a 404.
async fn stub_backend(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let mut reader = BufReader::new(stream);
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).await.is_err() {
                continue;
            }
            let mut header = String::new();
            loop {
                header.clear();
                match reader.read_line(&mut header).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) if header == "\r\n" => break,
                    Ok(_) => {}
                }
            }

            let path = request_line.split_whitespace().nth(1).unwrap_or_default();
            let (status, body) = routes
                .iter()
                .find(|(name, _, _)| path.ends_with(&format!("/{}", name)))
                .map(|(_, status, body)| (*status, body.clone()))
                .unwrap_or((404, r#"{"message":"not found"}"#.to_string()));

            let response = format!(
                "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    format!("http://{}/api/", addr)
}

fn client(base_url: &str) -> ApiClient {
    ApiClient::new(&ApiConfig {
        base_url: base_url.to_string(),
        token_env: "COACHBOOK_TEST_TOKEN_UNSET".to_string(),
        timeout_seconds: 5,
    })
    .unwrap()
}

fn ok(name: &'static str, body: serde_json::Value) -> Route {
    (name, 200, body.to_string())
}

fn core_collections() -> Vec<Route> {
    vec![
        ok("fees", json!([{"studentId": "s1", "paidAmount": 400}])),
        ok("students", json!({"success": true, "data": [{"_id": "s1", "batchId": "b1"}]})),
        ok("batches", json!([{"_id": "b1", "name": "JEE Morning", "fees": 1000}])),
    ]
}

#[tokio::test]
async fn test_fetch_snapshot_reads_every_collection() {
    let mut routes = core_collections();
    routes.push(ok("expenses", json!({"expenses": [{"title": "Rent", "amount": 300}]})));
    let base_url = stub_backend(routes).await;

    let raw = client(&base_url).fetch_snapshot().await.unwrap();

    assert!(raw.meta.fetched_at.is_some());
    assert_eq!(raw.meta.source.as_deref(), Some(base_url.trim_end_matches('/')));

    let snapshot = raw.normalize();
    assert_eq!(snapshot.fees.len(), 1);
    assert_eq!(snapshot.students.len(), 1);
    assert_eq!(snapshot.batches.len(), 1);
    assert_eq!(snapshot.expenses.len(), 1);
}

#[tokio::test]
async fn test_server_error_on_fees_fails_the_fetch() {
    let mut routes = core_collections();
    routes[0] = ("fees", 500, r#"{"message":"boom"}"#.to_string());
    let base_url = stub_backend(routes).await;

    let err = client(&base_url).fetch_snapshot().await.unwrap_err();

    match err {
        AppError::Fetch { url, message } => {
            assert!(url.ends_with("/api/fees"), "url was {}", url);
            assert!(message.contains("500"), "message was {}", message);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_missing_expenses_endpoint_yields_empty_collection() {
    let base_url = stub_backend(core_collections()).await;

    let raw = client(&base_url).fetch_snapshot().await.unwrap();

    assert_eq!(raw.expenses, json!([]));
    assert_eq!(raw.fees, json!([{"studentId": "s1", "paidAmount": 400}]));
}

#[tokio::test]
async fn test_students_and_batches_are_required() {
    for missing in ["students", "batches"] {
        let routes = core_collections()
            .into_iter()
            .filter(|(name, _, _)| *name != missing)
            .collect();
        let base_url = stub_backend(routes).await;

        let err = client(&base_url).fetch_snapshot().await.unwrap_err();

        match err {
            AppError::Fetch { url, message } => {
                assert!(url.ends_with(&format!("/{}", missing)), "url was {}", url);
                assert!(message.contains("404"), "message was {}", message);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}

#[tokio::test]
async fn test_non_json_body_is_a_fetch_error() {
    let base_url = stub_backend(vec![("fees", 200, "<html>login</html>".to_string())]).await;

    let err = client(&base_url).fetch_collection("fees").await.unwrap_err();

    assert!(matches!(err, AppError::Fetch { ref message, .. } if message.contains("not JSON")));
}

#[tokio::test]
async fn test_unreachable_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}/api", addr))
        .fetch_collection("fees")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Fetch { .. }));
}
