//! Raw-TCP HTTP stub for exercising outbound calls in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Canned reply for every request whose path starts with `prefix`.
#[derive(Clone, Debug)]
pub struct MockRoute {
    prefix: String,
    status_line: String,
    body: String,
}

impl MockRoute {
    pub fn new(prefix: &str, status_line: &str, body: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            status_line: status_line.to_string(),
            body: body.to_string(),
        }
    }
}

pub type Captured = Arc<Mutex<Vec<CapturedRequest>>>;

/// Serves `routes` until the test ends; unmatched paths get a 404.
pub async fn spawn_mock_server(routes: Vec<MockRoute>) -> (String, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let routes = Arc::new(routes);

    let sink = captured.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let routes = routes.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                serve_one(stream, &routes, &sink).await;
            });
        }
    });

    (format!("http://{addr}"), captured)
}

async fn serve_one(mut stream: TcpStream, routes: &[MockRoute], sink: &Captured) {
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 2048];
    let header_end = loop {
        let Ok(n) = stream.read(&mut tmp).await else {
            return;
        };
        if n == 0 {
            break None;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(i) = find_subsequence(&buf, b"\r\n\r\n") {
            break Some(i);
        }
    };
    let Some(header_end) = header_end else {
        return;
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut req_parts = request_line.split_whitespace();
    let method = req_parts.next().unwrap_or_default().to_string();
    let path = req_parts.next().unwrap_or_default().to_string();

    let mut headers: HashMap<String, String> = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
    }

    let content_len = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[(header_end + 4)..].to_vec();
    while body.len() < content_len {
        match stream.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&tmp[..n]),
        }
    }
    body.truncate(content_len);

    let route = routes.iter().find(|r| path.starts_with(&r.prefix));
    sink.lock().expect("capture lock").push(CapturedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    });

    let (status_line, response_body) = match route {
        Some(r) => (r.status_line.as_str(), r.body.as_str()),
        None => ("404 Not Found", "{}"),
    };
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response_body.len(),
        response_body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
