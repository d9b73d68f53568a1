//! One-shot loopback HTTP server for exercising the backend clients.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

pub(crate) struct StubResponse {
    status: u16,
    body: String,
    delay: Duration,
}

impl StubResponse {
    pub(crate) fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Serves exactly one request and returns the base URL plus a handle yielding the
/// raw request (head and body) the client sent.
pub(crate) fn serve_once(response: StubResponse) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("stub server should bind");
    let addr = listener.local_addr().expect("stub server address");

    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("stub server should accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stub stream"));

        let mut head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).expect("read request line") == 0 {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
            let end_of_head = line == "\r\n";
            head.push_str(&line);
            if end_of_head {
                break;
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).expect("read request body");

        std::thread::sleep(response.delay);
        let reply = format!(
            "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            response.status,
            response.body.len(),
            response.body
        );
        let mut stream = stream;
        let _ = stream.write_all(reply.as_bytes());
        let _ = stream.flush();

        head.push_str(&String::from_utf8_lossy(&body));
        head
    });

    (format!("http://{addr}"), handle)
}

/// Base URL of a loopback port with nothing listening on it.
pub(crate) fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let addr = listener.local_addr().expect("probe port address");
    drop(listener);
    format!("http://{addr}")
}
