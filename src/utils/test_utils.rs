//! A throwaway HTTP server that speaks just enough of the Ollama API for tests.
//!
//! It runs on a plain thread so that both `#[tokio::test]` code and blocking tests can use it.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::core::generation::GenerationRequest;

pub enum MockStep {
    /// Write one NDJSON line and flush it.
    Line(String),
    /// Block until the test sends (or drops its sender).
    WaitFor(Receiver<()>),
}

impl MockStep {
    pub fn line(text: &str) -> Self {
        MockStep::Line(text.to_string())
    }
}

#[derive(Debug, Default)]
pub struct CapturedRequest {
    pub request_line: String,
    pub body: String,
}

pub struct MockOllama {
    pub base_url: String,
    handle: JoinHandle<CapturedRequest>,
}

impl MockOllama {
    /// Wait for the single connection to be served and return what the client sent.
    pub fn finish(self) -> CapturedRequest {
        self.handle.join().expect("mock server thread panicked")
    }
}

/// Serve exactly one request: answer with `status`, then play `steps` as the body.
pub fn spawn_mock_ollama(status: u16, steps: Vec<MockStep>) -> MockOllama {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");

    let handle = std::thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return CapturedRequest::default();
        };
        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
        let captured = read_http_request(&mut stream).unwrap_or_default();

        let reason = if status < 400 { "OK" } else { "Error" };
        let head = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n"
        );
        if write_flushed(&mut stream, head.as_bytes()).is_err() {
            return captured;
        }

        for step in steps {
            match step {
                MockStep::Line(line) => {
                    // The client may already have hung up; keep playing so waits still resolve.
                    let _ = write_flushed(&mut stream, format!("{line}\n").as_bytes());
                }
                MockStep::WaitFor(release) => {
                    let _ = release.recv();
                }
            }
        }
        captured
    });

    MockOllama {
        base_url: format!("http://{addr}"),
        handle,
    }
}

fn write_flushed(stream: &mut TcpStream, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(bytes)?;
    stream.flush()
}

fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk).map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }
    let header_end = header_end.unwrap_or(buffer.len());

    let header_text = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream.read(&mut chunk).map_err(|err| err.to_string())?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Ok(CapturedRequest {
        request_line,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// A base URL with nothing listening behind it.
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    drop(listener);
    format!("http://{addr}")
}

pub fn test_request(base_url: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: "Once upon a time".to_string(),
        system: None,
        model: "test-model".to_string(),
        temperature: 0.7,
        token_limit: 140,
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    }
}
