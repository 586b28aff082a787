use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::{Request, Respond, ResponseTemplate};

/// Deterministic, non-repeating-looking payload so misordered bytes show up.
pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Serves `body` honouring `Range: bytes=a-b` the way a real file server does.
pub struct RangeResponder {
    pub body: Vec<u8>,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.split_once('-'))
            .and_then(|(s, e)| Some((s.parse::<usize>().ok()?, e.parse::<usize>().ok()?)));

        match range {
            Some((start, end)) if start <= end && end < self.body.len() => {
                ResponseTemplate::new(206)
                    .set_body_bytes(self.body[start..=end].to_vec())
                    .insert_header(
                        "content-range",
                        format!("bytes {}-{}/{}", start, end, self.body.len()).as_str(),
                    )
            }
            Some(_) => ResponseTemplate::new(416),
            None => ResponseTemplate::new(200).set_body_bytes(self.body.clone()),
        }
    }
}

/// Plain HTTP/1.1 server over `body`. The range starting at `stall_start`
/// gets its full 206 header but only `stall_after` body bytes, then the
/// connection hangs. Returns the URL of `/files/f.bin`.
pub async fn spawn_stalling_server(body: Vec<u8>, stall_start: usize, stall_after: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = Arc::new(body);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_connection(socket, body.clone(), stall_start, stall_after));
        }
    });
    format!("http://{}/files/f.bin", addr)
}

async fn serve_connection(mut socket: TcpStream, body: Arc<Vec<u8>>, stall_start: usize, stall_after: usize) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let head_end = loop {
            if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
            }
        };
        let request = String::from_utf8_lossy(&pending[..head_end]).into_owned();
        pending.drain(..head_end);

        if request.starts_with("HEAD ") {
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\naccept-ranges: bytes\r\n\r\n",
                body.len()
            );
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            continue;
        }

        let range = request.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if !name.trim().eq_ignore_ascii_case("range") {
                return None;
            }
            let (s, e) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
            Some((s.parse::<usize>().ok()?, e.parse::<usize>().ok()?))
        });
        let (start, end) = range.unwrap_or((0, body.len() - 1));
        let head = format!(
            "HTTP/1.1 206 Partial Content\r\ncontent-length: {}\r\ncontent-range: bytes {}-{}/{}\r\n\r\n",
            end - start + 1,
            start,
            end,
            body.len()
        );
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }

        if start == stall_start {
            let _ = socket.write_all(&body[start..start + stall_after]).await;
            let _ = socket.flush().await;
            std::future::pending::<()>().await;
        }
        if socket.write_all(&body[start..=end]).await.is_err() {
            return;
        }
    }
}

/// Polls until the file at `path` is exactly `len` bytes long.
pub async fn wait_for_len(path: &Path, len: u64) {
    for _ in 0..500 {
        if std::fs::metadata(path).map(|m| m.len() == len).unwrap_or(false) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never reached {} bytes", path.display(), len);
}
