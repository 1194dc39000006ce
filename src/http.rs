//! Minimal HTTP/1.1 adapter over `tokio::net`: one request per connection,
//! JSON in and out, plus a Server-Sent-Events stream of pixel frames.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::broadcast::FRAME_EVENT;
use crate::commands::{dispatch, Reply, EVENTS_PATH};
use crate::error::Result;
use crate::services::ControlService;

const MAX_BODY_BYTES: usize = 1 << 20;
const MAX_HEADER_LINES: usize = 100;
/// Budget for the whole request: line, headers and body.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Request {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

/// Read one request. `Ok(None)` when the peer closed before sending one.
pub(crate) async fn read_request<R>(reader: &mut BufReader<R>) -> io::Result<Option<Request>>
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return Err(invalid_data("malformed request line"));
    };
    let method = method.to_ascii_uppercase();
    let path = path.to_string();

    let mut content_length = 0usize;
    for _ in 0..MAX_HEADER_LINES {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let header = line.trim_end();
        if header.is_empty() {
            let body = read_body(reader, content_length).await?;
            return Ok(Some(Request { method, path, body }));
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid_data("bad content-length"))?;
            }
        }
    }
    Err(invalid_data("unterminated headers"))
}

/// `read_request` bounded by `limit`. A stalled peer yields `TimedOut`.
pub(crate) async fn read_request_within<R>(
    reader: &mut BufReader<R>,
    limit: Duration,
) -> io::Result<Option<Request>>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(limit, read_request(reader)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "request read timed out")),
    }
}

async fn read_body<R>(reader: &mut BufReader<R>, length: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    if length > MAX_BODY_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "body too large"));
    }
    let mut body = vec![0; length];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

async fn write_response<W>(writer: &mut W, status: u16, body: Option<&[u8]>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, DELETE, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Connection: close\r\n",
        status,
        reason_phrase(status)
    );
    match body {
        Some(body) => {
            head.push_str(&format!(
                "Content-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                body.len()
            ));
            writer.write_all(head.as_bytes()).await?;
            writer.write_all(body).await?;
        }
        None => {
            head.push_str("Content-Length: 0\r\n\r\n");
            writer.write_all(head.as_bytes()).await?;
        }
    }
    writer.flush().await
}

async fn write_reply<W>(writer: &mut W, reply: &Reply) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(&reply.body).map_err(io::Error::from)?;
    write_response(writer, reply.status, Some(&body)).await
}

/// Holds the connection open and forwards every pushed frame. The
/// connection counts as one observer until it drops.
async fn stream_events<W>(writer: &mut W, service: &ControlService) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let engine = service.engine();
    let mut subscription = engine.broadcaster().subscribe();

    writer
        .write_all(
            b"HTTP/1.1 200 OK\r\n\
              Content-Type: text/event-stream\r\n\
              Cache-Control: no-cache\r\n\
              Connection: keep-alive\r\n\
              Access-Control-Allow-Origin: *\r\n\r\n",
        )
        .await?;
    let initial = serde_json::to_string(&engine.snapshot()).map_err(io::Error::from)?;
    write_event(writer, &initial).await?;

    while let Some(frame) = subscription.next().await {
        write_event(writer, &frame).await?;
    }
    Ok(())
}

async fn write_event<W>(writer: &mut W, data: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let event = format!("event: {}\ndata: {}\n\n", FRAME_EVENT, data);
    writer.write_all(event.as_bytes()).await?;
    writer.flush().await
}

async fn handle_connection(stream: TcpStream, service: ControlService) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let request = match read_request_within(&mut reader, READ_TIMEOUT).await {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(e),
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
            return write_response(&mut write, 413, None).await;
        }
        Err(e) => {
            let _ = write_response(&mut write, 400, None).await;
            return Err(e);
        }
    };

    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => write_response(&mut write, 204, None).await,
        ("GET", EVENTS_PATH) => stream_events(&mut write, &service).await,
        (method, path) => {
            let reply = dispatch(&service, method, path, &request.body);
            write_reply(&mut write, &reply).await
        }
    }
}

/// Accept connections until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: ControlService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    if let Ok(address) = listener.local_addr() {
        log::info!("[http] Listening on http://{}", address);
    }
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let service = service.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, service).await {
                            log::debug!("[http] Connection from {} ended: {}", peer, e);
                        }
                    });
                }
                Err(e) => log::warn!("[http] Accept failed: {}", e),
            },
        }
    }
    log::info!("[http] Listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(raw: &[u8]) -> io::Result<Option<Request>> {
        let mut reader = BufReader::new(raw);
        read_request(&mut reader).await
    }

    #[tokio::test]
    async fn reads_request_with_body() {
        let raw = b"post /effects HTTP/1.1\r\nHost: x\r\ncontent-length: 2\r\n\r\n{}";
        let request = parse(raw).await.unwrap().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/effects");
        assert_eq!(request.body, b"{}");
    }

    #[tokio::test]
    async fn request_without_body() {
        let request = parse(b"GET /state HTTP/1.1\r\n\r\n").await.unwrap().unwrap();
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn closed_connection_is_not_an_error() {
        assert_eq!(parse(b"").await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let raw = format!("POST /presets HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY_BYTES + 1);
        let err = parse(raw.as_bytes()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_client_times_out() {
        let (client, server) = tokio::io::duplex(64);
        let mut client = client;
        client.write_all(b"GET /state HTTP/1.1\r\nHost: x\r\n").await.unwrap();
        let mut reader = BufReader::new(server);
        let err = read_request_within(&mut reader, READ_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        drop(client);
    }

    #[tokio::test]
    async fn complete_request_beats_the_deadline() {
        let mut reader = BufReader::new(&b"GET /state HTTP/1.1\r\n\r\n"[..]);
        let request = read_request_within(&mut reader, READ_TIMEOUT)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.path, "/state");
    }

    #[tokio::test]
    async fn responses_carry_cors_and_length() {
        let mut out = Vec::new();
        write_response(&mut out, 200, Some(b"{}")).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *"));
        assert!(text.ends_with("Content-Length: 2\r\n\r\n{}"));
    }
}
