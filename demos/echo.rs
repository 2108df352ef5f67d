//! Minimal TCP server showing the parser wired to a tokio read loop.
//!
//! Every request is answered with a small plain-text echo of its method and
//! target. Run with `cargo run --example echo`, then:
//!
//! ```text
//! curl -v http://127.0.0.1:8080/hello?who=world
//! ```

use pulse_http::limits::MINIMUM_POST_PADDING;
use pulse_http::{Control, ErrorKind, Handler, Request, Session, Status};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const READ_CAPACITY: usize = 16 * 1024;

struct Echo {
    outbox: Vec<u8>,
}

impl Handler for Echo {
    type Upgrade = ();

    fn on_request(&mut self, request: &mut Request) -> Control<()> {
        let mut body = Vec::new();
        body.extend_from_slice(request.method());
        body.push(b' ');
        body.extend_from_slice(request.full_url());
        body.push(b'\n');

        self.outbox
            .extend_from_slice(format!("HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n", body.len()).as_bytes());
        self.outbox.extend_from_slice(&body);
        Control::Continue
    }

    fn on_data(&mut self, _chunk: &[u8], _is_end: bool) -> Control<()> {
        // body bytes are acknowledged and dropped
        Control::Continue
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:8080").await?;
    println!("echo server on http://127.0.0.1:8080");

    loop {
        let (stream, _) = listener.accept().await?;
        tokio::spawn(async move {
            let _ = serve(stream).await;
        });
    }
}

async fn serve(mut stream: TcpStream) -> std::io::Result<()> {
    let mut session = Session::new();
    let mut handler = Echo { outbox: Vec::new() };
    // read buffer with the post-padding the parser demands
    let mut buf = vec![0u8; READ_CAPACITY + MINIMUM_POST_PADDING];

    loop {
        let read = stream.read(&mut buf[..READ_CAPACITY]).await?;
        if read == 0 {
            return Ok(());
        }

        match session.consume(&mut buf, read, &mut handler) {
            Ok(Status::Ready) => {
                stream.write_all(&handler.outbox).await?;
                handler.outbox.clear();
            }
            Ok(Status::Upgraded(())) | Ok(Status::Closed) => return Ok(()),
            Err(kind) => {
                let _ = respond_error(&mut stream, kind).await;
                return Ok(());
            }
        }
    }
}

async fn respond_error(stream: &mut TcpStream, kind: ErrorKind) -> std::io::Result<()> {
    let body = kind.to_string();
    let head = format!(
        "HTTP/1.1 400 Bad Request\r\nconnection: close\r\ncontent-length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await
}
