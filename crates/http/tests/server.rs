//! End-to-end tests driving a live server over real TCP.

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use nano_http::handler::{BoxError, make_handler};
use nano_http::protocol::{EngineError, PeerAddr, SegmentedBody, TransportError};
use nano_http::server::{Server, ServerHandle};

const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok";

async fn start_server() -> ServerHandle {
    Server::builder()
        .address("127.0.0.1:0")
        .handler(make_handler(|request: Request<Bytes>| async move {
            assert!(request.extensions().get::<PeerAddr>().is_some(), "peer address missing from request");
            let response = Response::builder()
                .status(StatusCode::OK)
                .header(http::header::CONTENT_LENGTH, 2)
                .body(SegmentedBody::from("ok"))
                .unwrap();
            Ok::<_, BoxError>(response)
        }))
        .build()
        .unwrap()
        .start()
        .await
        .unwrap()
}

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn serves_sequential_requests_on_one_connection() {
    let handle = start_server().await;
    let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();

    stream.write_all(b"GET /x HTTP/1.1\r\nHost: a\r\nConnection: keep-alive\r\n\r\n").await.unwrap();
    assert_eq!(read_exactly(&mut stream, OK_RESPONSE.len()).await, OK_RESPONSE);

    // the connection was kept alive: the second exchange reuses it
    stream.write_all(b"GET /y HTTP/1.1\r\nHost: a\r\nConnection: close\r\n\r\n").await.unwrap();
    assert_eq!(read_exactly(&mut stream, OK_RESPONSE.len()).await, OK_RESPONSE);

    // after Connection: close the server ends the connection
    let mut trailing = [0u8; 1];
    assert_eq!(stream.read(&mut trailing).await.unwrap(), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn request_body_reaches_the_handler() {
    let handle = Server::builder()
        .address("127.0.0.1:0")
        .handler(make_handler(|request: Request<Bytes>| async move {
            let body = format!("len={}", request.body().len());
            let response = Response::builder().status(StatusCode::OK).body(SegmentedBody::from(body)).unwrap();
            Ok::<_, BoxError>(response)
        }))
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();

    let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();
    stream
        .write_all(b"POST /submit HTTP/1.1\r\nHost: a\r\nConnection: close\r\nContent-Length: 5\r\n\r\nhello")
        .await
        .unwrap();

    let expected = b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nlen=5";
    assert_eq!(read_exactly(&mut stream, expected.len()).await, expected);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn binding_a_taken_address_fails_with_address_in_use() {
    let handle = start_server().await;
    let taken = handle.local_addr();

    let result = Server::builder()
        .address(taken)
        .handler(make_handler(|_request: Request<Bytes>| async move {
            Ok::<_, BoxError>(Response::builder().status(StatusCode::OK).body(SegmentedBody::new()).unwrap())
        }))
        .build()
        .unwrap()
        .start()
        .await;

    assert!(matches!(result, Err(EngineError::Transport { source: TransportError::AddressInUse })));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn force_shutdown_closes_live_connections() {
    let handle = start_server().await;
    let mut stream = TcpStream::connect(handle.local_addr()).await.unwrap();

    // complete one exchange so the session is definitely registered
    stream.write_all(b"GET /x HTTP/1.1\r\nHost: a\r\nConnection: keep-alive\r\n\r\n").await.unwrap();
    assert_eq!(read_exactly(&mut stream, OK_RESPONSE.len()).await, OK_RESPONSE);

    handle.force_shutdown().await.unwrap();

    // the idle keep-alive session honors the close: the client sees EOF
    let mut trailing = [0u8; 1];
    assert_eq!(stream.read(&mut trailing).await.unwrap(), 0);
}

#[tokio::test]
async fn builder_rejects_missing_pieces() {
    let missing_address = Server::builder()
        .handler(make_handler(|_request: Request<Bytes>| async move {
            Ok::<_, BoxError>(Response::builder().status(StatusCode::OK).body(SegmentedBody::new()).unwrap())
        }))
        .build();
    assert!(missing_address.is_err());

    let missing_handler = Server::builder().address("127.0.0.1:0").build();
    assert!(missing_handler.is_err());
}
