use bytes::Bytes;
use http::{Request, Response, StatusCode};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use nano_http::handler::{BoxError, make_handler};
use nano_http::protocol::SegmentedBody;
use nano_http::server::Server;
use nano_thread::Priority;

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    Server::builder()
        .address("127.0.0.1:8080")
        .worker_threads(4)
        .worker_priority(Priority::ABOVE_NORMAL)
        .handler(make_handler(hello_world))
        .build()
        .expect("server configuration incomplete")
        .run()
        .expect("server stopped abnormally");
}

async fn hello_world(request: Request<Bytes>) -> Result<Response<SegmentedBody>, BoxError> {
    info!(path = request.uri().path(), "incoming request");

    let response = Response::builder().status(StatusCode::OK).body(SegmentedBody::from("Hello World!\r\n"))?;

    Ok(response)
}
