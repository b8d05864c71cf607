//! hyper glue: accept loop, per-connection service, type conversions.

use super::{Dispatcher, MockRequest, MockResponse};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Accept connections until `shutdown` fires or the listener fails.
///
/// Returning drops the listener and aborts every connection task.
pub(super) async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Connection accepted");
                    connections.spawn(serve_connection(stream, Arc::clone(&dispatcher)));
                }
                Err(e) => {
                    error!(error = %e, "Error while accepting TCP connection");
                    break;
                }
            },
        }
        while connections.try_join_next().is_some() {}
    }
}

async fn serve_connection(stream: TcpStream, dispatcher: Arc<Dispatcher>) {
    let service = service_fn(move |req: hyper::Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(respond(&dispatcher, req).await) }
    });

    if let Err(e) = http1::Builder::new()
        .keep_alive(true)
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!(error = %e, "Error while serving HTTP connection");
    }
}

async fn respond(dispatcher: &Dispatcher, req: hyper::Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(error = %e, "Failed to read request body");
            return plain(StatusCode::BAD_REQUEST);
        }
    };

    let request = MockRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: body.to_vec(),
    };

    into_hyper(dispatcher.handle(&request))
}

fn into_hyper(response: MockResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|e| {
            error!(error = %e, "Invalid response template");
            plain(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

fn plain(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
