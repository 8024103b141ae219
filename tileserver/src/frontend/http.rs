//! HTTP front end.
//!
//! Serves `GET /{z}/{x}/{y}.png`. Every other path, every unsupported tile
//! and every internal failure is answered with the same plain-text 404.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use regex::Regex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coord::TileCoord;
use crate::service::{TileLookup, TileService};

/// Body of every 404 response.
pub const NOT_FOUND_BODY: &str = "Sorry, we couldn't find the requested Tile";

fn tile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // (\d+) zoom, (\d+) column, (\d+) row
        Regex::new(r"^/(\d+)/(\d+)/(\d+)\.png$").unwrap()
    })
}

/// Extract the tile from a request path such as `/3/2/1.png`.
///
/// Returns `None` for other paths and for coordinates outside the grid.
pub fn parse_tile_path(path: &str) -> Option<TileCoord> {
    let captures = tile_pattern().captures(path)?;
    let zoom = captures[1].parse().ok()?;
    let x = captures[2].parse().ok()?;
    let y = captures[3].parse().ok()?;
    TileCoord::checked(zoom, x, y).ok()
}

/// Router answering every path through [`tile_handler`].
pub fn router(service: Arc<TileService>) -> Router {
    Router::new().fallback(tile_handler).with_state(service)
}

/// Serve on `addr` until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    service: Arc<TileService>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, service, shutdown).await
}

/// Serve on an already bound listener until `shutdown` is cancelled.
pub async fn serve_listener(
    listener: TcpListener,
    service: Arc<TileService>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "HTTP front end listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("HTTP front end stopped");
    Ok(())
}

/// Resolve one request.
pub async fn tile_handler(
    State(service): State<Arc<TileService>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let Some(tile) = parse_tile_path(uri.path()) else {
        debug!(path = uri.path(), "Not a tile path");
        return not_found();
    };

    let lookup = tokio::task::spawn_blocking(move || service.fetch(&tile)).await;

    match lookup {
        Ok(Ok(TileLookup::Hit(data) | TileLookup::Rendered(data))) => png(Bytes::from(data)),
        Ok(Ok(TileLookup::Unsupported)) => {
            debug!(tile = %tile, "Tile unsupported");
            not_found()
        }
        Ok(Err(e)) => {
            warn!(tile = %tile, error = %e, "HTTP tile request failed");
            not_found()
        }
        Err(e) => {
            warn!(tile = %tile, error = %e, "HTTP render task failed");
            not_found()
        }
    }
}

fn png(data: Bytes) -> Response {
    let mut response = Response::new(Body::from(data));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        NOT_FOUND_BODY,
    )
        .into_response()
}
