//! Raw socket front end.
//!
//! Protocol: the client connects and sends one line `z;x;y`. The server
//! answers with the raw PNG bytes and closes the connection. Malformed
//! requests, unsupported tiles and internal errors all close the connection
//! without a body.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::TileCacheStore;
use crate::coord::TileCoord;
use crate::service::{ServiceError, TileService};

/// Longest accepted request line, newline included.
pub const MAX_REQUEST_LINE: u64 = 256;

/// How long a client may take to send its request line.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// How long shutdown waits for connections in progress before aborting them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Parse a `z;x;y` request line. Trailing whitespace is ignored.
pub fn parse_request_line(line: &str) -> Option<TileCoord> {
    let mut parts = line.trim_end().split(';');

    let zoom = parts.next()?.parse().ok()?;
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    TileCoord::checked(zoom, x, y).ok()
}

/// Bounded pool of connection handlers in front of a [`TileService`].
#[derive(Clone)]
pub struct SocketFrontEnd {
    service: Arc<TileService>,
    prerendered: Option<Arc<TileCacheStore>>,
    workers: usize,
    read_timeout: Duration,
    shutdown_grace: Duration,
}

impl SocketFrontEnd {
    /// `prerendered` is a read-only tile tree consulted before the cache.
    pub fn new(
        service: Arc<TileService>,
        prerendered: Option<Arc<TileCacheStore>>,
        workers: usize,
    ) -> Self {
        Self {
            service,
            prerendered,
            workers: workers.max(1),
            read_timeout: READ_TIMEOUT,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    /// Override the request-line timeout and the shutdown grace period.
    pub fn with_timeouts(mut self, read_timeout: Duration, shutdown_grace: Duration) -> Self {
        self.read_timeout = read_timeout;
        self.shutdown_grace = shutdown_grace;
        self
    }

    /// Bind `addr` and serve until `shutdown` is cancelled.
    pub async fn bind_and_serve(&self, addr: SocketAddr, shutdown: CancellationToken) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Accept connections until `shutdown` is cancelled, then wait up to the
    /// grace period for the connections in progress to finish.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> io::Result<()> {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut connections = JoinSet::new();
        info!(
            addr = %listener.local_addr()?,
            workers = self.workers,
            "Socket front end listening"
        );

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };

            while connections.try_join_next().is_some() {}

            let handler = self.clone();
            connections.spawn(async move {
                handler.handle_connection(stream, peer).await;
                drop(permit);
            });
        }

        debug!(in_flight = connections.len(), "Waiting for in-flight socket requests");
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                aborted = connections.len(),
                grace_secs = self.shutdown_grace.as_secs(),
                "Aborting socket connections still open after grace period"
            );
            connections.shutdown().await;
        }

        info!("Socket front end stopped");
        Ok(())
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        let mut line = String::new();
        {
            let mut reader = BufReader::new((&mut stream).take(MAX_REQUEST_LINE));
            match tokio::time::timeout(self.read_timeout, reader.read_line(&mut line)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    debug!(%peer, error = %e, "Failed to read request line");
                    return;
                }
                Err(_) => {
                    debug!(%peer, "Timed out waiting for request line");
                    return;
                }
            }
        }

        let Some(tile) = parse_request_line(&line) else {
            debug!(%peer, line = line.trim_end(), "Malformed socket request");
            return;
        };

        let handler = self.clone();
        let resolved = tokio::task::spawn_blocking(move || handler.resolve(&tile)).await;

        let data = match resolved {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                debug!(%peer, tile = %tile, "Tile unsupported");
                return;
            }
            Ok(Err(e)) => {
                warn!(%peer, tile = %tile, error = %e, "Socket request failed");
                return;
            }
            Err(e) => {
                warn!(%peer, tile = %tile, error = %e, "Socket render task failed");
                return;
            }
        };

        if let Err(e) = stream.write_all(&data).await {
            debug!(%peer, error = %e, "Client went away");
            return;
        }
        let _ = stream.shutdown().await;
    }

    /// Prerendered tree first, then the cache, then render and store.
    fn resolve(&self, tile: &TileCoord) -> Result<Option<Vec<u8>>, ServiceError> {
        if let Some(prerendered) = &self.prerendered {
            if let Some(data) = prerendered.get(tile)? {
                return Ok(Some(data));
            }
        }
        Ok(self.service.fetch(tile)?.into_bytes())
    }
}
