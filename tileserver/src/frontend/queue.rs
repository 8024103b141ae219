//! File-queue front end.
//!
//! An external enqueuer drops empty marker files named
//! `{z}-{x}-{y}.request`. Their paths arrive on a channel, either from that
//! enqueuer or from the bundled [`MarkerScanner`]. For each path the worker
//! claims the marker with an exclusive lock, renders the tile into its output
//! store and deletes the marker. Several worker processes may share one
//! marker directory; the claim makes sure only one of them renders a marker.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::lock::{LockError, MarkerClaim};
use crate::coord::TileCoord;
use crate::service::TileService;

/// Extension of marker files.
pub const MARKER_EXTENSION: &str = "request";

/// How long the worker waits for a path before re-checking for shutdown.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between two marker directory scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(2);

/// A marker still on disk is sent again after this long.
const RESEND_AFTER: Duration = Duration::from_secs(60);

/// Granularity of the scanner's interruptible sleep.
const SCANNER_TICK: Duration = Duration::from_millis(100);

/// Parse a marker file name such as `7-3-4.request`.
///
/// Returns `None` for other names and for coordinates outside the grid.
pub fn parse_marker_name(name: &str) -> Option<TileCoord> {
    let stem = name.strip_suffix(MARKER_EXTENSION)?.strip_suffix('.')?;
    let mut parts = stem.split('-');

    let zoom = parts.next()?.parse().ok()?;
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    TileCoord::checked(zoom, x, y).ok()
}

/// Marker file name for a tile.
pub fn marker_name(tile: &TileCoord) -> String {
    format!("{}-{}-{}.{}", tile.zoom, tile.x, tile.y, MARKER_EXTENSION)
}

/// What happened to one dequeued path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Rendered, stored and marker deleted.
    Rendered,
    /// Outside the map data; marker deleted.
    Unsupported,
    /// Another worker holds the claim; item dropped.
    Contended,
    /// The marker was already gone; item dropped.
    Vanished,
    /// Unparseable marker name; marker deleted.
    Malformed,
    /// Render or storage failed; marker kept for a later attempt.
    Failed,
}

/// Running totals of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub rendered: u64,
    pub unsupported: u64,
    pub contended: u64,
    pub vanished: u64,
    pub malformed: u64,
    pub failed: u64,
}

impl QueueStats {
    fn record(&mut self, outcome: QueueOutcome) {
        match outcome {
            QueueOutcome::Rendered => self.rendered += 1,
            QueueOutcome::Unsupported => self.unsupported += 1,
            QueueOutcome::Contended => self.contended += 1,
            QueueOutcome::Vanished => self.vanished += 1,
            QueueOutcome::Malformed => self.malformed += 1,
            QueueOutcome::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rendered, {} unsupported, {} contended, {} vanished, {} malformed, {} failed",
            self.rendered,
            self.unsupported,
            self.contended,
            self.vanished,
            self.malformed,
            self.failed
        )
    }
}

/// Single-threaded consumer of marker paths.
pub struct FileQueueWorker {
    service: Arc<TileService>,
    poll_timeout: Duration,
}

impl FileQueueWorker {
    /// `service` must write into the queue's output directory.
    pub fn new(service: Arc<TileService>, poll_timeout: Duration) -> Self {
        Self {
            service,
            poll_timeout,
        }
    }

    /// Handle one marker path. Blocking.
    pub fn process(&self, path: &Path) -> QueueOutcome {
        let Some(tile) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_marker_name)
        else {
            warn!(path = %path.display(), "Dropping malformed marker");
            remove_marker(path);
            return QueueOutcome::Malformed;
        };

        let claim = match MarkerClaim::try_acquire(path) {
            Ok(Some(claim)) => claim,
            Ok(None) => {
                debug!(path = %path.display(), "Marker claimed elsewhere");
                return QueueOutcome::Contended;
            }
            Err(LockError::Vanished(_)) => return QueueOutcome::Vanished,
            Err(e) => {
                warn!(error = %e, "Could not claim marker");
                return QueueOutcome::Failed;
            }
        };

        // the previous holder may have finished and unlinked it
        if !claim.path().exists() {
            return QueueOutcome::Vanished;
        }

        let outcome = match self.service.render_and_store(&tile) {
            Ok(Some(_)) => QueueOutcome::Rendered,
            Ok(None) => QueueOutcome::Unsupported,
            Err(e) => {
                warn!(tile = %tile, error = %e, "Queued render failed, keeping marker");
                return QueueOutcome::Failed;
            }
        };

        remove_marker(claim.path());
        debug!(tile = %tile, ?outcome, "Marker processed");
        outcome
    }

    /// Consume paths until the channel closes or shutdown is requested.
    ///
    /// Shutdown is noticed within one poll timeout; an item in progress is
    /// always finished first.
    pub fn run(&self, rx: Receiver<PathBuf>, shutdown: &CancellationToken) -> QueueStats {
        let mut stats = QueueStats::default();
        info!(
            output = %self.service.store().root().display(),
            poll_timeout_secs = self.poll_timeout.as_secs(),
            "File-queue worker started"
        );

        while !shutdown.is_cancelled() {
            match rx.recv_timeout(self.poll_timeout) {
                Ok(path) => stats.record(self.process(&path)),
                Err(RecvTimeoutError::Timeout) => trace!("Queue poll timed out"),
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Queue channel closed");
                    break;
                }
            }
        }

        info!(stats = %stats, "File-queue worker stopped");
        stats
    }

    /// Run the worker on a named OS thread.
    pub fn spawn(
        self,
        rx: Receiver<PathBuf>,
        shutdown: CancellationToken,
    ) -> io::Result<JoinHandle<QueueStats>> {
        thread::Builder::new()
            .name("file-queue".to_string())
            .spawn(move || self.run(rx, &shutdown))
    }
}

fn remove_marker(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to delete marker");
        }
    }
}

/// Periodically lists `*.request` files and feeds them to a worker.
pub struct MarkerScanner {
    directory: PathBuf,
    interval: Duration,
}

impl MarkerScanner {
    pub fn new(directory: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            directory: directory.into(),
            interval,
        }
    }

    /// Marker files currently in the directory, sorted by name.
    pub fn scan(&self) -> Vec<PathBuf> {
        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&self.directory.to_string_lossy()),
            MARKER_EXTENSION
        );
        match glob::glob(&pattern) {
            Ok(paths) => {
                let mut markers: Vec<PathBuf> = paths.flatten().filter(|p| p.is_file()).collect();
                markers.sort();
                markers
            }
            Err(e) => {
                warn!(dir = %self.directory.display(), error = %e, "Invalid marker pattern");
                Vec::new()
            }
        }
    }

    /// Scan until shutdown or until the receiving side hangs up.
    pub fn run(&self, tx: Sender<PathBuf>, shutdown: &CancellationToken) {
        let mut sent: HashMap<PathBuf, Instant> = HashMap::new();
        info!(
            dir = %self.directory.display(),
            interval_ms = self.interval.as_millis() as u64,
            "Marker scanner started"
        );

        'scan: while !shutdown.is_cancelled() {
            let markers = self.scan();
            let on_disk: HashSet<&PathBuf> = markers.iter().collect();
            sent.retain(|path, _| on_disk.contains(path));

            for marker in markers {
                let due = sent
                    .get(&marker)
                    .map_or(true, |at| at.elapsed() >= RESEND_AFTER);
                if !due {
                    continue;
                }
                if tx.send(marker.clone()).is_err() {
                    break 'scan;
                }
                sent.insert(marker, Instant::now());
            }

            let wake = Instant::now() + self.interval;
            while Instant::now() < wake && !shutdown.is_cancelled() {
                thread::sleep(SCANNER_TICK.min(self.interval));
            }
        }

        info!("Marker scanner stopped");
    }

    /// Run the scanner on a named OS thread.
    pub fn spawn(self, tx: Sender<PathBuf>, shutdown: CancellationToken) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("marker-scanner".to_string())
            .spawn(move || self.run(tx, &shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TileCacheStore;
    use crate::render::{RenderError, RenderOutput, Renderer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use tempfile::TempDir;

    struct MockRenderer {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl MockRenderer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::ZERO,
            }
        }
    }

    impl Renderer for MockRenderer {
        fn render(&self, tile: &TileCoord) -> Result<RenderOutput, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if self.fail {
                return Err(RenderError::Failed {
                    tile: *tile,
                    reason: "mock".to_string(),
                });
            }
            if tile.zoom == 0 {
                return Ok(RenderOutput::Unsupported);
            }
            Ok(RenderOutput::Raster(tile.to_string().into_bytes()))
        }
    }

    struct Fixture {
        temp_dir: TempDir,
        renderer: Arc<MockRenderer>,
        worker: FileQueueWorker,
    }

    impl Fixture {
        fn new(renderer: MockRenderer) -> Self {
            let temp_dir = TempDir::new().unwrap();
            std::fs::create_dir_all(temp_dir.path().join("queue")).unwrap();
            let store = Arc::new(TileCacheStore::open(temp_dir.path().join("out")).unwrap());
            let renderer = Arc::new(renderer);
            let service = Arc::new(TileService::new(store, renderer.clone()));
            Self {
                temp_dir,
                renderer,
                worker: FileQueueWorker::new(service, Duration::from_millis(50)),
            }
        }

        fn marker(&self, name: &str) -> PathBuf {
            let path = self.temp_dir.path().join("queue").join(name);
            std::fs::write(&path, b"").unwrap();
            path
        }

        fn output(&self, tile: TileCoord) -> Option<Vec<u8>> {
            self.worker.service.store().get(&tile).unwrap()
        }
    }

    #[test]
    fn test_parse_marker_name() {
        assert_eq!(parse_marker_name("7-3-4.request"), Some(TileCoord::new(7, 3, 4)));
        assert_eq!(parse_marker_name("0-0-0.request"), Some(TileCoord::new(0, 0, 0)));
        assert_eq!(parse_marker_name("7-3-4.png"), None);
        assert_eq!(parse_marker_name("7-3.request"), None);
        assert_eq!(parse_marker_name("7-3-4-1.request"), None);
        assert_eq!(parse_marker_name("7-x-4.request"), None);
        assert_eq!(parse_marker_name("1-2-0.request"), None);
        assert_eq!(marker_name(&TileCoord::new(7, 3, 4)), "7-3-4.request");
    }

    #[test]
    fn test_process_renders_and_deletes_marker() {
        let fixture = Fixture::new(MockRenderer::new());
        let marker = fixture.marker("7-3-4.request");

        assert_eq!(fixture.worker.process(&marker), QueueOutcome::Rendered);
        assert!(!marker.exists());
        assert_eq!(fixture.output(TileCoord::new(7, 3, 4)), Some(b"7/3/4".to_vec()));
    }

    #[test]
    fn test_contended_marker_is_dropped_without_render() {
        let fixture = Fixture::new(MockRenderer::new());
        let marker = fixture.marker("7-3-4.request");

        let held = MarkerClaim::try_acquire(&marker).unwrap().unwrap();
        assert_eq!(fixture.worker.process(&marker), QueueOutcome::Contended);
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 0);
        assert!(marker.exists());

        drop(held);
        assert_eq!(fixture.worker.process(&marker), QueueOutcome::Rendered);
        assert!(!marker.exists());
    }

    #[test]
    fn test_concurrent_workers_render_marker_once() {
        let fixture = Fixture::new(MockRenderer {
            delay: Duration::from_millis(300),
            ..MockRenderer::new()
        });
        let marker = fixture.marker("7-3-4.request");
        let second = FileQueueWorker::new(fixture.worker.service.clone(), Duration::from_millis(50));
        let barrier = std::sync::Barrier::new(2);

        let (a, b) = thread::scope(|scope| {
            let first = scope.spawn(|| {
                barrier.wait();
                fixture.worker.process(&marker)
            });
            let other = scope.spawn(|| {
                barrier.wait();
                second.process(&marker)
            });
            (first.join().unwrap(), other.join().unwrap())
        });

        let mut outcomes = [a, b];
        outcomes.sort_by_key(|o| *o != QueueOutcome::Rendered);
        assert_eq!(outcomes[0], QueueOutcome::Rendered, "{:?}", outcomes);
        assert!(
            matches!(outcomes[1], QueueOutcome::Contended | QueueOutcome::Vanished),
            "{:?}",
            outcomes
        );
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 1);
        assert!(!marker.exists());
        assert_eq!(fixture.output(TileCoord::new(7, 3, 4)), Some(b"7/3/4".to_vec()));
    }

    #[test]
    fn test_unsupported_marker_deleted() {
        let fixture = Fixture::new(MockRenderer::new());
        let marker = fixture.marker("0-0-0.request");

        assert_eq!(fixture.worker.process(&marker), QueueOutcome::Unsupported);
        assert!(!marker.exists());
        assert_eq!(fixture.output(TileCoord::new(0, 0, 0)), None);
    }

    #[test]
    fn test_failed_render_keeps_marker() {
        let fixture = Fixture::new(MockRenderer {
            fail: true,
            ..MockRenderer::new()
        });
        let marker = fixture.marker("3-1-1.request");

        assert_eq!(fixture.worker.process(&marker), QueueOutcome::Failed);
        assert!(marker.exists());
    }

    #[test]
    fn test_malformed_marker_removed() {
        let fixture = Fixture::new(MockRenderer::new());
        let marker = fixture.marker("garbage.request");

        assert_eq!(fixture.worker.process(&marker), QueueOutcome::Malformed);
        assert!(!marker.exists());
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_marker_vanished() {
        let fixture = Fixture::new(MockRenderer::new());
        let path = fixture.temp_dir.path().join("queue").join("2-1-1.request");

        assert_eq!(fixture.worker.process(&path), QueueOutcome::Vanished);
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_run_drains_channel_until_closed() {
        let fixture = Fixture::new(MockRenderer::new());
        let (tx, rx) = mpsc::channel();
        tx.send(fixture.marker("1-0-0.request")).unwrap();
        tx.send(fixture.marker("1-1-0.request")).unwrap();
        // duplicate enqueue of an already processed marker
        tx.send(fixture.temp_dir.path().join("queue").join("1-0-0.request"))
            .unwrap();
        drop(tx);

        let stats = fixture.worker.run(rx, &CancellationToken::new());

        assert_eq!(stats.rendered, 2);
        assert_eq!(stats.vanished, 1);
        assert_eq!(fixture.renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let fixture = Fixture::new(MockRenderer::new());
        let (_tx, rx) = mpsc::channel::<PathBuf>();
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(fixture.worker.run(rx, &token), QueueStats::default());
    }

    #[test]
    fn test_scanner_lists_markers_only() {
        let fixture = Fixture::new(MockRenderer::new());
        fixture.marker("2-1-1.request");
        fixture.marker("2-0-1.request");
        fixture.marker("notes.txt");

        let scanner = MarkerScanner::new(fixture.temp_dir.path().join("queue"), DEFAULT_SCAN_INTERVAL);
        let names: Vec<_> = scanner
            .scan()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["2-0-1.request", "2-1-1.request"]);
    }

    #[test]
    fn test_scanner_feeds_worker() {
        let fixture = Fixture::new(MockRenderer::new());
        let marker = fixture.marker("4-2-2.request");
        let scanner = MarkerScanner::new(
            fixture.temp_dir.path().join("queue"),
            Duration::from_millis(20),
        );
        let (tx, rx) = mpsc::channel();
        let token = CancellationToken::new();
        let scanner_thread = scanner.spawn(tx, token.clone()).unwrap();

        let path = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(path, marker);
        // not resent while still pending
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        token.cancel();
        scanner_thread.join().unwrap();
    }
}
