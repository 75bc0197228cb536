//! Connection lifecycle supervision.
//!
//! [`ConnectionSupervisor`] owns the link to one weather station: it runs
//! connect attempts, promotes an open link to a live read session, feeds
//! incoming bytes through the sample pipeline, and schedules backed-off
//! reconnects when a session is lost unexpectedly.
//!
//! All mutable state lives behind a single async mutex. Workers (the connect
//! task, the read loop, the reconnect timer) hold a weak reference to the
//! supervisor and a worker id; a completion callback whose id no longer
//! matches the current worker is stale and is ignored, which makes rapid
//! connect/stop/connect sequences safe.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use windsock_types::{ConnectionState, ProcessedSample};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, StationEvent};
use crate::frame::FrameSynchronizer;
use crate::pipeline::{Calibration, IngestOutcome, SamplePipeline};
use crate::reconnect::{ReconnectOptions, ReconnectPolicy};
use crate::transport::{BoxedLink, DeviceDescriptor, Transport};

/// Behavior knobs for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Reconnect automatically after an unexpected session loss.
    pub auto_reconnect: bool,
    /// Backoff ladder for scheduled reconnects.
    pub reconnect: ReconnectOptions,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect: ReconnectOptions::default(),
        }
    }
}

struct ConnectWorker {
    id: u64,
    cancel: CancellationToken,
}

struct Session {
    id: u64,
    cancel: CancellationToken,
    writer: WriteHalf<BoxedLink>,
}

struct ReconnectTimer {
    id: u64,
    cancel: CancellationToken,
}

struct Inner {
    state: ConnectionState,
    connect: Option<ConnectWorker>,
    session: Option<Session>,
    timer: Option<ReconnectTimer>,
    backoff: ReconnectPolicy,
    last_device: Option<DeviceDescriptor>,
    should_reconnect: bool,
    next_worker_id: u64,
}

impl Inner {
    fn alloc_id(&mut self) -> u64 {
        self.next_worker_id += 1;
        self.next_worker_id
    }
}

/// Supervises the connection to one weather station.
pub struct ConnectionSupervisor {
    transport: Arc<dyn Transport>,
    events: EventDispatcher,
    pipeline: Mutex<SamplePipeline>,
    inner: Mutex<Inner>,
    config: SupervisorConfig,
}

impl ConnectionSupervisor {
    /// Create a supervisor in the [`Stopped`](ConnectionState::Stopped) state.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: SupervisorConfig) -> Arc<Self> {
        Arc::new(Self {
            transport,
            events: EventDispatcher::new(),
            pipeline: Mutex::new(SamplePipeline::new()),
            inner: Mutex::new(Inner {
                state: ConnectionState::Stopped,
                connect: None,
                session: None,
                timer: None,
                backoff: ReconnectPolicy::new(config.reconnect.clone()),
                last_device: None,
                should_reconnect: false,
                next_worker_id: 0,
            }),
            config,
        })
    }

    /// Subscribe to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.events.subscribe()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Device of the most recent connect request, if any.
    pub async fn last_device(&self) -> Option<DeviceDescriptor> {
        self.inner.lock().await.last_device.clone()
    }

    /// Arm the supervisor: cancel all in-flight work and settle in
    /// [`Disconnected`](ConnectionState::Disconnected).
    ///
    /// From any state this cancels the connect attempt, the live session,
    /// and any pending reconnect timer, and re-enables automatic reconnects.
    /// Unlike [`stop`](Self::stop) it leaves sample history intact.
    pub async fn start(&self) {
        info!("start requested");
        let mut inner = self.inner.lock().await;
        inner.should_reconnect = true;
        Self::cancel_connect_and_timer(&mut inner);
        if let Some(session) = inner.session.take() {
            session.cancel.cancel();
        }
        self.set_state_locked(&mut inner, ConnectionState::Disconnected);
    }

    /// Start connecting to a device.
    ///
    /// Any in-flight connect attempt or pending reconnect timer is cancelled
    /// and replaced. A live session, if present, keeps running until the new
    /// link is established; at promotion it is torn down atomically so
    /// consumers never observe a gap between the old and new session.
    pub async fn connect(self: &Arc<Self>, device: DeviceDescriptor) {
        info!(%device, "connect requested");
        let mut inner = self.inner.lock().await;
        inner.should_reconnect = true;
        inner.last_device = Some(device.clone());
        inner.backoff.reset();
        Self::cancel_connect_and_timer(&mut inner);
        self.spawn_connect_locked(&mut inner, device);
    }

    /// Stop everything: connect attempts, the session, pending reconnects.
    ///
    /// Sample history and analyzer trends are cleared; the outlier filter
    /// baseline survives.
    pub async fn stop(&self) {
        info!("stop requested");
        {
            let mut inner = self.inner.lock().await;
            inner.should_reconnect = false;
            Self::cancel_connect_and_timer(&mut inner);
            if let Some(session) = inner.session.take() {
                session.cancel.cancel();
            }
            self.set_state_locked(&mut inner, ConnectionState::Stopped);
        }
        self.pipeline.lock().await.reset();
    }

    /// Send raw bytes to the station.
    ///
    /// Without a live session this is a no-op, mirroring a command typed
    /// while the link happens to be down. A failed write means the link is
    /// gone: the session is torn down and a reconnect is scheduled, and the
    /// error is returned to the caller.
    pub async fn write(self: &Arc<Self>, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let result = match inner.session.as_mut() {
            Some(session) => session.writer.write_all(bytes).await,
            None => {
                debug!("write with no session, dropping");
                return Ok(());
            }
        };
        if let Err(err) = result {
            warn!(error = %err, "write failed, dropping session");
            if let Some(session) = inner.session.take() {
                session.cancel.cancel();
            }
            self.events
                .emit(StationEvent::Notice("connection lost".to_owned()));
            self.set_state_locked(&mut inner, ConnectionState::Disconnected);
            self.maybe_schedule_reconnect_locked(&mut inner);
            return Err(err.into());
        }
        Ok(())
    }

    /// Replace the calibration offsets for future samples.
    pub async fn set_calibration(&self, calibration: Calibration) {
        self.pipeline.lock().await.set_calibration(calibration);
    }

    /// Enable or disable the thermal detector.
    pub async fn set_detector_enabled(&self, enabled: bool) {
        self.pipeline.lock().await.set_detector_enabled(enabled);
    }

    /// Set the detector score sensitivity.
    pub async fn set_sensitivity(&self, sensitivity: f64) {
        self.pipeline.lock().await.set_sensitivity(sensitivity);
    }

    /// Snapshot of the retained processed samples, oldest first.
    pub async fn history(&self) -> Vec<ProcessedSample> {
        self.pipeline.lock().await.history().iter().copied().collect()
    }

    /// The most recently processed sample, if any.
    pub async fn latest(&self) -> Option<ProcessedSample> {
        self.pipeline.lock().await.latest()
    }

    fn cancel_connect_and_timer(inner: &mut Inner) {
        if let Some(worker) = inner.connect.take() {
            worker.cancel.cancel();
        }
        if let Some(timer) = inner.timer.take() {
            timer.cancel.cancel();
        }
    }

    fn set_state_locked(&self, inner: &mut Inner, state: ConnectionState) {
        if inner.state != state {
            debug!(from = %inner.state, to = %state, "state change");
            inner.state = state;
            self.events.emit(StationEvent::StateChanged(state));
        }
    }

    /// Spawn a connect worker. Does not touch the backoff ladder, so a
    /// timer-fired reconnect keeps climbing it while a user-initiated
    /// connect (which resets first) starts over.
    fn spawn_connect_locked(self: &Arc<Self>, inner: &mut Inner, device: DeviceDescriptor) {
        let id = inner.alloc_id();
        let cancel = CancellationToken::new();
        inner.connect = Some(ConnectWorker {
            id,
            cancel: cancel.clone(),
        });
        self.set_state_locked(inner, ConnectionState::Connecting);

        let supervisor = Arc::downgrade(self);
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let result = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(%device, "connect attempt cancelled");
                    return;
                }
                result = open_with_fallback(transport.as_ref(), &device) => result,
            };
            let Some(supervisor) = supervisor.upgrade() else {
                return;
            };
            match result {
                Ok(link) => supervisor.promote(id, device, link).await,
                Err(err) => supervisor.on_connect_failed(id, device, err).await,
            }
        });
    }

    /// Turn an open link into the live session.
    async fn promote(self: &Arc<Self>, worker_id: u64, device: DeviceDescriptor, link: BoxedLink) {
        let mut inner = self.inner.lock().await;
        if inner.connect.as_ref().map(|w| w.id) != Some(worker_id) {
            debug!(%device, "stale connect completion, closing link");
            return;
        }
        inner.connect = None;
        if let Some(old) = inner.session.take() {
            debug!("replacing live session");
            old.cancel.cancel();
        }
        inner.backoff.reset();

        let (reader, writer) = tokio::io::split(link);
        let session_id = inner.alloc_id();
        let cancel = CancellationToken::new();
        inner.session = Some(Session {
            id: session_id,
            cancel: cancel.clone(),
            writer,
        });
        self.set_state_locked(&mut inner, ConnectionState::Connected);
        info!(%device, "session established");
        self.events.emit(StationEvent::Connected(device));

        let supervisor = Arc::downgrade(self);
        tokio::spawn(read_loop(supervisor, session_id, cancel, reader));
    }

    async fn on_connect_failed(self: &Arc<Self>, worker_id: u64, device: DeviceDescriptor, err: Error) {
        let mut inner = self.inner.lock().await;
        if inner.connect.as_ref().map(|w| w.id) != Some(worker_id) {
            debug!(%device, "stale connect failure, ignoring");
            return;
        }
        inner.connect = None;
        warn!(%device, error = %err, "connect failed");
        self.events
            .emit(StationEvent::Notice(format!("failed to connect to {device}: {err}")));
        self.set_state_locked(&mut inner, ConnectionState::Disconnected);

        // A permission problem will not fix itself by retrying.
        if err.is_permission_denied() {
            inner.should_reconnect = false;
            return;
        }
        self.maybe_schedule_reconnect_locked(&mut inner);
    }

    async fn on_session_lost(self: &Arc<Self>, session_id: u64) {
        let mut inner = self.inner.lock().await;
        if inner.session.as_ref().map(|s| s.id) != Some(session_id) {
            // Replaced or stopped; nothing to do.
            return;
        }
        inner.session = None;
        warn!("session lost");
        self.events
            .emit(StationEvent::Notice("connection lost".to_string()));
        self.set_state_locked(&mut inner, ConnectionState::Disconnected);
        self.maybe_schedule_reconnect_locked(&mut inner);
    }

    fn maybe_schedule_reconnect_locked(self: &Arc<Self>, inner: &mut Inner) {
        if !(inner.should_reconnect && self.config.auto_reconnect) {
            return;
        }
        if inner.last_device.is_none() {
            return;
        }
        let delay = inner.backoff.next_delay();
        let id = inner.alloc_id();
        let cancel = CancellationToken::new();
        inner.timer = Some(ReconnectTimer {
            id,
            cancel: cancel.clone(),
        });
        info!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");

        let supervisor = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if let Some(supervisor) = supervisor.upgrade() {
                        supervisor.on_reconnect_timer(id).await;
                    }
                }
            }
        });
    }

    async fn on_reconnect_timer(self: &Arc<Self>, timer_id: u64) {
        let mut inner = self.inner.lock().await;
        if inner.timer.as_ref().map(|t| t.id) != Some(timer_id) {
            return;
        }
        inner.timer = None;
        let Some(device) = inner.last_device.clone() else {
            return;
        };
        info!(%device, "reconnect timer fired");
        self.spawn_connect_locked(&mut inner, device);
    }
}

async fn open_with_fallback(
    transport: &dyn Transport,
    device: &DeviceDescriptor,
) -> Result<BoxedLink> {
    match transport.open(device).await {
        Ok(link) => Ok(link),
        Err(first) => {
            debug!(%device, error = %first, "first open failed, retrying once");
            transport.open(device).await
        }
    }
}

async fn read_loop(
    supervisor: std::sync::Weak<ConnectionSupervisor>,
    session_id: u64,
    cancel: CancellationToken,
    mut reader: ReadHalf<BoxedLink>,
) {
    let mut sync = FrameSynchronizer::new();
    let mut buf = [0_u8; 1024];

    loop {
        let n = tokio::select! {
            () = cancel.cancelled() => {
                debug!("read loop cancelled");
                return;
            }
            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    debug!("link closed by peer");
                    break;
                }
                Ok(n) => n,
                Err(err) => {
                    debug!(error = %err, "read failed");
                    break;
                }
            },
        };

        let Some(supervisor) = supervisor.upgrade() else {
            return;
        };
        sync.push_bytes(&buf[..n]);
        for frame in sync.drain_frames() {
            let mut pipeline = supervisor.pipeline.lock().await;
            // Cancellation is ordered before the pipeline reset in `stop`, so
            // a frame that was mid-flight when the session was torn down must
            // not land after the reset.
            if cancel.is_cancelled() {
                debug!("read loop cancelled");
                return;
            }
            supervisor.events.emit(StationEvent::RawFrame(frame.clone()));
            let outcome = pipeline.ingest_frame(&frame);
            drop(pipeline);
            match outcome {
                Ok(IngestOutcome::Processed(processed)) => {
                    supervisor.events.emit(StationEvent::Sample(processed));
                }
                Ok(IngestOutcome::Rejected(sample)) => {
                    debug!(temperature = sample.temperature, "sample rejected");
                }
                Err(err) => {
                    warn!(error = %err, "unparseable frame");
                    supervisor
                        .events
                        .emit(StationEvent::Notice(format!("bad frame: {err}")));
                }
            }
        }
    }

    if let Some(supervisor) = supervisor.upgrade() {
        supervisor.on_session_lost(session_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use async_trait::async_trait;
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    struct MockTransport {
        links: Mutex<VecDeque<Result<BoxedLink>>>,
    }

    /// A link whose reads never complete and whose writes always fail, like
    /// a TCP peer that vanished without closing the socket.
    #[derive(Debug)]
    struct DeadWriteLink;

    impl AsyncRead for DeadWriteLink {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for DeadWriteLink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl MockTransport {
        fn with_links(links: Vec<Result<BoxedLink>>) -> Arc<Self> {
            Arc::new(Self {
                links: Mutex::new(links.into()),
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(&self, device: &DeviceDescriptor) -> Result<BoxedLink> {
            self.links.lock().await.pop_front().unwrap_or_else(|| {
                Err(Error::connection_failed(device.clone(), "no more links"))
            })
        }
    }

    fn no_reconnect() -> SupervisorConfig {
        SupervisorConfig {
            auto_reconnect: false,
            ..SupervisorConfig::default()
        }
    }

    async fn wait_for_connected(events: &mut broadcast::Receiver<StationEvent>) {
        loop {
            if let StationEvent::Connected(_) = events.recv().await.unwrap() {
                return;
            }
        }
    }

    #[tokio::test]
    async fn connect_establishes_session_and_streams_samples() {
        let (near, mut far) = tokio::io::duplex(1024);
        let transport = MockTransport::with_links(vec![Ok(Box::new(near) as BoxedLink)]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());
        let mut events = supervisor.subscribe();

        supervisor.connect(DeviceDescriptor::Simulator).await;
        wait_for_connected(&mut events).await;
        assert_eq!(supervisor.state().await, ConnectionState::Connected);

        far.write_all(b"WS_3.0 22.0_end").await.unwrap();
        loop {
            if let StationEvent::Sample(processed) = events.recv().await.unwrap() {
                assert_eq!(processed.sample.temperature, 22.0);
                assert_eq!(processed.sample.wind_speed, 3.0);
                break;
            }
        }
        assert!(supervisor.latest().await.is_some());
    }

    #[tokio::test]
    async fn peer_close_transitions_to_disconnected() {
        let (near, far) = tokio::io::duplex(1024);
        let transport = MockTransport::with_links(vec![Ok(Box::new(near) as BoxedLink)]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());
        let mut events = supervisor.subscribe();

        supervisor.connect(DeviceDescriptor::Simulator).await;
        wait_for_connected(&mut events).await;

        drop(far);
        loop {
            if let StationEvent::StateChanged(ConnectionState::Disconnected) =
                events.recv().await.unwrap()
            {
                break;
            }
        }
        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn failed_connect_reports_notice() {
        let transport = MockTransport::with_links(vec![]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());
        let mut events = supervisor.subscribe();

        supervisor.connect(DeviceDescriptor::Simulator).await;
        loop {
            match events.recv().await.unwrap() {
                StationEvent::Notice(text) => {
                    assert!(text.contains("failed to connect"));
                    break;
                }
                StationEvent::Connected(_) => panic!("must not connect"),
                _ => {}
            }
        }
        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn stop_clears_session_and_history() {
        let (near, mut far) = tokio::io::duplex(1024);
        let transport = MockTransport::with_links(vec![Ok(Box::new(near) as BoxedLink)]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());
        let mut events = supervisor.subscribe();

        supervisor.connect(DeviceDescriptor::Simulator).await;
        wait_for_connected(&mut events).await;
        far.write_all(b"WS_3.0 22.0_end").await.unwrap();
        loop {
            if let StationEvent::Sample(_) = events.recv().await.unwrap() {
                break;
            }
        }

        supervisor.stop().await;
        assert_eq!(supervisor.state().await, ConnectionState::Stopped);
        assert!(supervisor.latest().await.is_none());
        assert!(supervisor.history().await.is_empty());
    }

    #[tokio::test]
    async fn write_without_session_is_a_noop() {
        let transport = MockTransport::with_links(vec![]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());
        supervisor.write(b"PING\n").await.unwrap();
    }

    #[tokio::test]
    async fn failed_write_drops_the_session() {
        let transport = MockTransport::with_links(vec![Ok(Box::new(DeadWriteLink) as BoxedLink)]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());
        let mut events = supervisor.subscribe();

        supervisor.connect(DeviceDescriptor::Simulator).await;
        wait_for_connected(&mut events).await;

        assert!(supervisor.write(b"PING\n").await.is_err());
        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);
        loop {
            if let StationEvent::Notice(text) = events.recv().await.unwrap() {
                assert_eq!(text, "connection lost");
                break;
            }
        }
        // The session is gone, so a retry is a quiet no-op.
        supervisor.write(b"PING\n").await.unwrap();
    }

    #[tokio::test]
    async fn start_cancels_the_session_and_returns_to_disconnected() {
        let (near, mut far) = tokio::io::duplex(1024);
        let transport = MockTransport::with_links(vec![Ok(Box::new(near) as BoxedLink)]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());
        let mut events = supervisor.subscribe();

        supervisor.connect(DeviceDescriptor::Simulator).await;
        wait_for_connected(&mut events).await;

        supervisor.start().await;
        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);

        // The old read loop was cancelled, so late frames never surface.
        far.write_all(b"WS_3.0 22.0_end").await.unwrap();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(supervisor.latest().await.is_none());
    }

    #[tokio::test]
    async fn start_after_stop_lands_in_disconnected() {
        let transport = MockTransport::with_links(vec![]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());

        supervisor.stop().await;
        assert_eq!(supervisor.state().await, ConnectionState::Stopped);

        supervisor.start().await;
        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn stop_wipes_frames_that_were_still_in_flight() {
        let (near, mut far) = tokio::io::duplex(1024);
        let transport = MockTransport::with_links(vec![Ok(Box::new(near) as BoxedLink)]);
        let supervisor = ConnectionSupervisor::new(transport, no_reconnect());
        let mut events = supervisor.subscribe();

        supervisor.connect(DeviceDescriptor::Simulator).await;
        wait_for_connected(&mut events).await;

        // Stop without waiting for the frame to be processed. Whether the
        // read loop wins or loses the race, nothing may survive the stop.
        far.write_all(b"WS_3.0 22.0_end").await.unwrap();
        supervisor.stop().await;
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(supervisor.latest().await.is_none());
        assert!(supervisor.history().await.is_empty());
        assert_eq!(supervisor.state().await, ConnectionState::Stopped);
    }
}
