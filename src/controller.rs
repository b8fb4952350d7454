//! Scanner controller
//!
//! Orchestrates the camera session, the frame decode loop and the result
//! history behind a small command surface. All state lives in a single actor
//! task; commands and loop outcomes are applied one at a time, so a command
//! issued mid-acquisition is queued until the acquisition settles.
//!
//! Observers read the latest [`ScanSnapshot`] through a `watch` channel and
//! can follow individual transitions through the [`ScanEvent`] broadcast.

use crate::camera::{CameraBackend, CameraSession};
use crate::config::ScannerConfig;
use crate::decode::Decoder;
use crate::errors::{CameraError, ScanError, ScanFailure};
use crate::formats::{FormatId, FormatSet};
use crate::history::ResultHistory;
use crate::invariant_ppt::{
    ERROR_IFF_ERROR_STATUS, FORMATS_NEVER_EMPTY, HISTORY_WITHIN_CAP, STREAM_HELD_IFF_ACTIVE,
};
use crate::scan_loop::{FrameDecodeLoop, LoopConfig, LoopFault, LoopHandle, ScanSink};
use crate::types::{DeviceDescriptor, Facing, ScanMode, ScanResult, ScanStatus, StreamInfo};
use crate::assert_invariant;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub status: ScanStatus,
    pub stream: Option<StreamInfo>,
    pub active_facing: Facing,
    pub active_formats: FormatSet,
    pub mode: ScanMode,
    pub last_result: Option<ScanResult>,
    pub error: Option<ScanFailure>,
    /// Last decoder fault; scanning stopped but the stream stays up
    pub decode_fault: Option<String>,
    /// Most recent result first
    pub history: Vec<ScanResult>,
}

impl ScanSnapshot {
    fn initial(config: &ScannerConfig) -> Self {
        Self {
            status: ScanStatus::Idle,
            stream: None,
            active_facing: config.camera.default_facing,
            active_formats: config.scan.formats.clone(),
            mode: config.scan.mode,
            last_result: None,
            error: None,
            decode_fault: None,
            history: Vec::new(),
        }
    }
}

/// Individual transitions, in the order they were applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ScanEvent {
    StatusChanged { from: ScanStatus, to: ScanStatus },
    ResultDecoded(ScanResult),
    Failed(ScanFailure),
    DecodeFault(String),
}

/// Decode loop counters, accumulated across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub frames_sampled: u64,
    pub soft_misses: u64,
    pub results: u64,
}

#[derive(Debug, Default)]
struct LoopCounters {
    frames: AtomicU64,
    misses: AtomicU64,
    results: AtomicU64,
}

type Reply<T> = oneshot::Sender<Result<T, ScanError>>;

enum Command {
    Start(Reply<()>),
    Stop(Reply<()>),
    SwitchCamera(Reply<()>),
    SetFormats(Vec<FormatId>, Reply<()>),
    ToggleFormat(FormatId, Reply<FormatSet>),
    SetMode(ScanMode, Reply<()>),
    ClearResults(Reply<()>),
    ListDevices(Reply<Vec<DeviceDescriptor>>),
    Teardown(Reply<()>),
}

enum LoopEvent {
    Result(ScanResult),
    Fatal(LoopFault),
}

/// Loop outcome tagged with the run that produced it.
struct LoopMessage {
    run: u64,
    event: LoopEvent,
}

struct ControllerSink {
    run: u64,
    tx: mpsc::UnboundedSender<LoopMessage>,
    counters: Arc<LoopCounters>,
}

impl ScanSink for ControllerSink {
    fn on_result(&mut self, result: ScanResult) {
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        self.counters.results.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(LoopMessage {
            run: self.run,
            event: LoopEvent::Result(result),
        });
    }

    fn on_soft_miss(&mut self) {
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn on_suppressed(&mut self) {
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fatal(&mut self, fault: LoopFault) {
        let _ = self.tx.send(LoopMessage {
            run: self.run,
            event: LoopEvent::Fatal(fault),
        });
    }
}

/// Handle to a running scanner.
///
/// Must be created inside a tokio runtime. Dropping the last handle stops the
/// loop and releases the camera.
pub struct ScannerController {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<ScanSnapshot>,
    events: broadcast::Sender<ScanEvent>,
    counters: Arc<LoopCounters>,
    actor: Option<JoinHandle<()>>,
}

impl ScannerController {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        decoder: Arc<dyn Decoder>,
        config: ScannerConfig,
    ) -> Result<Self, ScanError> {
        config.validate().map_err(ScanError::Config)?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (loop_tx, loop_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(ScanSnapshot::initial(&config));
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (formats_tx, _) = watch::channel(config.scan.formats.clone());
        let counters = Arc::new(LoopCounters::default());

        let actor = ControllerActor {
            camera: CameraSession::new(backend, config.camera.acquire_timeout()),
            decoder,
            history: ResultHistory::new(config.scan.history_capacity),
            status: ScanStatus::Idle,
            facing: config.camera.default_facing,
            formats: config.scan.formats.clone(),
            formats_tx,
            mode: config.scan.mode,
            last_result: None,
            error: None,
            decode_fault: None,
            scan_loop: None,
            run: 0,
            loop_tx,
            snapshot_tx,
            events: events.clone(),
            counters: counters.clone(),
            config,
        };

        log::info!("Scanner controller started");
        let actor = tokio::spawn(actor.run(command_rx, loop_rx));

        Ok(Self {
            commands: command_tx,
            snapshot: snapshot_rx,
            events,
            counters,
            actor: Some(actor),
        })
    }

    /// Acquire the camera if needed and begin decoding.
    pub async fn start(&self) -> Result<(), ScanError> {
        self.request(Command::Start).await
    }

    /// Stop decoding and release the camera. Clears an error state.
    pub async fn stop(&self) -> Result<(), ScanError> {
        self.request(Command::Stop).await
    }

    /// Move to the next camera. When nothing is held, only the preferred
    /// facing for the next `start()` flips.
    pub async fn switch_camera(&self) -> Result<(), ScanError> {
        self.request(Command::SwitchCamera).await
    }

    /// Replace the active format set. An empty set is rejected and the
    /// current set is kept.
    pub async fn set_formats<I>(&self, formats: I) -> Result<(), ScanError>
    where
        I: IntoIterator<Item = FormatId>,
    {
        let formats = formats.into_iter().collect();
        self.request(|reply| Command::SetFormats(formats, reply))
            .await
    }

    /// Enable or disable one format and return the resulting set.
    pub async fn toggle_format(&self, format: FormatId) -> Result<FormatSet, ScanError> {
        self.request(|reply| Command::ToggleFormat(format, reply))
            .await
    }

    pub async fn set_mode(&self, mode: ScanMode) -> Result<(), ScanError> {
        self.request(|reply| Command::SetMode(mode, reply)).await
    }

    pub async fn clear_results(&self) -> Result<(), ScanError> {
        self.request(Command::ClearResults).await
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, ScanError> {
        self.request(Command::ListDevices).await
    }

    /// Reset to a fresh idle session. The controller stays usable.
    pub async fn teardown(&self) -> Result<(), ScanError> {
        self.request(Command::Teardown).await
    }

    /// Tear down and wait for the actor to exit.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.teardown().await {
            log::warn!("Teardown during shutdown failed: {}", e);
        }
        let actor = self.actor.take();
        drop(self);
        if let Some(actor) = actor {
            if let Err(e) = actor.await {
                log::error!("Scanner controller task failed: {}", e);
            }
        }
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.snapshot.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            frames_sampled: self.counters.frames.load(Ordering::Relaxed),
            soft_misses: self.counters.misses.load(Ordering::Relaxed),
            results: self.counters.results.load(Ordering::Relaxed),
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, ScanError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ScanError::ControllerClosed)?;
        response.await.map_err(|_| ScanError::ControllerClosed)?
    }
}

struct ControllerActor {
    config: ScannerConfig,
    camera: CameraSession,
    decoder: Arc<dyn Decoder>,
    history: ResultHistory,
    status: ScanStatus,
    facing: Facing,
    formats: FormatSet,
    formats_tx: watch::Sender<FormatSet>,
    mode: ScanMode,
    last_result: Option<ScanResult>,
    error: Option<ScanFailure>,
    decode_fault: Option<String>,
    scan_loop: Option<LoopHandle>,
    /// Generation of the current loop; outcomes from older runs are dropped
    run: u64,
    loop_tx: mpsc::UnboundedSender<LoopMessage>,
    snapshot_tx: watch::Sender<ScanSnapshot>,
    events: broadcast::Sender<ScanEvent>,
    counters: Arc<LoopCounters>,
}

impl ControllerActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut loop_rx: mpsc::UnboundedReceiver<LoopMessage>,
    ) {
        loop {
            tokio::select! {
                biased;
                Some(message) = loop_rx.recv() => self.handle_loop_message(message).await,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.teardown().await;
        log::info!("Scanner controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start().await);
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop().await);
            }
            Command::SwitchCamera(reply) => {
                let _ = reply.send(self.switch_camera().await);
            }
            Command::SetFormats(formats, reply) => {
                let _ = reply.send(self.set_formats(formats));
            }
            Command::ToggleFormat(format, reply) => {
                let _ = reply.send(Ok(self.toggle_format(format)));
            }
            Command::SetMode(mode, reply) => {
                let _ = reply.send(self.set_mode(mode).await);
            }
            Command::ClearResults(reply) => {
                self.history.clear();
                self.last_result = None;
                self.publish();
                let _ = reply.send(Ok(()));
            }
            Command::ListDevices(reply) => {
                let result = self.camera.list_devices().await.map_err(ScanError::from);
                let _ = reply.send(result);
            }
            Command::Teardown(reply) => {
                self.teardown().await;
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn start(&mut self) -> Result<(), ScanError> {
        match self.status {
            ScanStatus::Scanning => return Ok(()),
            ScanStatus::Streaming => {
                self.begin_scanning();
                self.publish();
                return Ok(());
            }
            ScanStatus::Acquiring => {
                return Err(ScanError::InvalidState {
                    command: "start",
                    status: self.status,
                })
            }
            ScanStatus::Idle | ScanStatus::Error => {}
        }

        self.error = None;
        self.decode_fault = None;
        self.set_status(ScanStatus::Acquiring);
        self.publish();

        match self.camera.acquire(self.facing).await {
            Ok(info) => {
                self.facing = info.facing;
                self.set_status(ScanStatus::Streaming);
                self.publish();
                self.begin_scanning();
                self.publish();
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e.into())
            }
        }
    }

    async fn stop(&mut self) -> Result<(), ScanError> {
        if self.status == ScanStatus::Idle && !self.camera.is_held() {
            return Ok(());
        }

        self.halt_loop().await;
        self.camera.release();
        self.error = None;
        self.set_status(ScanStatus::Idle);
        self.publish();
        Ok(())
    }

    async fn switch_camera(&mut self) -> Result<(), ScanError> {
        match self.status {
            ScanStatus::Idle | ScanStatus::Error => {
                self.facing = self.facing.opposite();
                log::info!("No camera held, next start will prefer {} facing", self.facing);
                self.publish();
                return Ok(());
            }
            ScanStatus::Acquiring => {
                return Err(ScanError::InvalidState {
                    command: "switch camera",
                    status: self.status,
                })
            }
            ScanStatus::Streaming | ScanStatus::Scanning => {}
        }

        let resume = self.status == ScanStatus::Scanning;
        self.halt_loop().await;
        self.camera.release();
        self.set_status(ScanStatus::Acquiring);
        self.publish();

        match self.camera.switch_camera().await {
            Ok(info) => {
                self.facing = info.facing;
                self.set_status(ScanStatus::Streaming);
                self.publish();
                if resume {
                    self.begin_scanning();
                    self.publish();
                }
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e.into())
            }
        }
    }

    fn set_formats(&mut self, formats: Vec<FormatId>) -> Result<(), ScanError> {
        let formats = FormatSet::new(formats).map_err(|e| {
            log::warn!("Rejected format change: {}", e);
            e
        })?;
        self.apply_formats(formats);
        Ok(())
    }

    fn toggle_format(&mut self, format: FormatId) -> FormatSet {
        let mut formats = self.formats.clone();
        if !formats.toggle(format) {
            log::debug!("{} is the only active format, keeping it enabled", format);
        }
        self.apply_formats(formats.clone());
        formats
    }

    fn apply_formats(&mut self, formats: FormatSet) {
        if formats == self.formats {
            return;
        }
        log::info!("Active formats: {} enabled", formats.len());
        self.formats = formats.clone();
        self.formats_tx.send_replace(formats);
        self.publish();
    }

    async fn set_mode(&mut self, mode: ScanMode) -> Result<(), ScanError> {
        if mode == self.mode {
            return Ok(());
        }
        log::info!("Scan mode set to {:?}", mode);
        self.mode = mode;
        if self.status == ScanStatus::Scanning {
            self.halt_loop().await;
            self.begin_scanning();
        }
        self.publish();
        Ok(())
    }

    async fn teardown(&mut self) {
        self.halt_loop().await;
        self.camera.release();
        self.history.clear();
        self.last_result = None;
        self.error = None;
        self.decode_fault = None;
        self.set_status(ScanStatus::Idle);
        self.publish();
    }

    async fn handle_loop_message(&mut self, message: LoopMessage) {
        if message.run != self.run || self.status != ScanStatus::Scanning {
            log::debug!("Dropping outcome from stale decode loop run {}", message.run);
            return;
        }

        match message.event {
            LoopEvent::Result(result) => {
                log::info!("Scanned {} ({})", result.text, result.format_name);
                self.history.append(result.clone());
                self.last_result = Some(result.clone());
                let _ = self.events.send(ScanEvent::ResultDecoded(result));
                if self.mode == ScanMode::SingleShot {
                    self.join_loop().await;
                    self.set_status(ScanStatus::Streaming);
                }
                self.publish();
            }
            LoopEvent::Fatal(LoopFault::Decoder(message)) => {
                self.join_loop().await;
                log::warn!("Scanning stopped after decoder fault, stream kept open");
                self.decode_fault = Some(message.clone());
                let _ = self.events.send(ScanEvent::DecodeFault(message));
                self.set_status(ScanStatus::Streaming);
                self.publish();
            }
            LoopEvent::Fatal(LoopFault::StreamEnded(message)) => {
                self.join_loop().await;
                self.fail(&CameraError::DeviceUnavailable(message));
            }
        }
    }

    fn begin_scanning(&mut self) {
        let Some(stream) = self.camera.stream() else {
            log::warn!("Cannot start decoding without a held stream");
            return;
        };

        self.run += 1;
        let sink = ControllerSink {
            run: self.run,
            tx: self.loop_tx.clone(),
            counters: self.counters.clone(),
        };
        let mut config = LoopConfig::from(&self.config);
        config.mode = self.mode;

        let scan_loop = FrameDecodeLoop::new(config, self.decoder.clone());
        self.scan_loop = Some(scan_loop.spawn(stream, self.formats_tx.subscribe(), sink));
        self.decode_fault = None;
        self.set_status(ScanStatus::Scanning);
    }

    /// Cancel the loop and wait until no frame is in flight.
    async fn halt_loop(&mut self) {
        if let Some(handle) = self.scan_loop.take() {
            let exit = handle.cancel().await;
            log::debug!("Decode loop run {} exited: {:?}", self.run, exit);
        }
        self.run += 1;
    }

    /// Wait for a loop that is exiting on its own.
    async fn join_loop(&mut self) {
        if let Some(handle) = self.scan_loop.take() {
            let exit = handle.join().await;
            log::debug!("Decode loop run {} exited: {:?}", self.run, exit);
        }
    }

    fn fail(&mut self, error: &CameraError) {
        self.camera.release();
        let failure = ScanFailure::from(error);
        log::error!("Scanner entered error state: {}", failure.message);
        self.error = Some(failure.clone());
        self.set_status(ScanStatus::Error);
        let _ = self.events.send(ScanEvent::Failed(failure));
        self.publish();
    }

    fn set_status(&mut self, status: ScanStatus) {
        if self.status == status {
            return;
        }
        log::debug!("Scanner status {} -> {}", self.status, status);
        let _ = self.events.send(ScanEvent::StatusChanged {
            from: self.status,
            to: status,
        });
        self.status = status;
    }

    fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            status: self.status,
            stream: self.camera.stream_info().cloned(),
            active_facing: self.facing,
            active_formats: self.formats.clone(),
            mode: self.mode,
            last_result: self.last_result.clone(),
            error: self.error.clone(),
            decode_fault: self.decode_fault.clone(),
            history: self.history.all(),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();

        assert_invariant!(
            snapshot.stream.is_some() == snapshot.status.holds_stream(),
            STREAM_HELD_IFF_ACTIVE,
            "controller"
        );
        assert_invariant!(
            snapshot.error.is_some() == (snapshot.status == ScanStatus::Error),
            ERROR_IFF_ERROR_STATUS,
            "controller"
        );
        assert_invariant!(
            !snapshot.active_formats.is_empty(),
            FORMATS_NEVER_EMPTY,
            "controller"
        );
        assert_invariant!(
            snapshot.history.len() <= self.history.capacity(),
            HISTORY_WITHIN_CAP,
            "controller"
        );

        self.snapshot_tx.send_replace(snapshot);
    }
}
