//! Decode loop behavior on a session-held mock stream, without the controller.

use crabscan::camera::CameraSession;
use crabscan::scan_loop::{FrameDecodeLoop, LoopConfig, LoopExit, LoopFault, ScanSink};
use crabscan::testing::{MockCamera, ScriptedDecoder};
use crabscan::{Facing, FormatId, FormatSet, ScanMode, ScanResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

#[derive(Debug, Default)]
struct Collected {
    results: Vec<ScanResult>,
    misses: u64,
    faults: Vec<LoopFault>,
}

#[derive(Clone, Default)]
struct CollectingSink(Arc<Mutex<Collected>>);

impl CollectingSink {
    fn results(&self) -> Vec<ScanResult> {
        self.0.lock().unwrap().results.clone()
    }

    fn misses(&self) -> u64 {
        self.0.lock().unwrap().misses
    }

    fn faults(&self) -> Vec<LoopFault> {
        self.0.lock().unwrap().faults.clone()
    }
}

impl ScanSink for CollectingSink {
    fn on_result(&mut self, result: ScanResult) {
        self.0.lock().unwrap().results.push(result);
    }

    fn on_soft_miss(&mut self) {
        self.0.lock().unwrap().misses += 1;
    }

    fn on_fatal(&mut self, fault: LoopFault) {
        self.0.lock().unwrap().faults.push(fault);
    }
}

fn loop_config(mode: ScanMode, window_ms: u64) -> LoopConfig {
    LoopConfig {
        frame_interval: Duration::from_millis(5),
        mode,
        suppression_window: Duration::from_millis(window_ms),
    }
}

async fn held_session(mock: &MockCamera) -> CameraSession {
    let mut session = CameraSession::new(Arc::new(mock.clone()), Duration::from_secs(1));
    session.acquire(Facing::Rear).await.unwrap();
    session
}

#[tokio::test]
async fn test_single_shot_completes_after_one_result() {
    let mock = MockCamera::new();
    let session = held_session(&mock).await;
    let decoder = ScriptedDecoder::new();
    decoder.show("https://example.com", FormatId::QrCode);
    let (_formats_tx, formats) = watch::channel(FormatSet::all());
    let sink = CollectingSink::default();

    let handle = FrameDecodeLoop::new(loop_config(ScanMode::SingleShot, 3_000), Arc::new(decoder))
        .spawn(session.stream().unwrap(), formats, sink.clone());

    let exit = timeout(Duration::from_secs(2), handle.join()).await.unwrap();
    assert_eq!(exit, LoopExit::Completed);
    assert_eq!(sink.results().len(), 1);
    assert!(sink.faults().is_empty());
}

#[tokio::test]
async fn test_cancel_stops_capture() {
    let mock = MockCamera::new();
    let session = held_session(&mock).await;
    let decoder = ScriptedDecoder::new();
    let (_formats_tx, formats) = watch::channel(FormatSet::all());
    let sink = CollectingSink::default();

    let handle = FrameDecodeLoop::new(loop_config(ScanMode::Continuous, 3_000), Arc::new(decoder.clone()))
        .spawn(session.stream().unwrap(), formats, sink.clone());

    sleep(Duration::from_millis(40)).await;
    assert!(!handle.is_finished());
    assert_eq!(handle.cancel().await, LoopExit::Cancelled);

    let attempts = decoder.attempts();
    let frames = mock.frames_captured();
    sleep(Duration::from_millis(40)).await;
    assert_eq!(decoder.attempts(), attempts);
    assert_eq!(mock.frames_captured(), frames);
    assert!(sink.misses() > 0);
}

#[tokio::test]
async fn test_format_updates_apply_to_next_frame() {
    let mock = MockCamera::new();
    let session = held_session(&mock).await;
    let decoder = ScriptedDecoder::new();
    decoder.show("SKU-1234", FormatId::Ean13);
    let (formats_tx, formats) = watch::channel(FormatSet::single(FormatId::QrCode));
    let sink = CollectingSink::default();

    let handle = FrameDecodeLoop::new(loop_config(ScanMode::Continuous, 3_000), Arc::new(decoder))
        .spawn(session.stream().unwrap(), formats, sink.clone());

    sleep(Duration::from_millis(40)).await;
    assert!(sink.results().is_empty());

    formats_tx.send_replace(FormatSet::single(FormatId::Ean13));
    timeout(Duration::from_secs(2), async {
        while sink.results().is_empty() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    handle.cancel().await;
    assert_eq!(sink.results()[0].format, FormatId::Ean13);
}

#[tokio::test]
async fn test_released_stream_faults_loop() {
    let mock = MockCamera::new();
    let mut session = held_session(&mock).await;
    let decoder = ScriptedDecoder::new();
    let (_formats_tx, formats) = watch::channel(FormatSet::all());
    let sink = CollectingSink::default();

    let stream = session.stream().unwrap();
    session.release();

    let handle = FrameDecodeLoop::new(loop_config(ScanMode::Continuous, 3_000), Arc::new(decoder))
        .spawn(stream, formats, sink.clone());

    let exit = timeout(Duration::from_secs(2), handle.join()).await.unwrap();
    assert_eq!(exit, LoopExit::Faulted);
    assert!(matches!(sink.faults().as_slice(), [LoopFault::StreamEnded(_)]));
}

#[tokio::test]
async fn test_decoder_fault_ends_loop() {
    let mock = MockCamera::new();
    let session = held_session(&mock).await;
    let decoder = ScriptedDecoder::new();
    decoder.fail_next("bad buffer");
    let (_formats_tx, formats) = watch::channel(FormatSet::all());
    let sink = CollectingSink::default();

    let handle = FrameDecodeLoop::new(loop_config(ScanMode::Continuous, 3_000), Arc::new(decoder))
        .spawn(session.stream().unwrap(), formats, sink.clone());

    let exit = timeout(Duration::from_secs(2), handle.join()).await.unwrap();
    assert_eq!(exit, LoopExit::Faulted);
    assert_eq!(
        sink.faults(),
        vec![LoopFault::Decoder("Decoder error: bad buffer".to_string())]
    );
}

#[tokio::test]
async fn test_results_arrive_in_frame_order() {
    let mock = MockCamera::new();
    let session = held_session(&mock).await;
    let decoder = ScriptedDecoder::new();
    decoder.show("https://example.com", FormatId::QrCode);
    let (_formats_tx, formats) = watch::channel(FormatSet::all());
    let sink = CollectingSink::default();

    let handle = FrameDecodeLoop::new(loop_config(ScanMode::Continuous, 0), Arc::new(decoder))
        .spawn(session.stream().unwrap(), formats, sink.clone());

    timeout(Duration::from_secs(2), async {
        while sink.results().len() < 5 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    handle.cancel().await;

    let results = sink.results();
    assert!(results.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}
