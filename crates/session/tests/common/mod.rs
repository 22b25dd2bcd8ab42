#![allow(dead_code)]

use looptrack_core::{AudioError, Pending, Result};
use looptrack_decode::wav::{encode_pcm16, sine_tone};
use looptrack_graph::AudioSpec;
use looptrack_session::OfflinePlatform;
use looptrack_transport_http::Fetcher;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

pub const RATE: u32 = 8000;
pub const TRACK_SECS: f32 = 1.0;

pub fn spec() -> AudioSpec {
    AudioSpec::new(RATE, 1)
}

pub fn track() -> Vec<u8> {
    encode_pcm16(&sine_tone(440.0, TRACK_SECS, RATE, 1), RATE, 1)
}

/// Serves the test track and counts fetches
#[derive(Default)]
pub struct CountingFetcher {
    fetches: AtomicUsize,
}

impl CountingFetcher {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Fetcher for CountingFetcher {
    fn fetch(&self, _src: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(track())
    }
}

/// Fails until `heal` is called, counting attempts
#[derive(Default)]
pub struct FlakyFetcher {
    attempts: AtomicUsize,
    healed: Mutex<bool>,
}

impl FlakyFetcher {
    pub fn heal(&self) {
        *self.healed.lock() = true;
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Fetcher for FlakyFetcher {
    fn fetch(&self, src: &str) -> Result<Vec<u8>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.healed.lock() {
            Ok(track())
        } else {
            Err(AudioError::NetworkError(format!("{} unreachable", src)))
        }
    }
}

/// Holds every fetch until the gate is opened
pub struct GatedFetcher {
    gate: Mutex<Receiver<()>>,
}

impl GatedFetcher {
    pub fn new() -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Self { gate: Mutex::new(rx) }, tx)
    }
}

impl Fetcher for GatedFetcher {
    fn fetch(&self, _src: &str) -> Result<Vec<u8>> {
        self.gate
            .lock()
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| AudioError::NetworkError("gate never opened".to_string()))?;
        Ok(track())
    }
}

pub fn offline(fetcher: Arc<dyn Fetcher>) -> Arc<OfflinePlatform> {
    Arc::new(OfflinePlatform::new(spec(), fetcher))
}

pub fn settle(pending: Option<Pending<()>>) -> Result<()> {
    pending
        .expect("load should have started")
        .wait_timeout(Duration::from_secs(5))
        .expect("load timed out")
}
