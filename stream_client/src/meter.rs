//! Throughput counters for the streaming loop.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

#[derive(Default)]
pub struct Meter {
    sent_frames: AtomicU64,
    received_results: AtomicU64,
    skipped_ticks: AtomicU64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            sent_frames: AtomicU64::new(0),
            received_results: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
        }
    }

    pub fn tick_sent(&self) {
        self.sent_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_received(&self) {
        self.received_results.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_skipped(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_reset_sent(&self) -> u64 {
        self.sent_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_received(&self) -> u64 {
        self.received_results.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_skipped(&self) -> u64 {
        self.skipped_ticks.swap(0, Ordering::Relaxed)
    }
}

pub fn spawn_meter_logger() -> JoinHandle<()> {
    tokio::spawn(async {
        let mut log_interval = interval(Duration::from_secs(2));
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let sent = METER.get_reset_sent();
            let received = METER.get_reset_received();
            let skipped = METER.get_reset_skipped();
            let elapsed = start.elapsed().as_secs_f32();

            if sent > 0 {
                log::info!("Frames sent per second: {:.2}", sent as f32 / elapsed);
            }
            if received > 0 {
                log::info!(
                    "Results received per second: {:.2}",
                    received as f32 / elapsed
                );
            }
            if skipped > 0 {
                log::debug!("Ticks skipped without a ready frame: {skipped}");
            }
        }
    })
}
