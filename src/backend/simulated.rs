//! Device emulated by a worker thread.
//!
//! Each submission is queued on a channel; the worker "executes" it by sleeping
//! for a fixed latency and then signals its token. Work retires strictly in
//! submission order, like a single hardware queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};

use super::{Device, DeviceError, DeviceResult, Submission};
use crate::fence::{CpuTimeline, FenceTimeline, FenceToken};

#[derive(Debug)]
struct Job {
    token: FenceToken,
    slot: usize,
    draws: usize,
    bytes: usize,
}

/// Counters updated by the worker
#[derive(Debug, Default)]
pub struct DeviceStats {
    executed: AtomicU64,
    bytes_read: AtomicU64,
}

impl DeviceStats {
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Acquire)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SimulatedDevice {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    timeline: Arc<CpuTimeline>,
    stats: Arc<DeviceStats>,
    latency: Duration,
}

impl SimulatedDevice {
    /// Spawn the worker. Every submission takes `latency` to retire.
    pub fn new(latency: Duration) -> DeviceResult<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let timeline = Arc::new(CpuTimeline::new());
        let stats = Arc::new(DeviceStats::default());

        let worker = {
            let timeline = Arc::clone(&timeline);
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("simulated-device".into())
                .spawn(move || {
                    for job in receiver.iter() {
                        thread::sleep(latency);
                        stats.executed.fetch_add(1, Ordering::AcqRel);
                        stats.bytes_read.fetch_add(job.bytes as u64, Ordering::AcqRel);
                        log::trace!(
                            "Simulated device retired {} (slot {}, {} draws)",
                            job.token,
                            job.slot,
                            job.draws
                        );
                        timeline.signal(job.token);
                    }
                    log::debug!("Simulated device worker exiting");
                })
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?
        };

        log::info!("Simulated device started with {:?} latency", latency);

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            timeline,
            stats,
            latency,
        })
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn stats(&self) -> Arc<DeviceStats> {
        Arc::clone(&self.stats)
    }
}

impl Device for SimulatedDevice {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn timeline(&self) -> Arc<dyn FenceTimeline> {
        self.timeline.clone()
    }

    fn submit(&mut self, submission: Submission<'_>) -> DeviceResult<()> {
        let commands = submission.commands();
        if !commands.is_closed() {
            return Err(DeviceError::Rejected(format!(
                "command list of slot {} is not closed",
                submission.slot_index()
            )));
        }

        let job = Job {
            token: submission.token,
            slot: submission.slot_index(),
            draws: commands.draw_count(),
            bytes: submission.upload_size(),
        };
        self.sender
            .as_ref()
            .ok_or(DeviceError::DeviceLost)?
            .send(job)
            .map_err(|_| DeviceError::DeviceLost)
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the queue and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Simulated device worker panicked");
            }
        }
    }
}
