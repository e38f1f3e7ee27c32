//! Lock-free counters shared by the render graph, the chirp timer and the engine.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct AudioDiagnostics {
    pub blocks_rendered: AtomicUsize,
    pub noise_nodes_created: AtomicUsize,
    pub noise_nodes_released: AtomicUsize,
    pub chirps_scheduled: AtomicUsize,
    pub chirps_dispatched: AtomicUsize,
    pub chirps_started: AtomicUsize,
    pub chirps_finished: AtomicUsize,
    pub voices_dropped: AtomicUsize,
    pub commands_dropped: AtomicUsize,
    pub timers_cancelled: AtomicUsize,
}

impl AudioDiagnostics {
    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            blocks_rendered: self.blocks_rendered.load(Ordering::Relaxed),
            noise_nodes_created: self.noise_nodes_created.load(Ordering::Relaxed),
            noise_nodes_released: self.noise_nodes_released.load(Ordering::Relaxed),
            chirps_scheduled: self.chirps_scheduled.load(Ordering::Relaxed),
            chirps_dispatched: self.chirps_dispatched.load(Ordering::Relaxed),
            chirps_started: self.chirps_started.load(Ordering::Relaxed),
            chirps_finished: self.chirps_finished.load(Ordering::Relaxed),
            voices_dropped: self.voices_dropped.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            timers_cancelled: self.timers_cancelled.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub blocks_rendered: usize,
    pub noise_nodes_created: usize,
    pub noise_nodes_released: usize,
    pub chirps_scheduled: usize,
    pub chirps_dispatched: usize,
    pub chirps_started: usize,
    pub chirps_finished: usize,
    pub voices_dropped: usize,
    pub commands_dropped: usize,
    pub timers_cancelled: usize,
}
