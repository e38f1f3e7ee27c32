//! Wall-clock driver for the chirp scheduler.
//!
//! A dedicated `elytra-chirp-timer` thread sleeps on a control channel until
//! the scheduler's next deadline, fires whatever is due and hands the chirps
//! to the render graph. It never renders audio itself.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::audio::graph::GraphHandle;
use crate::engine::chirps::ChirpScheduler;
use crate::error::{ElytraError, Result};

pub const TIMER_THREAD_NAME: &str = "elytra-chirp-timer";

#[derive(Debug, Clone, Copy)]
enum TimerControl {
    /// The schedule changed; recompute the next deadline.
    Wake,
    Shutdown,
}

/// Handle to the running timer thread. Dropping it stops and joins the thread.
pub struct TimerThread {
    control: Option<Sender<TimerControl>>,
    join: Option<JoinHandle<()>>,
}

impl TimerThread {
    /// Spawn the timer thread. Deadlines are measured from `origin`.
    pub fn spawn(
        scheduler: Arc<Mutex<ChirpScheduler>>,
        graph: GraphHandle,
        origin: Instant,
    ) -> Result<Self> {
        let (tx, rx) = bounded::<TimerControl>(16);

        let join = thread::Builder::new()
            .name(TIMER_THREAD_NAME.into())
            .spawn(move || {
                debug!("chirp timer thread started");
                loop {
                    let next = scheduler.lock().next_deadline();
                    let control = match next {
                        Some(deadline) => {
                            let now = origin.elapsed();
                            if deadline <= now {
                                Err(RecvTimeoutError::Timeout)
                            } else {
                                rx.recv_timeout(deadline - now)
                            }
                        }
                        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match control {
                        Ok(TimerControl::Wake) => continue,
                        Ok(TimerControl::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            let event = scheduler
                                .lock()
                                .poll(origin.elapsed(), graph.current_time());
                            if let Some(event) = event {
                                graph.start_chirp(event);
                            }
                        }
                    }
                }
                debug!("chirp timer thread finished");
            })
            .map_err(|e| ElytraError::TimerThread(e.to_string()))?;

        Ok(Self {
            control: Some(tx),
            join: Some(join),
        })
    }

    /// Tell the thread the schedule changed.
    pub fn wake(&self) {
        if let Some(control) = &self.control {
            let _ = control.try_send(TimerControl::Wake);
        }
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(control) = self.control.take() {
            let _ = control.send(TimerControl::Shutdown);
            // Dropping the sender also disconnects the channel.
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("chirp timer thread panicked");
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.join.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
