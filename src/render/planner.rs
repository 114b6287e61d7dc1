//! Ring window arithmetic.
//!
//! Given the camera height (or a base index) and the last settled centre,
//! decide whether the live window must move and which index range it should
//! cover. The arithmetic is pure; `WindowPlanner` lets the window manager run
//! it inline or on a background thread. Both paths call the same
//! `plan_from_base`, so their results cannot drift apart.

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GalleryConfig;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn window worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Window worker is not running")]
    NotRunning,
    #[error("Window worker disconnected")]
    Disconnected,
    #[error("Window worker sent an unexpected reply")]
    UnexpectedReply,
}

/// Result of one window computation. Range is `[start_index, end_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowPlan {
    pub start_index: i64,
    pub end_index: i64,
    pub needs_update: bool,
    pub base_index: i64,
}

/// Input when the caller already knows the base index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsRequest {
    pub base_index: i64,
    pub visible_rings: i64,
    pub vertical_offset: f32,
    /// `None` before the first window has been built
    pub current_ring_index: Option<i64>,
    pub ring_bound: i64,
}

/// Input expressed as a camera height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub camera_y: f32,
    pub vertical_offset: f32,
    pub visible_rings: i64,
    pub current_ring_index: Option<i64>,
    pub ring_bound: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum WorkerRequest {
    CalculatePositions(PositionsRequest),
    UpdateRings(UpdateRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum WorkerReply {
    PositionsCalculated(WindowPlan),
    RingsUpdateCalculated(WindowPlan),
}

/// `floor(camera_y / vertical_offset)`, computed in f64.
pub fn base_index(camera_y: f32, vertical_offset: f32) -> i64 {
    (camera_y as f64 / vertical_offset as f64).floor() as i64
}

/// The windowing rule: hysteresis of `visible_rings / 4` around the current
/// centre, range of `visible_rings` around the base, clamped to the bound.
pub fn plan_from_base(req: &PositionsRequest) -> WindowPlan {
    let half = req.visible_rings / 2;
    let hysteresis = (req.visible_rings / 4).max(0) as u64;
    let needs_update = match req.current_ring_index {
        None => true,
        Some(current) => req.base_index.abs_diff(current) > hysteresis,
    };
    let bound = req.ring_bound.abs();

    WindowPlan {
        start_index: req.base_index.saturating_sub(half).clamp(-bound, bound),
        end_index: req.base_index.saturating_add(half).clamp(-bound, bound),
        needs_update,
        base_index: req.base_index,
    }
}

pub fn plan_from_camera(req: &UpdateRequest) -> WindowPlan {
    plan_from_base(&PositionsRequest {
        base_index: base_index(req.camera_y, req.vertical_offset),
        visible_rings: req.visible_rings,
        vertical_offset: req.vertical_offset,
        current_ring_index: req.current_ring_index,
        ring_bound: req.ring_bound,
    })
}

/// What the worker thread does with one message.
pub fn handle_request(req: &WorkerRequest) -> WorkerReply {
    match req {
        WorkerRequest::CalculatePositions(p) => WorkerReply::PositionsCalculated(plan_from_base(p)),
        WorkerRequest::UpdateRings(u) => WorkerReply::RingsUpdateCalculated(plan_from_camera(u)),
    }
}

/// Strategy for running the window arithmetic.
pub trait WindowPlanner {
    fn name(&self) -> &'static str;
    fn calculate_positions(&mut self, req: &PositionsRequest) -> WindowPlan;
    fn update_rings(&mut self, req: &UpdateRequest) -> WindowPlan;
    /// Release any background resources. Idempotent.
    fn terminate(&mut self) {}
}

/// Runs the arithmetic on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlinePlanner;

impl WindowPlanner for InlinePlanner {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn calculate_positions(&mut self, req: &PositionsRequest) -> WindowPlan {
        plan_from_base(req)
    }

    fn update_rings(&mut self, req: &UpdateRequest) -> WindowPlan {
        plan_from_camera(req)
    }
}

/// Requests and replies travel tagged with a sequence number so a reply
/// that arrives after its request was answered inline is never mistaken
/// for the answer to a newer one.
struct WorkerChannel {
    tx: mpsc::Sender<(u64, WorkerRequest)>,
    rx: mpsc::Receiver<(u64, WorkerReply)>,
    handle: JoinHandle<()>,
}

/// Runs the arithmetic on a stateless background thread.
///
/// The frame never waits longer than `wait` for a reply (zero by default,
/// which only picks up replies that are already there). A missed reply is
/// answered inline and the worker keeps running. A send failure, a
/// disconnect or a mismatched reply shuts the worker down; calls are then
/// answered inline until `restart`.
pub struct WorkerPlanner {
    channel: Option<WorkerChannel>,
    wait: Duration,
    next_seq: u64,
    served: u64,
    missed: u64,
}

impl WorkerPlanner {
    pub fn spawn(wait: Duration) -> Result<Self, WorkerError> {
        Ok(Self {
            channel: Some(spawn_worker()?),
            wait,
            next_seq: 0,
            served: 0,
            missed: 0,
        })
    }

    pub fn is_running(&self) -> bool {
        self.channel.is_some()
    }

    /// Calls answered by the worker.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Calls answered inline because the worker reply was not ready.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    pub fn restart(&mut self) -> Result<(), WorkerError> {
        self.terminate();
        self.channel = Some(spawn_worker()?);
        log::info!("Window worker restarted");
        Ok(())
    }

    /// Send `req` and collect its reply if it shows up within `wait`.
    /// `Ok(None)` means the reply was not ready in time.
    fn roundtrip(&mut self, req: WorkerRequest) -> Result<Option<WorkerReply>, WorkerError> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        let channel = self.channel.as_ref().ok_or(WorkerError::NotRunning)?;
        channel
            .tx
            .send((seq, req))
            .map_err(|_| WorkerError::Disconnected)?;

        let deadline = Instant::now() + self.wait;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let received = if left.is_zero() {
                match channel.rx.try_recv() {
                    Ok(msg) => msg,
                    Err(mpsc::TryRecvError::Empty) => return Ok(None),
                    Err(mpsc::TryRecvError::Disconnected) => return Err(WorkerError::Disconnected),
                }
            } else {
                match channel.rx.recv_timeout(left) {
                    Ok(msg) => msg,
                    Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                    Err(mpsc::RecvTimeoutError::Disconnected) => return Err(WorkerError::Disconnected),
                }
            };
            match received {
                (id, reply) if id == seq => return Ok(Some(reply)),
                (id, _) => log::trace!("Dropping stale window reply {} (waiting for {})", id, seq),
            }
        }
    }

    fn fail(&mut self, err: WorkerError) {
        if !matches!(err, WorkerError::NotRunning) {
            log::warn!("{}; falling back to inline window planning", err);
            self.terminate();
        }
    }

    fn miss(&mut self) {
        self.missed += 1;
        log::trace!("Window worker reply not ready; planned inline");
    }
}

fn spawn_worker() -> Result<WorkerChannel, WorkerError> {
    let (req_tx, req_rx) = mpsc::channel::<(u64, WorkerRequest)>();
    let (reply_tx, reply_rx) = mpsc::channel::<(u64, WorkerReply)>();

    let handle = std::thread::Builder::new()
        .name("ring-window".into())
        .spawn(move || {
            for (seq, req) in req_rx {
                if reply_tx.send((seq, handle_request(&req))).is_err() {
                    break;
                }
            }
        })?;

    log::info!("Window worker started");
    Ok(WorkerChannel {
        tx: req_tx,
        rx: reply_rx,
        handle,
    })
}

impl WindowPlanner for WorkerPlanner {
    fn name(&self) -> &'static str {
        "worker"
    }

    fn calculate_positions(&mut self, req: &PositionsRequest) -> WindowPlan {
        match self.roundtrip(WorkerRequest::CalculatePositions(*req)) {
            Ok(Some(WorkerReply::PositionsCalculated(plan))) => {
                self.served += 1;
                plan
            }
            Ok(None) => {
                self.miss();
                plan_from_base(req)
            }
            Ok(Some(_)) => {
                self.fail(WorkerError::UnexpectedReply);
                plan_from_base(req)
            }
            Err(e) => {
                self.fail(e);
                plan_from_base(req)
            }
        }
    }

    fn update_rings(&mut self, req: &UpdateRequest) -> WindowPlan {
        match self.roundtrip(WorkerRequest::UpdateRings(*req)) {
            Ok(Some(WorkerReply::RingsUpdateCalculated(plan))) => {
                self.served += 1;
                plan
            }
            Ok(None) => {
                self.miss();
                plan_from_camera(req)
            }
            Ok(Some(_)) => {
                self.fail(WorkerError::UnexpectedReply);
                plan_from_camera(req)
            }
            Err(e) => {
                self.fail(e);
                plan_from_camera(req)
            }
        }
    }

    fn terminate(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        // Dropping the sender ends the worker loop.
        drop(channel.tx);
        if channel.handle.join().is_err() {
            log::error!("Window worker panicked");
        } else {
            log::info!("Window worker stopped");
        }
    }
}

impl Drop for WorkerPlanner {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Worker-backed planner when configured and available, inline otherwise.
pub fn planner_for(cfg: &GalleryConfig) -> Box<dyn WindowPlanner> {
    if !cfg.use_worker {
        return Box::new(InlinePlanner);
    }
    match WorkerPlanner::spawn(Duration::from_millis(cfg.worker_timeout_ms)) {
        Ok(worker) => Box::new(worker),
        Err(e) => {
            log::warn!("{}; using inline window planning", e);
            Box::new(InlinePlanner)
        }
    }
}
