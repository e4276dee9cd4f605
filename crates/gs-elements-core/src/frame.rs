//! Animation-frame work queue.
//!
//! Work requested while no frame is pending opens a new frame; work
//! requested before that frame runs joins it. A depth counter tracks how
//! many requests share the open frame, so a burst of mounts in one turn
//! costs a single frame.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Queue of tasks for the next animation frame.
#[derive(Debug)]
pub struct FrameScheduler<T> {
    queue: Mutex<VecDeque<T>>,
    /// Requests sharing the currently open frame (0 = no frame pending).
    depth: AtomicUsize,
    /// Frames opened since creation.
    frames: AtomicU64,
}

impl<T> FrameScheduler<T> {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            depth: AtomicUsize::new(0),
            frames: AtomicU64::new(0),
        }
    }

    /// Queue a task for the next frame.
    ///
    /// Returns `true` if this request opened a new frame.
    pub fn request(&self, task: T) -> bool {
        self.queue.lock().push_back(task);
        let opened = self.depth.fetch_add(1, Ordering::AcqRel) == 0;
        if opened {
            self.frames.fetch_add(1, Ordering::Relaxed);
        }
        opened
    }

    /// Take every task of the pending frame and close it.
    ///
    /// Tasks requested while the returned batch runs belong to the next frame.
    pub fn take_frame(&self) -> Vec<T> {
        let mut queue = self.queue.lock();
        self.depth.store(0, Ordering::Release);
        queue.drain(..).collect()
    }

    /// Check if a frame is pending.
    pub fn has_pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    /// Number of tasks waiting for the next frame.
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of frames opened so far.
    pub fn frames_requested(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl<T> Default for FrameScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
