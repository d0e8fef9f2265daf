use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};
use sdi_input::FrameSink;
use sdi_types::PipelineFrame;

/**
    Thread-safe bounded frame queue between capture and a worker.
*/
pub struct FrameQueue {
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    overflows: AtomicU64,
}

struct QueueInner {
    frames: VecDeque<PipelineFrame>,
    capacity: usize,
    closed: bool,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
            }),
            not_empty: Condvar::new(),
            overflows: AtomicU64::new(0),
        }
    }

    /**
        Try to push without blocking. Returns true if successful; otherwise
        the frame is dropped, which releases it.
    */
    pub fn try_push(&self, frame: PipelineFrame) -> bool {
        let mut inner = self.inner.lock();

        if inner.closed {
            return false;
        }
        if inner.frames.len() >= inner.capacity {
            self.overflows.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        inner.frames.push_back(frame);
        self.not_empty.notify_one();
        true
    }

    /**
        Pop a frame from the queue, blocking if empty.
        Returns None if the queue is closed and empty.
    */
    pub fn pop(&self) -> Option<PipelineFrame> {
        let mut inner = self.inner.lock();

        while inner.frames.is_empty() && !inner.closed {
            self.not_empty.wait(&mut inner);
        }

        inner.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    /**
        Close the queue. Frames already queued can still be popped; new ones
        are rejected.
    */
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_empty.notify_all();
    }

    /// Frames rejected because the queue was full.
    pub fn overflows(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }
}

impl FrameSink for FrameQueue {
    fn enqueue(&self, frame: PipelineFrame) -> bool {
        self.try_push(frame)
    }
}
