use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Frame replacement policy for the physical frame pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Fifo,
    Lru,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Fifo => write!(f, "FIFO"),
            Policy::Lru => write!(f, "LRU"),
        }
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Policy::Fifo),
            "lru" => Ok(Policy::Lru),
            other => Err(format!("unknown policy '{}', expected fifo or lru", other)),
        }
    }
}

/// Back-reference from a mapped frame to its owning page:
/// (segment, directory slot, page index).
pub type FrameOwner = (usize, usize, usize);

/// Per-frame bookkeeping. `free == true` implies `owner` is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    pub free: bool,
    pub owner: Option<FrameOwner>,
    pub loaded_time: u64,
    pub last_access: u64,
}

impl Default for FrameMeta {
    fn default() -> Self {
        FrameMeta {
            free: true,
            owner: None,
            loaded_time: 0,
            last_access: 0,
        }
    }
}

/// Fixed pool of physical frame slots with policy-driven victim selection.
///
/// The pool never resolves page ownership on its own: `allocate_free` and
/// `choose_victim` only pick a frame id, and the translation engine is
/// responsible for the subsequent `map` (and for unlinking a victim's page).
pub struct FramePool {
    meta: Vec<FrameMeta>,
    // FIFO proposal order. Entries are appended on allocate and on every map,
    // so duplicates and stale (freed) ids accumulate; choose_victim skips the
    // stale ones. This reproduces the round-robin-over-survivors ordering of
    // the original simulator and is part of the pool's contract.
    fifo_queue: VecDeque<usize>,
    policy: Policy,
}

impl FramePool {
    /// Create a pool of `frames` free slots governed by `policy`.
    pub fn new(frames: usize, policy: Policy) -> Self {
        FramePool {
            meta: vec![FrameMeta::default(); frames],
            fifo_queue: VecDeque::new(),
            policy,
        }
    }

    /// Grab the first free frame, if any, and record it as a future FIFO
    /// candidate. The caller must follow up with `map`.
    pub fn allocate_free(&mut self) -> Option<usize> {
        for i in 0..self.meta.len() {
            if self.meta[i].free {
                self.meta[i].free = false;
                self.fifo_queue.push_back(i);
                return Some(i);
            }
        }
        None
    }

    /// Pick a non-free frame to evict under the active policy.
    ///
    /// FIFO pops stale (already freed) queue heads, then returns the head and
    /// re-enqueues it at the tail, so a frame that survives a proposal round
    /// moves to the back of the line. LRU scans for the minimum last-access
    /// timestamp, ties broken by the lowest frame id. Returns `None` only
    /// when no frame is in use.
    pub fn choose_victim(&mut self) -> Option<usize> {
        match self.policy {
            Policy::Fifo => {
                while let Some(&head) = self.fifo_queue.front() {
                    if self.meta[head].free {
                        self.fifo_queue.pop_front();
                    } else {
                        break;
                    }
                }
                let frame = self.fifo_queue.pop_front()?;
                self.fifo_queue.push_back(frame);
                Some(frame)
            }
            Policy::Lru => self
                .meta
                .iter()
                .enumerate()
                .filter(|(_, m)| !m.free)
                .min_by_key(|(_, m)| m.last_access)
                .map(|(i, _)| i),
        }
    }

    /// Mark `frame` used by `(seg, dir, page)` and stamp both timestamps.
    ///
    /// The frame is registered with the FIFO queue regardless of the active
    /// policy so a policy switch would see consistent history; under LRU the
    /// queue is simply never consulted.
    pub fn map(&mut self, frame: usize, seg: usize, dir: usize, page: usize, now: u64) {
        if let Some(m) = self.meta.get_mut(frame) {
            m.free = false;
            m.owner = Some((seg, dir, page));
            m.loaded_time = now;
            m.last_access = now;
            self.fifo_queue.push_back(frame);
        }
    }

    /// Refresh the last-access timestamp of a mapped frame. No-op for free
    /// or out-of-range frames.
    pub fn touch(&mut self, frame: usize, now: u64) {
        if let Some(m) = self.meta.get_mut(frame) {
            if !m.free {
                m.last_access = now;
            }
        }
    }

    /// Reset `frame` to the free state and clear its owner. Idempotent;
    /// out-of-range ids are ignored.
    pub fn free(&mut self, frame: usize) {
        if let Some(m) = self.meta.get_mut(frame) {
            *m = FrameMeta::default();
        }
    }

    /// Metadata for one frame, if the id is in range.
    #[inline]
    pub fn info(&self, frame: usize) -> Option<&FrameMeta> {
        self.meta.get(frame)
    }

    /// Total frame capacity.
    #[inline]
    pub fn frames(&self) -> usize {
        self.meta.len()
    }

    /// Count of frames currently mapped.
    pub fn used(&self) -> usize {
        self.meta.iter().filter(|m| !m.free).count()
    }

    /// Fraction of frames in use, as a percentage in [0, 100].
    pub fn utilization(&self) -> f64 {
        if self.meta.is_empty() {
            return 0.0;
        }
        self.used() as f64 / self.meta.len() as f64 * 100.0
    }
}
