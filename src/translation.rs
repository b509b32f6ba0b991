use std::fmt::Write as _;
use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::SimConfig;
use crate::memory::{FrameOwner, FramePool};
use crate::tables::{DirEntry, Page, Protection, Segment};

/// Kind of access being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Single-letter form used by driver output.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "R",
            Access::Write => "W",
        }
    }
}

/// Per-request failure taxonomy; mutually exclusive, first failing check
/// wins. None of these are fatal to the engine and none leave partial
/// mapping state behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    /// Bad segment id, or page number beyond the segment limit.
    #[error("segment fault")]
    Segment,
    /// Offset outside the page.
    #[error("offset fault")]
    Offset,
    /// Write attempted against a read-only segment or page.
    #[error("protection violation")]
    Protection,
    /// A page fault occurred but no victim frame could be found.
    #[error("no frame available")]
    NoFrame,
}

/// Rejected engine construction: a segment addresses more pages than the
/// dir_size x dir_size directory matrix can index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("segment {segment}: limit {limit_pages} exceeds the {max}-page directory matrix")]
pub struct LayoutError {
    pub segment: usize,
    pub limit_pages: u64,
    pub max: u64,
}

/// Successful translation: the physical address plus the synthetic
/// per-access latency charged for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub physical: u64,
    pub latency: u64,
}

/// Monotonic counters maintained exclusively by the translation engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub translations: u64,
    pub faults: u64,
    pub replacements: u64,
    pub prot_viol: u64,
    pub seg_faults: u64,
    pub offset_faults: u64,
    pub writes_denied: u64,
    pub logs: u64,
    pub total_latency: u64,
}

impl Metrics {
    /// Mean synthetic latency over successful translations.
    pub fn avg_latency(&self) -> f64 {
        if self.translations == 0 {
            0.0
        } else {
            self.total_latency as f64 / self.translations as f64
        }
    }
}

/// Segment table plus the two-level directory matrix: the translation engine.
///
/// Owns the segment descriptors, the lazily-filled directory entries, the
/// frame pool, the metrics, a logical clock that ticks once per `translate`
/// call, and a seeded RNG so two engines with the same configuration replay
/// identically.
pub struct SegmentTable {
    page_size: u64,
    dir_size: usize,
    segments: Vec<Segment>,
    dirs: Vec<Vec<DirEntry>>,
    pool: FramePool,
    metrics: Metrics,
    clock: u64,
    rng: StdRng,
    log_sink: Option<Box<dyn Write>>,
}

impl SegmentTable {
    /// Build an engine with randomized segment descriptors: bases spaced
    /// 5000 apart from 1000, limits of 3..=7 pages (clamped to what the
    /// directory matrix can index), random protection.
    pub fn new(cfg: &SimConfig) -> Self {
        let max = Self::max_pages(cfg);
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let segments = (0..cfg.segments)
            .map(|s| Segment {
                base: 1000 + s as u64 * 5000,
                limit_pages: (3 + rng.gen_range(0..5u64)).min(max),
                prot: Protection::random(&mut rng),
            })
            .collect();
        Self::build(cfg, segments, rng)
    }

    /// Build an engine over an explicit segment layout. Scripted runs and
    /// the scenario tests need fixed limits and protections. A segment
    /// whose limit exceeds the dir_size x dir_size page matrix is rejected;
    /// accepting it would leave in-bounds page numbers with no directory
    /// slot to resolve through.
    pub fn with_segments(cfg: &SimConfig, segments: Vec<Segment>) -> Result<Self, LayoutError> {
        let max = Self::max_pages(cfg);
        for (segment, s) in segments.iter().enumerate() {
            if s.limit_pages > max {
                return Err(LayoutError {
                    segment,
                    limit_pages: s.limit_pages,
                    max,
                });
            }
        }
        Ok(Self::build(cfg, segments, StdRng::seed_from_u64(cfg.seed)))
    }

    /// Highest page count one segment can address: dir_size directory slots
    /// of dir_size pages each.
    #[inline]
    fn max_pages(cfg: &SimConfig) -> u64 {
        (cfg.dir_size * cfg.dir_size) as u64
    }

    fn build(cfg: &SimConfig, segments: Vec<Segment>, rng: StdRng) -> Self {
        let dirs = segments
            .iter()
            .map(|_| (0..cfg.dir_size).map(|_| DirEntry::default()).collect())
            .collect();
        SegmentTable {
            page_size: cfg.page_size,
            dir_size: cfg.dir_size,
            segments,
            dirs,
            pool: FramePool::new(cfg.frames, cfg.policy),
            metrics: Metrics::default(),
            clock: 0,
            rng,
            log_sink: None,
        }
    }

    /// Attach an append-only sink that receives one line per fault.
    pub fn set_log_sink(&mut self, sink: Box<dyn Write>) {
        self.log_sink = Some(sink);
    }

    /// Resolve `(segment, page_number, offset)` for `access` to a physical
    /// address, or fail with the first violated check.
    ///
    /// An absent page triggers a page fault resolved from the frame pool,
    /// evicting a victim when no free frame remains. Failures increment
    /// their counter and the log counter, and never mutate mapping state.
    pub fn translate(
        &mut self,
        seg: i64,
        page_number: i64,
        offset: i64,
        access: Access,
    ) -> Result<Translation, Fault> {
        self.clock += 1;
        let now = self.clock;
        // Drawn up front so the RNG stream does not depend on the outcome;
        // only successful translations charge it to the totals.
        let latency = self.rng.gen_range(1..=5u64);

        if seg < 0 || seg as usize >= self.segments.len() {
            return Err(self.fail(Fault::Segment, "segment fault: bad segment id"));
        }
        let seg = seg as usize;
        let segment = self.segments[seg];
        if access == Access::Write && segment.prot == Protection::ReadOnly {
            return Err(self.fail(
                Fault::Protection,
                "protection violation: write to read-only segment",
            ));
        }
        if page_number < 0 || page_number as u64 >= segment.limit_pages {
            return Err(self.fail(
                Fault::Segment,
                "segment fault: page number exceeds segment limit",
            ));
        }
        if offset < 0 || offset as u64 >= self.page_size {
            return Err(self.fail(Fault::Offset, "offset fault: offset outside page"));
        }
        let page_number = page_number as u64;
        let offset = offset as u64;

        // Two-level split over the directory fan-out.
        let dir = page_number as usize / self.dir_size;
        let page = page_number as usize % self.dir_size;

        let (page_prot, mapped_frame) = {
            let entry = self.page_mut(seg, dir, page);
            (entry.prot, if entry.is_mapped() { entry.frame } else { None })
        };
        if access == Access::Write && page_prot == Protection::ReadOnly {
            return Err(self.fail(
                Fault::Protection,
                "protection violation: write to read-only page",
            ));
        }

        match mapped_frame {
            Some(frame) => {
                self.pool.touch(frame, now);
                self.page_mut(seg, dir, page).last_access = now;
            }
            None => {
                self.metrics.faults += 1;
                let frame = match self.pool.allocate_free() {
                    Some(f) => f,
                    None => {
                        let victim = match self.pool.choose_victim() {
                            Some(v) => v,
                            None => {
                                return Err(
                                    self.fail(Fault::NoFrame, "no victim frame available")
                                );
                            }
                        };
                        let owner = self.pool.info(victim).and_then(|m| m.owner);
                        if self.unlink(owner) {
                            self.pool.free(victim);
                            self.metrics.replacements += 1;
                        }
                        victim
                    }
                };
                let entry = self.page_mut(seg, dir, page);
                entry.present = true;
                entry.frame = Some(frame);
                entry.last_access = now;
                self.pool.map(frame, seg, dir, page, now);
            }
        }

        let physical = segment.base + page_number * self.page_size + offset;
        self.metrics.translations += 1;
        self.metrics.total_latency += latency;
        Ok(Translation { physical, latency })
    }

    /// Full-state dump: segment descriptors, per-directory presence, and
    /// per-page presence/frame/protection. Read-only projection.
    pub fn memory_map(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "===== Memory Map =====");
        let _ = writeln!(
            out,
            "Segments={} Dir={} PageSize={}",
            self.segments.len(),
            self.dir_size,
            self.page_size
        );
        for (s, segment) in self.segments.iter().enumerate() {
            let _ = writeln!(
                out,
                "Seg {} Base={} Limit={} Prot={}",
                s,
                segment.base,
                segment.limit_pages,
                segment.prot.as_str()
            );
            for (d, entry) in self.dirs[s].iter().enumerate() {
                let _ = writeln!(out, "  Dir {} present={}", d, if entry.present() { "Y" } else { "N" });
                if let Some(table) = entry.table() {
                    for p in 0..table.len() {
                        let page = table.at(p);
                        let _ = writeln!(
                            out,
                            "    Page {} present={} frame={} prot={}",
                            p,
                            if page.present { "Y" } else { "N" },
                            page.frame.map(|f| f as i64).unwrap_or(-1),
                            page.prot.as_str()
                        );
                    }
                }
            }
        }
        let _ = writeln!(out, "======================");
        out
    }

    #[inline]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    #[inline]
    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    #[inline]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Page entry accessor; materializes the second-level table on first
    /// touch of its directory slot.
    fn page_mut(&mut self, seg: usize, dir: usize, page: usize) -> &mut Page {
        self.dirs[seg][dir]
            .ensure(self.dir_size, &mut self.rng)
            .at_mut(page)
    }

    /// Clear the page currently claiming a victim frame. Returns false when
    /// the recorded owner no longer resolves to a live page entry, in which
    /// case the frame is simply remapped over.
    fn unlink(&mut self, owner: Option<FrameOwner>) -> bool {
        let Some((seg, dir, page)) = owner else {
            return false;
        };
        let Some(row) = self.dirs.get_mut(seg) else {
            return false;
        };
        let Some(entry) = row.get_mut(dir) else {
            return false;
        };
        let Some(table) = entry.table_mut() else {
            return false;
        };
        let Some(page) = table.get_mut(page) else {
            return false;
        };
        page.unlink();
        true
    }

    /// Bump the failure counter for `fault`, count the log line, and emit it
    /// to the sink if one is attached.
    fn fail(&mut self, fault: Fault, reason: &str) -> Fault {
        match fault {
            Fault::Segment => self.metrics.seg_faults += 1,
            Fault::Offset => self.metrics.offset_faults += 1,
            Fault::Protection => {
                self.metrics.prot_viol += 1;
                self.metrics.writes_denied += 1;
            }
            Fault::NoFrame => {}
        }
        self.metrics.logs += 1;
        if let Some(sink) = self.log_sink.as_mut() {
            let _ = writeln!(sink, "{}", reason);
        }
        fault
    }
}
