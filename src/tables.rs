use rand::Rng;

/// Protection attached to a segment or an individual page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    ReadOnly,
    ReadWrite,
}

impl Protection {
    /// Draw read-only or read-write with equal probability.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Protection::ReadOnly
        } else {
            Protection::ReadWrite
        }
    }

    /// Short form used by the memory-map dump.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Protection::ReadOnly => "RO",
            Protection::ReadWrite => "RW",
        }
    }
}

/// One logical region of the address space. Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Physical base offset of the segment.
    pub base: u64,
    /// Number of logical pages addressable through this segment.
    pub limit_pages: u64,
    pub prot: Protection,
}

/// Translation state for a single page within a second-level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub present: bool,
    /// Index into the frame pool; `None` while unmapped.
    pub frame: Option<usize>,
    pub prot: Protection,
    pub last_access: u64,
}

impl Page {
    /// A page takes part in translation only when it is flagged present and
    /// actually holds a frame. Entries randomized to "present" at table
    /// construction carry no frame, so their first access faults exactly
    /// like an absent entry.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.present && self.frame.is_some()
    }

    /// Sever this page's side of the page/frame link during eviction.
    pub fn unlink(&mut self) {
        self.present = false;
        self.frame = None;
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            present: false,
            frame: None,
            prot: Protection::ReadWrite,
            last_access: 0,
        }
    }
}

/// Second-level table: a fixed array of page entries, one per directory slot.
#[derive(Debug, Clone)]
pub struct PageTable {
    entries: Vec<Page>,
}

impl PageTable {
    /// Build a table of `entries` pages. Presence and protection are
    /// randomized independently so a fresh engine sees a realistic mix of
    /// immediate hits and faults; no entry starts with a frame assigned.
    pub fn new<R: Rng>(entries: usize, rng: &mut R) -> Self {
        let entries = (0..entries)
            .map(|_| Page {
                present: rng.gen_bool(0.5),
                frame: None,
                prot: Protection::random(rng),
                last_access: 0,
            })
            .collect();
        PageTable { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn at(&self, index: usize) -> &Page {
        &self.entries[index]
    }

    #[inline]
    pub fn at_mut(&mut self, index: usize) -> &mut Page {
        &mut self.entries[index]
    }

    /// Bounds-checked access, used when resolving frame back-references that
    /// may point at entries which no longer exist.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Page> {
        self.entries.get_mut(index)
    }
}

/// Top-level index node. The second-level table is allocated on first touch
/// so the full segments x fan-out x table-size matrix never exists up front.
#[derive(Debug, Default, Clone)]
pub struct DirEntry {
    present: bool,
    table: Option<PageTable>,
}

impl DirEntry {
    /// Materialize the owned table if absent and return it. Idempotent:
    /// later calls see the same table.
    pub fn ensure<R: Rng>(&mut self, fanout: usize, rng: &mut R) -> &mut PageTable {
        self.present = true;
        self.table.get_or_insert_with(|| PageTable::new(fanout, rng))
    }

    #[inline]
    pub fn present(&self) -> bool {
        self.present
    }

    #[inline]
    pub fn table(&self) -> Option<&PageTable> {
        self.table.as_ref()
    }

    #[inline]
    pub fn table_mut(&mut self) -> Option<&mut PageTable> {
        self.table.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn new_table_has_no_frames_assigned() {
        let mut rng = StdRng::seed_from_u64(1);
        let table = PageTable::new(8, &mut rng);
        assert_eq!(table.len(), 8);
        for i in 0..table.len() {
            assert_eq!(table.at(i).frame, None);
            assert_eq!(table.at(i).last_access, 0);
        }
    }

    #[test]
    fn present_without_frame_is_not_mapped() {
        let page = Page {
            present: true,
            ..Page::default()
        };
        assert!(!page.is_mapped());

        let mapped = Page {
            present: true,
            frame: Some(3),
            ..Page::default()
        };
        assert!(mapped.is_mapped());
    }

    #[test]
    fn unlink_clears_presence_and_frame() {
        let mut page = Page {
            present: true,
            frame: Some(2),
            ..Page::default()
        };
        page.unlink();
        assert!(!page.present);
        assert_eq!(page.frame, None);
    }

    #[test]
    fn ensure_materializes_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut entry = DirEntry::default();
        assert!(!entry.present());
        assert!(entry.table().is_none());

        entry.ensure(4, &mut rng).at_mut(2).frame = Some(5);
        assert!(entry.present());

        // A second ensure must not rebuild the table.
        assert_eq!(entry.ensure(4, &mut rng).at(2).frame, Some(5));
    }
}
