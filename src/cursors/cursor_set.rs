use smallvec::SmallVec;

use crate::model::edit::Edit;
use crate::model::region::Region;

/// Whether a managed region follows the live cursor or stays frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Static,
    Active,
}

/// One managed region with its tag.
///
/// `seq` records insertion order and breaks ties between coincident regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub region: Region,
    pub tag: Tag,
    seq: u64,
}

impl Cursor {
    pub fn is_active(&self) -> bool {
        self.tag == Tag::Active
    }

    fn key(&self) -> (usize, usize, u64) {
        (self.region.start(), self.region.end(), self.seq)
    }
}

/// Tagged regions kept sorted by position.
#[derive(Debug, Clone, Default)]
pub struct CursorSet {
    cursors: SmallVec<[Cursor; 8]>,
    next_seq: u64,
}

impl CursorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding one Active region.
    pub fn singleton(region: Region) -> Self {
        let mut set = Self::new();
        set.insert(region, Tag::Active);
        set
    }

    /// A set where every region carries the same tag.
    pub fn uniform(regions: impl IntoIterator<Item = Region>, tag: Tag) -> Self {
        let mut set = Self::new();
        for region in regions {
            set.insert(region, tag);
        }
        set
    }

    /// Build a single-active set from tagged regions supplied by a host.
    ///
    /// Input order is not trusted. If the input does not carry exactly one
    /// Active region, the first Active one (by position) is kept, or the first
    /// region is promoted when none is Active.
    pub fn from_tagged(tagged: impl IntoIterator<Item = (Region, Tag)>) -> Self {
        let mut set = Self::new();
        let mut unsorted = false;
        let mut previous: Option<Region> = None;

        for (region, tag) in tagged {
            if previous.is_some_and(|prev| prev.cmp_position(&region).is_gt()) {
                unsorted = true;
            }
            previous = Some(region);
            set.insert(region, tag);
        }

        if unsorted {
            tracing::warn!("host supplied regions out of order, re-sorted");
        }

        let active = set.active_count();
        if active != 1 && !set.is_empty() {
            tracing::warn!(
                active,
                total = set.len(),
                "host supplied inconsistent active regions, keeping the first"
            );
            let keep = set.active_index().unwrap_or(0);
            set.set_all(Tag::Static);
            set.set_tag(keep, Tag::Active);
        }

        set
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cursor> {
        self.cursors.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Cursor> {
        self.cursors.get(index)
    }

    pub fn first(&self) -> Option<Region> {
        self.cursors.first().map(|c| c.region)
    }

    /// Index of the first Active cursor.
    pub fn active_index(&self) -> Option<usize> {
        self.cursors.iter().position(Cursor::is_active)
    }

    pub fn active(&self) -> Option<Region> {
        self.active_index().map(|i| self.cursors[i].region)
    }

    pub fn active_count(&self) -> usize {
        self.cursors.iter().filter(|c| c.is_active()).count()
    }

    pub fn regions(&self) -> Vec<Region> {
        self.cursors.iter().map(|c| c.region).collect()
    }

    pub fn static_regions(&self) -> Vec<Region> {
        self.cursors
            .iter()
            .filter(|c| !c.is_active())
            .map(|c| c.region)
            .collect()
    }

    /// Insert a region after every cursor at the same position and return its
    /// index.
    pub fn insert(&mut self, region: Region, tag: Tag) -> usize {
        let cursor = Cursor {
            region,
            tag,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.place(cursor)
    }

    pub fn remove(&mut self, index: usize) -> Option<Cursor> {
        if index < self.cursors.len() {
            Some(self.cursors.remove(index))
        } else {
            None
        }
    }

    pub fn set_tag(&mut self, index: usize, tag: Tag) {
        if let Some(cursor) = self.cursors.get_mut(index) {
            cursor.tag = tag;
        }
    }

    pub fn set_all(&mut self, tag: Tag) {
        for cursor in &mut self.cursors {
            cursor.tag = tag;
        }
    }

    /// Shift every region through a document edit.
    pub fn map_edit(&mut self, edit: &Edit) {
        for cursor in &mut self.cursors {
            cursor.region = cursor.region.map(edit);
        }
        // A monotone mapping can only create ties, which `seq` resolves.
        self.cursors.sort_by_key(Cursor::key);
    }

    pub fn is_sorted(&self) -> bool {
        self.cursors
            .windows(2)
            .all(|pair| pair[0].key() <= pair[1].key())
    }

    fn place(&mut self, cursor: Cursor) -> usize {
        let key = cursor.key();
        let index = self.cursors.partition_point(|c| c.key() < key);
        self.cursors.insert(index, cursor);
        index
    }
}
