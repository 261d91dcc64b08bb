use super::region::CharIdx;

/// A single replacement in the document: `deleted` characters removed at
/// `offset`, then `inserted` characters written in their place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub offset: CharIdx,
    pub deleted: usize,
    pub inserted: usize,
}

impl Edit {
    pub fn insert(offset: CharIdx, inserted: usize) -> Self {
        Self {
            offset,
            deleted: 0,
            inserted,
        }
    }

    pub fn delete(offset: CharIdx, deleted: usize) -> Self {
        Self {
            offset,
            deleted,
            inserted: 0,
        }
    }

    /// Where a position ends up once this edit is applied.
    ///
    /// Positions inside the deleted span collapse onto `offset`; positions at
    /// or past its end shift by the length difference.
    pub fn map_pos(&self, pos: CharIdx) -> CharIdx {
        let deleted_end = self.offset + self.deleted;
        if pos < self.offset {
            pos
        } else if pos < deleted_end {
            self.offset
        } else {
            pos - self.deleted + self.inserted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_before_edit_stay() {
        let edit = Edit::insert(10, 3);
        assert_eq!(edit.map_pos(9), 9);
    }

    #[test]
    fn insertion_pushes_positions_at_offset() {
        let edit = Edit::insert(10, 3);
        assert_eq!(edit.map_pos(10), 13);
        assert_eq!(edit.map_pos(20), 23);
    }

    #[test]
    fn deletion_clamps_positions_inside_span() {
        let edit = Edit::delete(4, 4);
        assert_eq!(edit.map_pos(5), 4);
        assert_eq!(edit.map_pos(7), 4);
        assert_eq!(edit.map_pos(8), 4);
        assert_eq!(edit.map_pos(12), 8);
    }

    #[test]
    fn replacement_shifts_by_difference() {
        let edit = Edit {
            offset: 2,
            deleted: 3,
            inserted: 1,
        };
        assert_eq!(edit.map_pos(3), 2);
        assert_eq!(edit.map_pos(5), 3);
        assert_eq!(edit.map_pos(9), 7);
    }
}
