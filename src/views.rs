use slotmap::SlotMap;

use power_cursors::cursors::host::{Host, ViewId};
use power_cursors::model::buffer::Buffer;
use power_cursors::model::region::Region;

/// Open buffers, one per view. This is the editor side the cursor sessions
/// talk to.
#[derive(Default)]
pub struct Views {
    buffers: SlotMap<ViewId, Buffer>,
}

impl Views {
    pub fn insert(&mut self, buffer: Buffer) -> ViewId {
        self.buffers.insert(buffer)
    }

    pub fn get(&self, view: ViewId) -> Option<&Buffer> {
        self.buffers.get(view)
    }

    pub fn get_mut(&mut self, view: ViewId) -> Option<&mut Buffer> {
        self.buffers.get_mut(view)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ViewId, &mut Buffer)> {
        self.buffers.iter_mut()
    }
}

impl Host for Views {
    fn current_regions(&self, view: ViewId) -> Vec<Region> {
        self.buffers
            .get(view)
            .map(|buffer| buffer.selections().to_vec())
            .unwrap_or_default()
    }

    fn set_regions(&mut self, view: ViewId, regions: &[Region]) {
        if let Some(buffer) = self.buffers.get_mut(view) {
            buffer.set_selections(regions);
        }
    }

    fn set_static_regions(&mut self, view: ViewId, regions: &[Region]) {
        if let Some(buffer) = self.buffers.get_mut(view) {
            buffer.set_statics(regions);
        }
    }

    fn reveal(&mut self, view: ViewId, region: Region) {
        if let Some(buffer) = self.buffers.get_mut(view) {
            buffer.scroll_to(region.head);
        }
    }
}
