use crate::model::region::Region;

slotmap::new_key_type! {
    /// Identity of an open document view.
    pub struct ViewId;
}

/// The editor side of cursor transitions.
///
/// The host owns rendering and the live selection; the controller only reads
/// the live regions and tells the host what to show next.
pub trait Host {
    /// The view's live cursors and selections, sorted by position.
    fn current_regions(&self, view: ViewId) -> Vec<Region>;

    /// Replace the view's live cursors and selections.
    fn set_regions(&mut self, view: ViewId, regions: &[Region]);

    /// Replace the frozen regions drawn in the view.
    fn set_static_regions(&mut self, view: ViewId, regions: &[Region]);

    /// Scroll the view so `region` is visible.
    fn reveal(&mut self, _view: ViewId, _region: Region) {}
}
