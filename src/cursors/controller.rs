//! The cursor-transition state machine.
//!
//! A [`Controller`] manages the cursor set of one view. It starts
//! [`CursorState::Inactive`]; `add` moves it into single-active transition
//! mode, `activate` hands every region to the host at once, and `exit` (or
//! removing the last region) returns to the host's native cursor.

use thiserror::Error;

use super::command::{AddOptions, CursorCommand};
use super::cursor_set::{CursorSet, Tag};
use crate::model::edit::Edit;
use crate::model::region::Region;

#[derive(Debug, Clone, Default)]
pub enum CursorState {
    /// The host owns its cursors; nothing is managed.
    #[default]
    Inactive,
    /// Exactly one region is Active, the rest are frozen.
    SingleActive(CursorSet),
    /// Every region is live in the host's native multi-cursor mode.
    AllActive(CursorSet),
}

/// Why a command left the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NoOpReason {
    #[error("not in cursor transition")]
    NotInTransition,
    #[error("nothing to remove")]
    NothingToRemove,
    #[error("no live cursor to add")]
    NoLiveRegion,
    #[error("no cursor after the active one")]
    NoNext,
    #[error("no cursor before the active one")]
    NoPrevious,
    #[error("all cursors are already active")]
    AlreadyActive,
    #[error("select a cursor before removing")]
    RemoveWhileAllActive,
}

/// What the host should display after a transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostUpdate {
    /// Regions the host edits and moves natively.
    pub live: Vec<Region>,
    /// Frozen regions, rendered only.
    pub statics: Vec<Region>,
    /// Region to scroll into view.
    pub reveal: Option<Region>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(HostUpdate),
    NoOp(NoOpReason),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Controller {
    state: CursorState,
    options: AddOptions,
    /// The Active region sits where `add` committed a cursor. Moving it away
    /// leaves a Static region behind.
    committed: bool,
}

impl Controller {
    pub fn new(options: AddOptions) -> Self {
        Self {
            state: CursorState::Inactive,
            options,
            committed: false,
        }
    }

    /// Resume transition mode from tagged regions held by the host.
    ///
    /// Inconsistent input is repaired by [`CursorSet::from_tagged`].
    pub fn restore(options: AddOptions, tagged: impl IntoIterator<Item = (Region, Tag)>) -> Self {
        let set = CursorSet::from_tagged(tagged);
        let state = if set.is_empty() {
            CursorState::Inactive
        } else {
            CursorState::SingleActive(set)
        };
        Self {
            state,
            options,
            committed: false,
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn in_transition(&self) -> bool {
        !matches!(self.state, CursorState::Inactive)
    }

    pub fn is_all_active(&self) -> bool {
        matches!(self.state, CursorState::AllActive(_))
    }

    pub fn cursors(&self) -> Option<&CursorSet> {
        match &self.state {
            CursorState::Inactive => None,
            CursorState::SingleActive(set) | CursorState::AllActive(set) => Some(set),
        }
    }

    /// Number of managed regions.
    pub fn len(&self) -> usize {
        self.cursors().map_or(0, CursorSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a command given the host's current live regions.
    ///
    /// Every command except `add` first catches up with the live regions, so
    /// it acts on the cursor the user actually sees.
    pub fn apply(&mut self, command: CursorCommand, live: &[Region]) -> Outcome {
        if !matches!(command, CursorCommand::Add(_)) {
            self.sync_live(live);
        }

        let outcome = match command {
            CursorCommand::Add(options) => self.add(live, options.unwrap_or(self.options)),
            CursorCommand::Remove => self.remove(),
            CursorCommand::Select { forward } => self.select(forward, live),
            CursorCommand::Activate => self.activate(),
            CursorCommand::Exit => self.exit(live),
        };

        match &outcome {
            Outcome::Applied(_) => {
                tracing::debug!(command = command.name(), regions = self.len(), "cursor transition");
            }
            Outcome::NoOp(reason) => {
                tracing::debug!(command = command.name(), %reason, "cursor command ignored");
            }
        }

        outcome
    }

    /// Freeze the Active region and make the host's live region the new
    /// Active one.
    pub fn add(&mut self, live: &[Region], options: AddOptions) -> Outcome {
        if live.is_empty() {
            return Outcome::NoOp(NoOpReason::NoLiveRegion);
        }
        let alive_idx = options.resolve_index(live.len());
        let alive = live[alive_idx].collapse(options.keep_alive_position);
        let others = live
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != alive_idx)
            .map(|(_, region)| *region);

        let set = match std::mem::take(&mut self.state) {
            CursorState::Inactive | CursorState::AllActive(_) => {
                // Native mode (or native multi-cursor after activate): the
                // host's live regions are the truth.
                let mut set = CursorSet::uniform(others, Tag::Static);
                set.insert(alive, Tag::Active);
                set
            }
            CursorState::SingleActive(mut set) => {
                // An uncommitted Active already on `alive` just gets committed.
                // Otherwise it freezes at its last known position.
                let reuse = !self.committed && set.active() == Some(alive);
                if !reuse {
                    set.set_all(Tag::Static);
                }
                for region in others {
                    set.insert(region, Tag::Static);
                }
                if !reuse {
                    set.insert(alive, Tag::Active);
                }
                set
            }
        };

        let update = HostUpdate {
            live: vec![alive],
            statics: set.static_regions(),
            reveal: None,
        };
        self.state = CursorState::SingleActive(set);
        self.committed = true;
        Outcome::Applied(update)
    }

    /// Drop the Active region and activate its predecessor.
    pub fn remove(&mut self) -> Outcome {
        match std::mem::take(&mut self.state) {
            CursorState::Inactive => Outcome::NoOp(NoOpReason::NothingToRemove),
            CursorState::AllActive(set) => {
                self.state = CursorState::AllActive(set);
                Outcome::NoOp(NoOpReason::RemoveWhileAllActive)
            }
            CursorState::SingleActive(mut set) => {
                let Some((index, removed)) = set
                    .active_index()
                    .and_then(|index| set.remove(index).map(|cursor| (index, cursor)))
                else {
                    if !set.is_empty() {
                        self.state = CursorState::SingleActive(set);
                    }
                    return Outcome::NoOp(NoOpReason::NothingToRemove);
                };

                self.committed = false;
                if set.is_empty() {
                    return Outcome::Applied(HostUpdate {
                        live: vec![removed.region],
                        statics: Vec::new(),
                        reveal: Some(removed.region),
                    });
                }

                let next = index.saturating_sub(1);
                set.set_tag(next, Tag::Active);
                let update = Self::single_update(&set);
                self.state = CursorState::SingleActive(set);
                Outcome::Applied(update)
            }
        }
    }

    /// Move the Active designation to a neighbour, or collapse the all-active
    /// set onto its last (`forward`) or first region.
    pub fn select(&mut self, forward: bool, live: &[Region]) -> Outcome {
        match std::mem::take(&mut self.state) {
            CursorState::Inactive => Outcome::NoOp(NoOpReason::NotInTransition),
            CursorState::SingleActive(mut set) => {
                let Some(index) = set.active_index() else {
                    self.state = CursorState::SingleActive(set);
                    return Outcome::NoOp(NoOpReason::NotInTransition);
                };
                let target = if forward {
                    Some(index + 1).filter(|&t| t < set.len())
                } else {
                    index.checked_sub(1)
                };
                let Some(target) = target else {
                    self.state = CursorState::SingleActive(set);
                    return Outcome::NoOp(if forward {
                        NoOpReason::NoNext
                    } else {
                        NoOpReason::NoPrevious
                    });
                };

                set.set_tag(index, Tag::Static);
                set.set_tag(target, Tag::Active);
                let update = Self::single_update(&set);
                self.state = CursorState::SingleActive(set);
                self.committed = false;
                Outcome::Applied(update)
            }
            CursorState::AllActive(set) => {
                let mut set = if live.is_empty() {
                    set
                } else {
                    CursorSet::uniform(live.iter().copied(), Tag::Static)
                };
                set.set_all(Tag::Static);
                let target = if forward { set.len().saturating_sub(1) } else { 0 };
                set.set_tag(target, Tag::Active);
                let update = Self::single_update(&set);
                self.state = CursorState::SingleActive(set);
                self.committed = false;
                Outcome::Applied(update)
            }
        }
    }

    /// Make every managed region live at once.
    pub fn activate(&mut self) -> Outcome {
        match std::mem::take(&mut self.state) {
            CursorState::Inactive => Outcome::NoOp(NoOpReason::NotInTransition),
            CursorState::AllActive(set) => {
                self.state = CursorState::AllActive(set);
                Outcome::NoOp(NoOpReason::AlreadyActive)
            }
            CursorState::SingleActive(mut set) => {
                set.set_all(Tag::Active);
                let update = HostUpdate {
                    live: set.regions(),
                    statics: Vec::new(),
                    reveal: None,
                };
                self.state = CursorState::AllActive(set);
                self.committed = false;
                Outcome::Applied(update)
            }
        }
    }

    /// Discard every managed region and return to the host's native cursor.
    pub fn exit(&mut self, live: &[Region]) -> Outcome {
        let resume = match std::mem::take(&mut self.state) {
            CursorState::Inactive => return Outcome::NoOp(NoOpReason::NotInTransition),
            CursorState::SingleActive(set) => set.active().or_else(|| set.first()),
            CursorState::AllActive(set) => live.first().copied().or_else(|| set.first()),
        };
        self.committed = false;

        Outcome::Applied(HostUpdate {
            live: resume.into_iter().collect(),
            statics: Vec::new(),
            reveal: None,
        })
    }

    /// Follow the host's live regions after native movement or editing.
    ///
    /// In single-active mode the Active region tracks the keep-alive live
    /// region. If `add` committed the spot it is leaving, that spot stays
    /// behind as a Static region. The all-active set is replaced by the live
    /// regions.
    pub fn sync_live(&mut self, live: &[Region]) {
        if live.is_empty() {
            return;
        }
        match &mut self.state {
            CursorState::Inactive => {}
            CursorState::SingleActive(set) => {
                let target = live[self.options.resolve_index(live.len())];
                let Some(index) = set.active_index() else {
                    return;
                };
                if set.get(index).map(|cursor| cursor.region) == Some(target) {
                    return;
                }
                if self.committed {
                    set.set_tag(index, Tag::Static);
                } else {
                    set.remove(index);
                }
                set.insert(target, Tag::Active);
                self.committed = false;
            }
            CursorState::AllActive(set) => {
                *set = CursorSet::uniform(live.iter().copied(), Tag::Active);
            }
        }
    }

    /// Shift managed regions through a document edit.
    pub fn map_edit(&mut self, edit: &Edit) {
        match &mut self.state {
            CursorState::Inactive => {}
            CursorState::SingleActive(set) | CursorState::AllActive(set) => set.map_edit(edit),
        }
    }

    fn single_update(set: &CursorSet) -> HostUpdate {
        let active = set.active();
        HostUpdate {
            live: active.into_iter().collect(),
            statics: set.static_regions(),
            reveal: active,
        }
    }
}
