use slotmap::SecondaryMap;

use super::command::{AddOptions, CursorCommand};
use super::controller::{Controller, CursorState, NoOpReason, Outcome};
use super::host::{Host, ViewId};
use crate::model::edit::Edit;

/// Context key answering whether a view is in cursor transition.
pub const IN_CURSOR_TRANSITION: &str = "in_cursor_transition";

/// Summary of a view's cursor transition, for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStatus {
    Native,
    Transition(usize),
    AllActive(usize),
}

impl TransitionStatus {
    pub fn label(&self) -> String {
        match self {
            TransitionStatus::Native => "NATIVE".to_string(),
            TransitionStatus::Transition(n) => format!("TRANSITION {n}"),
            TransitionStatus::AllActive(n) => format!("ALL {n}"),
        }
    }
}

/// Cursor controllers for every view, created on first `add` and released
/// once the view leaves transition mode.
#[derive(Debug, Default)]
pub struct CursorSessions {
    controllers: SecondaryMap<ViewId, Controller>,
    options: AddOptions,
}

impl CursorSessions {
    pub fn new(options: AddOptions) -> Self {
        Self {
            controllers: SecondaryMap::new(),
            options,
        }
    }

    /// Run a command against `view` and push the result to the host.
    pub fn execute<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        view: ViewId,
        command: CursorCommand,
    ) -> Outcome {
        let live = host.current_regions(view);

        let outcome = match self.controllers.remove(view) {
            Some(mut controller) => {
                let outcome = controller.apply(command, &live);
                if controller.in_transition() {
                    self.controllers.insert(view, controller);
                } else {
                    tracing::debug!(?view, "cursor transition ended");
                }
                outcome
            }
            None => match command {
                CursorCommand::Add(_) => {
                    let mut controller = Controller::new(self.options);
                    let outcome = controller.apply(command, &live);
                    if controller.in_transition() {
                        tracing::debug!(?view, "cursor transition started");
                        self.controllers.insert(view, controller);
                    }
                    outcome
                }
                CursorCommand::Remove => Outcome::NoOp(NoOpReason::NothingToRemove),
                _ => Outcome::NoOp(NoOpReason::NotInTransition),
            },
        };

        if let Outcome::Applied(update) = &outcome {
            host.set_regions(view, &update.live);
            host.set_static_regions(view, &update.statics);
            if let Some(region) = update.reveal {
                host.reveal(view, region);
            }
        }

        outcome
    }

    /// The host moved its live cursors in `view`. The Active region follows
    /// them, and any spot it leaves behind is pushed back as a static region.
    pub fn selection_changed<H: Host + ?Sized>(&mut self, host: &mut H, view: ViewId) {
        let Some(controller) = self.controllers.get_mut(view) else {
            return;
        };
        controller.sync_live(&host.current_regions(view));
        if let Some(set) = controller.cursors() {
            host.set_static_regions(view, &set.static_regions());
        }
    }

    /// The host edited the document shown in `view`; edits are in
    /// application order.
    pub fn document_edited<H: Host + ?Sized>(&mut self, host: &mut H, view: ViewId, edits: &[Edit]) {
        let Some(controller) = self.controllers.get_mut(view) else {
            return;
        };
        for edit in edits {
            controller.map_edit(edit);
        }
        controller.sync_live(&host.current_regions(view));
        if let Some(set) = controller.cursors() {
            host.set_static_regions(view, &set.static_regions());
        }
    }

    pub fn in_transition(&self, view: ViewId) -> bool {
        self.controllers
            .get(view)
            .is_some_and(Controller::in_transition)
    }

    /// Answer a host context query; `None` for keys this crate does not own.
    pub fn query_context(&self, view: ViewId, key: &str) -> Option<bool> {
        (key == IN_CURSOR_TRANSITION).then(|| self.in_transition(view))
    }

    pub fn status(&self, view: ViewId) -> TransitionStatus {
        match self.controllers.get(view).map(Controller::state) {
            None | Some(CursorState::Inactive) => TransitionStatus::Native,
            Some(CursorState::SingleActive(set)) => TransitionStatus::Transition(set.len()),
            Some(CursorState::AllActive(set)) => TransitionStatus::AllActive(set.len()),
        }
    }

    pub fn controller(&self, view: ViewId) -> Option<&Controller> {
        self.controllers.get(view)
    }

    /// Forget a closed view.
    pub fn close_view(&mut self, view: ViewId) {
        self.controllers.remove(view);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use slotmap::SlotMap;

    use super::*;
    use crate::model::region::Region;

    #[derive(Default)]
    struct FakeView {
        live: Vec<Region>,
        statics: Vec<Region>,
        revealed: Option<Region>,
    }

    #[derive(Default)]
    struct FakeHost {
        views: HashMap<ViewId, FakeView>,
    }

    impl Host for FakeHost {
        fn current_regions(&self, view: ViewId) -> Vec<Region> {
            self.views
                .get(&view)
                .map(|v| v.live.clone())
                .unwrap_or_default()
        }

        fn set_regions(&mut self, view: ViewId, regions: &[Region]) {
            self.views.entry(view).or_default().live = regions.to_vec();
        }

        fn set_static_regions(&mut self, view: ViewId, regions: &[Region]) {
            self.views.entry(view).or_default().statics = regions.to_vec();
        }

        fn reveal(&mut self, view: ViewId, region: Region) {
            self.views.entry(view).or_default().revealed = Some(region);
        }
    }

    fn setup(count: usize) -> (FakeHost, Vec<ViewId>) {
        let mut keys: SlotMap<ViewId, ()> = SlotMap::with_key();
        let views: Vec<ViewId> = (0..count).map(|_| keys.insert(())).collect();
        let mut host = FakeHost::default();
        for &view in &views {
            host.set_regions(view, &[Region::caret(0)]);
        }
        (host, views)
    }

    fn move_to(host: &mut FakeHost, sessions: &mut CursorSessions, view: ViewId, pos: usize) {
        host.set_regions(view, &[Region::caret(pos)]);
        sessions.selection_changed(host, view);
    }

    #[test]
    fn add_creates_session_lazily() {
        let (mut host, views) = setup(1);
        let mut sessions = CursorSessions::default();
        assert!(!sessions.in_transition(views[0]));

        let outcome = sessions.execute(&mut host, views[0], CursorCommand::Add(None));
        assert!(outcome.is_applied());
        assert!(sessions.in_transition(views[0]));
        assert_eq!(sessions.status(views[0]), TransitionStatus::Transition(1));
    }

    #[test]
    fn commands_without_session_are_noops() {
        let (mut host, views) = setup(1);
        let mut sessions = CursorSessions::default();

        assert_eq!(
            sessions.execute(&mut host, views[0], CursorCommand::Remove),
            Outcome::NoOp(NoOpReason::NothingToRemove)
        );
        assert_eq!(
            sessions.execute(&mut host, views[0], CursorCommand::Exit),
            Outcome::NoOp(NoOpReason::NotInTransition)
        );
        assert!(sessions.controller(views[0]).is_none());
    }

    #[test]
    fn host_receives_static_and_live_regions() {
        let (mut host, views) = setup(1);
        let view = views[0];
        let mut sessions = CursorSessions::default();

        move_to(&mut host, &mut sessions, view, 4);
        sessions.execute(&mut host, view, CursorCommand::Add(None));
        move_to(&mut host, &mut sessions, view, 12);
        sessions.execute(&mut host, view, CursorCommand::Add(None));
        move_to(&mut host, &mut sessions, view, 20);

        let state = &host.views[&view];
        assert_eq!(state.live, vec![Region::caret(20)]);
        assert_eq!(state.statics, vec![Region::caret(4), Region::caret(12)]);

        sessions.execute(&mut host, view, CursorCommand::Select { forward: false });
        let state = &host.views[&view];
        assert_eq!(state.live, vec![Region::caret(12)]);
        assert_eq!(state.statics, vec![Region::caret(4), Region::caret(20)]);
        assert_eq!(state.revealed, Some(Region::caret(12)));
    }

    #[test]
    fn commands_catch_up_with_unreported_moves() {
        let (mut host, views) = setup(1);
        let view = views[0];
        let mut sessions = CursorSessions::default();

        move_to(&mut host, &mut sessions, view, 4);
        sessions.execute(&mut host, view, CursorCommand::Add(None));
        // The host moved without calling `selection_changed`.
        host.set_regions(view, &[Region::caret(12)]);
        sessions.execute(&mut host, view, CursorCommand::Activate);

        assert_eq!(
            host.views[&view].live,
            vec![Region::caret(4), Region::caret(12)]
        );
    }

    #[test]
    fn activate_then_exit_releases_session() {
        let (mut host, views) = setup(1);
        let view = views[0];
        let mut sessions = CursorSessions::default();

        sessions.execute(&mut host, view, CursorCommand::Add(None));
        move_to(&mut host, &mut sessions, view, 9);
        sessions.execute(&mut host, view, CursorCommand::Add(None));
        sessions.execute(&mut host, view, CursorCommand::Activate);

        assert_eq!(sessions.status(view), TransitionStatus::AllActive(2));
        assert_eq!(host.views[&view].live, vec![Region::caret(0), Region::caret(9)]);
        assert!(host.views[&view].statics.is_empty());

        sessions.execute(&mut host, view, CursorCommand::Exit);
        assert!(!sessions.in_transition(view));
        assert!(sessions.controller(view).is_none());
        assert_eq!(host.views[&view].live, vec![Region::caret(0)]);
    }

    #[test]
    fn remove_to_empty_releases_session() {
        let (mut host, views) = setup(1);
        let view = views[0];
        let mut sessions = CursorSessions::default();

        move_to(&mut host, &mut sessions, view, 3);
        sessions.execute(&mut host, view, CursorCommand::Add(None));
        sessions.execute(&mut host, view, CursorCommand::Remove);

        assert!(sessions.controller(view).is_none());
        assert_eq!(sessions.status(view), TransitionStatus::Native);
        assert_eq!(host.views[&view].live, vec![Region::caret(3)]);
    }

    #[test]
    fn views_do_not_share_state() {
        let (mut host, views) = setup(2);
        let mut sessions = CursorSessions::default();

        sessions.execute(&mut host, views[0], CursorCommand::Add(None));
        assert!(sessions.in_transition(views[0]));
        assert!(!sessions.in_transition(views[1]));

        sessions.close_view(views[0]);
        assert!(!sessions.in_transition(views[0]));
    }

    #[test]
    fn edits_shift_static_regions() {
        let (mut host, views) = setup(1);
        let view = views[0];
        let mut sessions = CursorSessions::default();

        move_to(&mut host, &mut sessions, view, 10);
        sessions.execute(&mut host, view, CursorCommand::Add(None));
        move_to(&mut host, &mut sessions, view, 2);
        sessions.execute(&mut host, view, CursorCommand::Add(None));

        // Host typed three characters at 2.
        host.set_regions(view, &[Region::caret(5)]);
        sessions.document_edited(&mut host, view, &[Edit::insert(2, 3)]);

        assert_eq!(host.views[&view].statics, vec![Region::caret(13)]);
    }

    #[test]
    fn answers_transition_context() {
        let (mut host, views) = setup(1);
        let mut sessions = CursorSessions::default();

        assert_eq!(
            sessions.query_context(views[0], IN_CURSOR_TRANSITION),
            Some(false)
        );
        sessions.execute(&mut host, views[0], CursorCommand::Add(None));
        assert_eq!(
            sessions.query_context(views[0], IN_CURSOR_TRANSITION),
            Some(true)
        );
        assert_eq!(sessions.query_context(views[0], "selection_empty"), None);
    }
}
