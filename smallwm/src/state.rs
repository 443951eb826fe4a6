use std::collections::HashMap;

use calloop::LoopSignal;
use mpxwm::{
    context::{ContextHandler, MasterId, Mode, MonitorId, WindowId, WorkspaceId},
    input::{add_binding, DetailGrab, DeviceClass, GrabError, InputConfig, InputHandler, InputState},
    rules::{AddFlag, EventKind, Handler, Registry, RulesHandler},
};
use tracing::{debug, info};

pub struct Smallwm {
    pub loop_signal: LoopSignal,

    // mpxwm state
    pub registry: Registry<Smallwm>,
    pub input: InputState<Smallwm>,

    pub masters: Vec<MasterId>,
    pub active_master: Option<MasterId>,
    pub modes: HashMap<MasterId, Mode>,
    pub focus: HashMap<MasterId, WindowId>,
    pub workspaces: HashMap<MasterId, WorkspaceId>,
    pub windows: Vec<(WindowId, WorkspaceId)>,

    pub moves: u64,
    pub retiles: u64,
}

impl Smallwm {
    pub fn new(loop_signal: LoopSignal, masters: u32) -> Self {
        // master ids follow the X input convention of even pointer ids
        let masters: Vec<MasterId> = (1..=masters.max(1)).map(|i| MasterId(i * 2)).collect();
        let workspaces = masters
            .iter()
            .enumerate()
            .map(|(i, master)| (*master, WorkspaceId(i as u32)))
            .collect();
        let windows = (1..=4).map(|i| (WindowId(0x40_0000 + i), WorkspaceId(0))).collect();

        Smallwm {
            loop_signal,
            registry: Registry::new(),
            input: InputState::new(InputConfig::default()),
            active_master: masters.first().copied(),
            masters,
            modes: HashMap::new(),
            focus: HashMap::new(),
            workspaces,
            windows,
            moves: 0,
            retiles: 0,
        }
    }

    pub fn active_master_id(&self) -> MasterId {
        self.active_master.unwrap_or(MasterId(2))
    }

    /// Register the window manager rules and bindings
    pub fn install(&mut self, config: InputConfig) {
        self.input = InputState::new(config.clone());
        config.install(&mut self.registry);
        for binding in crate::input::bindings() {
            add_binding(self, binding, AddFlag::AppendUnique);
        }

        self.registry.add(
            EventKind::WindowMove,
            Handler::niladic("count_moves", |state: &mut Smallwm| state.moves += 1),
            AddFlag::Append,
        );
        self.registry.add_batch(
            EventKind::WindowMove,
            Handler::on_workspace("retile", |state: &mut Smallwm, workspace| state.retile(workspace)),
            AddFlag::Append,
        );
        self.registry.add_batch(
            EventKind::UnregisterWindow,
            Handler::on_workspace("retile", |state: &mut Smallwm, workspace| state.retile(workspace)),
            AddFlag::Append,
        );
        self.registry.add(
            EventKind::Periodic,
            Handler::niladic("heartbeat", |state: &mut Smallwm| {
                debug!(windows = state.windows.len(), "tick");
            }),
            AddFlag::Append,
        );
    }

    pub fn retile(&mut self, workspace: WorkspaceId) {
        let count = self.windows.iter().filter(|(_, ws)| *ws == workspace).count();
        self.retiles += 1;
        info!(workspace = %workspace, windows = count, "retiling");
    }

    pub fn focus_next(&mut self, master: MasterId) {
        let workspace = self.workspace_of(master);
        let on_workspace: Vec<WindowId> = self
            .windows
            .iter()
            .filter(|(_, ws)| Some(*ws) == workspace)
            .map(|(w, _)| *w)
            .collect();
        if on_workspace.is_empty() {
            self.focus.remove(&master);
            return;
        }
        let next = match self.focus.get(&master) {
            Some(current) => on_workspace
                .iter()
                .position(|w| w == current)
                .map_or(0, |i| (i + 1) % on_workspace.len()),
            None => 0,
        };
        info!(master = %master, window = %on_workspace[next], "focusing");
        self.focus.insert(master, on_workspace[next]);
    }

    pub fn close(&mut self, window: WindowId) {
        self.windows.retain(|(w, _)| *w != window);
        self.focus.retain(|_, w| *w != window);
        info!(window = %window, "closed");
    }

    pub fn set_mode(&mut self, master: MasterId, mode: Mode) {
        info!(master = %master, mode = mode.0, "switching binding mode");
        self.modes.insert(master, mode);
    }
}

impl ContextHandler for Smallwm {
    fn active_master(&self) -> Option<MasterId> {
        self.active_master
    }

    fn workspace_of(&self, master: MasterId) -> Option<WorkspaceId> {
        self.workspaces.get(&master).copied()
    }

    fn monitor_of(&self, workspace: WorkspaceId) -> Option<MonitorId> {
        // one monitor per workspace in this toy setup
        Some(MonitorId(workspace.0))
    }

    fn focused_window(&self, master: MasterId) -> Option<WindowId> {
        self.focus.get(&master).copied()
    }

    fn binding_mode(&self, master: MasterId) -> Mode {
        self.modes.get(&master).copied().unwrap_or_default()
    }
}

impl RulesHandler for Smallwm {
    fn registry(&mut self) -> &mut Registry<Self> {
        &mut self.registry
    }
}

impl InputHandler for Smallwm {
    fn input_state(&mut self) -> &mut InputState<Self> {
        &mut self.input
    }

    fn grab_detail(&mut self, master: Option<MasterId>, grab: &DetailGrab) -> Result<(), GrabError> {
        let combinations = grab.modifier_combinations().count();
        debug!(?master, detail = grab.detail, ?grab.modifiers, combinations, "grab detail");
        Ok(())
    }

    fn ungrab_detail(&mut self, master: Option<MasterId>, grab: &DetailGrab) -> Result<(), GrabError> {
        debug!(?master, detail = grab.detail, "ungrab detail");
        Ok(())
    }

    fn grab_device(&mut self, master: Option<MasterId>, mask: DeviceClass) -> Result<(), GrabError> {
        debug!(?master, ?mask, "grab device");
        Ok(())
    }

    fn ungrab_device(&mut self, master: Option<MasterId>, mask: DeviceClass) -> Result<(), GrabError> {
        debug!(?master, ?mask, "ungrab device");
        Ok(())
    }
}
