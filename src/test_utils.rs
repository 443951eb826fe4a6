//! In-memory window manager state for unit tests

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::{
    context::{ContextHandler, MasterId, Mode, MonitorId, WindowId, WorkspaceId},
    input::{DetailGrab, DeviceClass, GrabError, InputConfig, InputHandler, InputState},
    rules::{Registry, RulesHandler},
};

/// Shared log of handler invocations
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<&'static str>>>);

impl Recorder {
    pub(crate) fn push(&self, name: &'static str) {
        self.0.lock().unwrap().push(name);
    }

    pub(crate) fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

pub(crate) struct TestState {
    pub(crate) registry: Registry<Self>,
    pub(crate) input: InputState<Self>,
    pub(crate) recorder: Recorder,
    masters: Vec<MasterId>,
    active: Option<MasterId>,
    workspaces: HashMap<MasterId, WorkspaceId>,
    monitors: HashMap<WorkspaceId, MonitorId>,
    focus: HashMap<MasterId, WindowId>,
    modes: HashMap<MasterId, Mode>,
    detail_grabs: Vec<(Option<MasterId>, DetailGrab)>,
    device_grabs: Vec<(Option<MasterId>, DeviceClass)>,
    refused_details: HashSet<u32>,
    refuse_devices: bool,
    ungrab_calls: usize,
}

impl TestState {
    pub(crate) fn new() -> Self {
        TestState {
            registry: Registry::new(),
            input: InputState::new(InputConfig::default()),
            recorder: Recorder::default(),
            masters: Vec::new(),
            active: None,
            workspaces: HashMap::new(),
            monitors: HashMap::new(),
            focus: HashMap::new(),
            modes: HashMap::new(),
            detail_grabs: Vec::new(),
            device_grabs: Vec::new(),
            refused_details: HashSet::new(),
            refuse_devices: false,
            ungrab_calls: 0,
        }
    }

    /// Add a master; the first one becomes the active master
    pub(crate) fn add_master(&mut self) -> MasterId {
        let id = MasterId(self.masters.len() as u32 + 1);
        self.masters.push(id);
        self.active.get_or_insert(id);
        id
    }

    pub(crate) fn set_workspace(&mut self, master: MasterId, workspace: Option<WorkspaceId>) {
        match workspace {
            Some(workspace) => self.workspaces.insert(master, workspace),
            None => self.workspaces.remove(&master),
        };
    }

    pub(crate) fn set_monitor(&mut self, workspace: WorkspaceId, monitor: Option<MonitorId>) {
        match monitor {
            Some(monitor) => self.monitors.insert(workspace, monitor),
            None => self.monitors.remove(&workspace),
        };
    }

    pub(crate) fn set_focus(&mut self, master: MasterId, window: Option<WindowId>) {
        match window {
            Some(window) => self.focus.insert(master, window),
            None => self.focus.remove(&master),
        };
    }

    pub(crate) fn set_mode(&mut self, master: MasterId, mode: Mode) {
        self.modes.insert(master, mode);
    }

    /// Make grabs of `detail` fail
    pub(crate) fn refuse_detail(&mut self, detail: u32) {
        self.refused_details.insert(detail);
    }

    /// Make every device grab fail
    pub(crate) fn refuse_devices(&mut self) {
        self.refuse_devices = true;
    }

    /// Currently held detail grabs, in grab order
    pub(crate) fn detail_grabs(&self) -> Vec<u32> {
        self.detail_grabs.iter().map(|(_, grab)| grab.detail).collect()
    }

    /// Currently held device grabs, in grab order
    pub(crate) fn device_grabs(&self) -> Vec<(Option<MasterId>, DeviceClass)> {
        self.device_grabs.clone()
    }

    pub(crate) fn ungrab_calls(&self) -> usize {
        self.ungrab_calls
    }
}

impl ContextHandler for TestState {
    fn active_master(&self) -> Option<MasterId> {
        self.active
    }

    fn workspace_of(&self, master: MasterId) -> Option<WorkspaceId> {
        self.workspaces.get(&master).copied()
    }

    fn monitor_of(&self, workspace: WorkspaceId) -> Option<MonitorId> {
        self.monitors.get(&workspace).copied()
    }

    fn focused_window(&self, master: MasterId) -> Option<WindowId> {
        self.focus.get(&master).copied()
    }

    fn binding_mode(&self, master: MasterId) -> Mode {
        self.modes.get(&master).copied().unwrap_or_default()
    }
}

impl RulesHandler for TestState {
    fn registry(&mut self) -> &mut Registry<Self> {
        &mut self.registry
    }
}

impl InputHandler for TestState {
    fn input_state(&mut self) -> &mut InputState<Self> {
        &mut self.input
    }

    fn grab_detail(&mut self, master: Option<MasterId>, grab: &DetailGrab) -> Result<(), GrabError> {
        if self.refused_details.contains(&grab.detail) {
            return Err(GrabError::AlreadyGrabbed);
        }
        self.detail_grabs.push((master, *grab));
        Ok(())
    }

    fn ungrab_detail(&mut self, master: Option<MasterId>, grab: &DetailGrab) -> Result<(), GrabError> {
        self.ungrab_calls += 1;
        if let Some(index) = self
            .detail_grabs
            .iter()
            .position(|(m, g)| *m == master && g == grab)
        {
            self.detail_grabs.remove(index);
        }
        Ok(())
    }

    fn grab_device(&mut self, master: Option<MasterId>, mask: DeviceClass) -> Result<(), GrabError> {
        if self.refuse_devices {
            return Err(GrabError::NoDevice(mask));
        }
        self.device_grabs.push((master, mask));
        Ok(())
    }

    fn ungrab_device(&mut self, master: Option<MasterId>, mask: DeviceClass) -> Result<(), GrabError> {
        self.ungrab_calls += 1;
        self.device_grabs.retain(|grab| *grab != (master, mask));
        Ok(())
    }
}
