#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use mpxwm::{
    context::{ContextHandler, MasterId, MonitorId, WindowId, WorkspaceId},
    input::{DetailGrab, DeviceClass, GrabError, InputConfig, InputHandler, InputState},
    rules::{Registry, RulesHandler},
};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Wm {
    pub registry: Registry<Self>,
    pub input: InputState<Self>,
    pub active: Option<MasterId>,
    pub workspaces: HashMap<MasterId, WorkspaceId>,
    pub focus: HashMap<MasterId, WindowId>,
    pub grabbed: Vec<DetailGrab>,
    pub devices: Vec<(Option<MasterId>, DeviceClass)>,
}

impl Wm {
    pub fn new() -> Self {
        init_logging();
        let config = InputConfig::default();
        let mut wm = Wm {
            registry: Registry::new(),
            input: InputState::new(config.clone()),
            active: Some(MasterId(2)),
            workspaces: HashMap::new(),
            focus: HashMap::new(),
            grabbed: Vec::new(),
            devices: Vec::new(),
        };
        config.install(&mut wm.registry);
        wm
    }
}

impl ContextHandler for Wm {
    fn active_master(&self) -> Option<MasterId> {
        self.active
    }

    fn workspace_of(&self, master: MasterId) -> Option<WorkspaceId> {
        self.workspaces.get(&master).copied()
    }

    fn monitor_of(&self, workspace: WorkspaceId) -> Option<MonitorId> {
        Some(MonitorId(workspace.0 + 100))
    }

    fn focused_window(&self, master: MasterId) -> Option<WindowId> {
        self.focus.get(&master).copied()
    }
}

impl RulesHandler for Wm {
    fn registry(&mut self) -> &mut Registry<Self> {
        &mut self.registry
    }
}

impl InputHandler for Wm {
    fn input_state(&mut self) -> &mut InputState<Self> {
        &mut self.input
    }

    fn grab_detail(&mut self, _master: Option<MasterId>, grab: &DetailGrab) -> Result<(), GrabError> {
        self.grabbed.push(*grab);
        Ok(())
    }

    fn ungrab_detail(&mut self, _master: Option<MasterId>, grab: &DetailGrab) -> Result<(), GrabError> {
        self.grabbed.retain(|g| g != grab);
        Ok(())
    }

    fn grab_device(&mut self, master: Option<MasterId>, mask: DeviceClass) -> Result<(), GrabError> {
        self.devices.push((master, mask));
        Ok(())
    }

    fn ungrab_device(&mut self, master: Option<MasterId>, mask: DeviceClass) -> Result<(), GrabError> {
        self.devices.retain(|d| *d != (master, mask));
        Ok(())
    }
}
