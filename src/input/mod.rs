//! Input binding matcher and chain state machine
//!
//! The event loop turns every key, button or motion occurrence into a
//! [`UserEvent`] and hands it to [`process_device_event`]. That stores the
//! event as the last one seen and dispatches [`EventKind::DeviceEvent`]; one
//! of the rules on that kind (installed by [`InputConfig::install`]) runs
//! [`check_all_bindings`], which offers the event first to every active
//! [`Chain`] and then to the flat binding list.
//!
//! ## Usage
//!
//! Your state implements [`InputHandler`] on top of
//! [`RulesHandler`](crate::rules::RulesHandler). The grab methods have no-op
//! defaults; a real window manager forwards them to the display server.
//!
//! ```
//! use mpxwm::context::{ContextHandler, MasterId, MonitorId, WindowId, WorkspaceId};
//! use mpxwm::input::{
//!     add_binding, process_device_event, Binding, DeviceClass, InputConfig, InputHandler, InputState,
//!     Modifiers, UserEvent,
//! };
//! use mpxwm::rules::{AddFlag, Handler, Registry, RulesHandler};
//!
//! struct State {
//!     registry: Registry<Self>,
//!     input: InputState<Self>,
//!     spawned: u32,
//! }
//!
//! impl ContextHandler for State {
//!     fn active_master(&self) -> Option<MasterId> { Some(MasterId(2)) }
//!     fn workspace_of(&self, _: MasterId) -> Option<WorkspaceId> { None }
//!     fn monitor_of(&self, _: WorkspaceId) -> Option<MonitorId> { None }
//!     fn focused_window(&self, _: MasterId) -> Option<WindowId> { None }
//! }
//! impl RulesHandler for State {
//!     fn registry(&mut self) -> &mut Registry<Self> { &mut self.registry }
//! }
//! impl InputHandler for State {
//!     fn input_state(&mut self) -> &mut InputState<Self> { &mut self.input }
//! }
//!
//! let config = InputConfig::default();
//! let mut state = State { registry: Registry::new(), input: InputState::new(config.clone()), spawned: 0 };
//! config.install(&mut state.registry);
//!
//! add_binding(
//!     &mut state,
//!     Binding::new(
//!         Modifiers::MOD4,
//!         36,
//!         Handler::niladic("spawn_terminal", |state: &mut State| state.spawned += 1),
//!     ),
//!     AddFlag::AppendUnique,
//! );
//!
//! let event = UserEvent::new(Modifiers::MOD4, 36, DeviceClass::KEY_PRESS).with_master(MasterId(2));
//! process_device_event(&mut state, event);
//! assert_eq!(state.spawned, 1);
//! ```

use std::{collections::HashMap, fmt, str::FromStr, sync::Weak};

use bitflags::bitflags;
use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

use crate::{
    context::{Context, MasterId, WindowId},
    rules::{apply_event_rules, AddFlag, AddResult, EventKind, OrderedList, RulesHandler},
};

pub mod binding;
pub mod chain;
pub mod config;
pub mod grab;

pub use self::binding::{Binding, BindingFlags, KeyBinding, WindowTarget};
pub use self::chain::{Chain, ChainFlags, ChainHooks, ChainId};
pub use self::config::InputConfig;
pub use self::grab::{DetailGrab, GrabError};

bitflags! {
    /// Modifier state of a key or button event
    ///
    /// The values mirror the X11 core modifier masks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u16 {
        /// Shift
        const SHIFT = 1 << 0;
        /// Caps lock
        const LOCK = 1 << 1;
        /// Control
        const CONTROL = 1 << 2;
        /// Usually Alt
        const MOD1 = 1 << 3;
        /// Usually Num lock
        const MOD2 = 1 << 4;
        /// Usually unused
        const MOD3 = 1 << 5;
        /// Usually Super
        const MOD4 = 1 << 6;
        /// Usually ISO level 3 shift
        const MOD5 = 1 << 7;
        /// Wildcard; a binding declared with it matches every modifier state
        const ANY = 1 << 15;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers::empty()
    }
}

/// Error returned when parsing a [`Modifiers`] set from a string fails
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unknown modifier name `{0}`")]
pub struct ParseModifiersError(String);

impl FromStr for Modifiers {
    type Err = ParseModifiersError;

    /// Parse a `|` separated list of modifier names, such as `"Mod4|Shift"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mods = Modifiers::empty();
        for name in s.split('|').map(str::trim).filter(|name| !name.is_empty()) {
            mods |= match name.to_ascii_lowercase().as_str() {
                "shift" => Modifiers::SHIFT,
                "lock" | "capslock" => Modifiers::LOCK,
                "control" | "ctrl" => Modifiers::CONTROL,
                "mod1" | "alt" => Modifiers::MOD1,
                "mod2" | "numlock" => Modifiers::MOD2,
                "mod3" => Modifiers::MOD3,
                "mod4" | "super" => Modifiers::MOD4,
                "mod5" => Modifiers::MOD5,
                "any" => Modifiers::ANY,
                _ => return Err(ParseModifiersError(name.to_owned())),
            };
        }
        Ok(mods)
    }
}

bitflags! {
    /// Kind of input stream an event came from, or a binding listens to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceClass: u8 {
        /// Key press
        const KEY_PRESS = 1 << 0;
        /// Key release
        const KEY_RELEASE = 1 << 1;
        /// Button press
        const BUTTON_PRESS = 1 << 2;
        /// Button release
        const BUTTON_RELEASE = 1 << 3;
        /// Pointer motion
        const MOTION = 1 << 4;
    }
}

impl Default for DeviceClass {
    fn default() -> Self {
        DeviceClass::empty()
    }
}

impl DeviceClass {
    /// Every keyboard class
    pub const KEYBOARD: DeviceClass = DeviceClass::KEY_PRESS.union(DeviceClass::KEY_RELEASE);
    /// Every pointer class
    pub const POINTER: DeviceClass = DeviceClass::BUTTON_PRESS
        .union(DeviceClass::BUTTON_RELEASE)
        .union(DeviceClass::MOTION);

    /// The keyboard part of this mask
    pub fn keyboard(self) -> DeviceClass {
        self & DeviceClass::KEYBOARD
    }

    /// The pointer part of this mask
    pub fn pointer(self) -> DeviceClass {
        self & DeviceClass::POINTER
    }
}

/// One input occurrence, resolved against the window manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserEvent {
    /// Modifier state at the time of the event
    pub modifiers: Modifiers,
    /// Keycode or button; `0` when not applicable
    pub detail: u32,
    /// The stream the event came from; empty matches every binding mask
    pub mask: DeviceClass,
    /// Whether this is an auto-repeated key press
    pub repeat: bool,
    /// The window the event occurred on
    pub window: Option<WindowId>,
    /// The master whose device produced the event
    pub master: Option<MasterId>,
}

impl UserEvent {
    /// A non-repeated event without window or master
    pub fn new(modifiers: Modifiers, detail: u32, mask: DeviceClass) -> Self {
        UserEvent {
            modifiers,
            detail,
            mask,
            ..Default::default()
        }
    }

    /// Set the window the event occurred on
    pub fn with_window(mut self, window: WindowId) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the master that produced the event
    pub fn with_master(mut self, master: MasterId) -> Self {
        self.master = Some(master);
        self
    }

    /// Mark the event as auto-repeated
    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

impl fmt::Display for UserEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ mods: {:?} detail: {} mask: {:?} repeat: {}",
            self.modifiers, self.detail, self.mask, self.repeat
        )?;
        if let Some(master) = self.master {
            write!(f, " master: {}", master)?;
        }
        if let Some(window) = self.window {
            write!(f, " window: {}", window)?;
        }
        f.write_str(" }")
    }
}

pub(crate) type ChainStack<D> = Vec<Weak<chain::Chain<D>>>;

/// Bindings, active chains and per-master input state
pub struct InputState<D> {
    config: InputConfig,
    bindings: OrderedList<Binding<D>>,
    pub(crate) chains: IndexMap<MasterId, ChainStack<D>>,
    pub(crate) global_chains: ChainStack<D>,
    targets: HashMap<MasterId, WindowId>,
    last_event: Option<UserEvent>,
}

impl<D> fmt::Debug for InputState<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputState")
            .field("config", &self.config)
            .field("bindings", &self.bindings)
            .field("chains", &self.chains.keys().collect::<Vec<_>>())
            .field("global_chains", &self.global_chains.len())
            .field("targets", &self.targets)
            .field("last_event", &self.last_event)
            .finish()
    }
}

impl<D> InputState<D> {
    /// Create an empty input state
    pub fn new(config: InputConfig) -> Self {
        InputState {
            config,
            bindings: OrderedList::new(),
            chains: IndexMap::new(),
            global_chains: Vec::new(),
            targets: HashMap::new(),
            last_event: None,
        }
    }

    /// The configuration this state was created with
    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// The flat binding list
    pub fn bindings(&self) -> &OrderedList<Binding<D>> {
        &self.bindings
    }

    // Removal has to go through `remove_binding`, which ends the chain a
    // binding may have opened.
    pub(crate) fn add_binding(&mut self, binding: Binding<D>, flag: AddFlag) -> AddResult {
        trace!(binding = binding.name(), ?flag, "adding binding");
        self.bindings.add(binding, flag)
    }

    /// Window bindings triggered by `master` act on, overriding their declared target
    pub fn target(&self, master: MasterId) -> Option<WindowId> {
        self.targets.get(&master).copied()
    }

    /// Set or clear the target override of `master`
    pub fn set_target(&mut self, master: MasterId, window: Option<WindowId>) {
        match window {
            Some(window) => {
                self.targets.insert(master, window);
            }
            None => {
                self.targets.remove(&master);
            }
        }
    }

    /// The most recent event passed to [`process_device_event`]
    pub fn last_event(&self) -> Option<UserEvent> {
        self.last_event
    }

    /// Replace the last event
    pub fn set_last_event(&mut self, event: UserEvent) {
        self.last_event = Some(event);
    }

    /// Masters that currently have at least one active chain
    pub fn masters_with_chains(&self) -> impl Iterator<Item = MasterId> + '_ {
        self.chains.keys().copied()
    }
}

/// Implemented by the window manager state that owns the [`InputState`]
///
/// The grab methods talk to the display server. Their default
/// implementations do nothing and succeed.
pub trait InputHandler: RulesHandler {
    /// [`InputState`] getter
    fn input_state(&mut self) -> &mut InputState<Self>;

    /// Passively grab one modifier+detail combination
    fn grab_detail(&mut self, master: Option<MasterId>, grab: &DetailGrab) -> Result<(), GrabError> {
        let _ = (master, grab);
        Ok(())
    }

    /// Release a grab taken by [`InputHandler::grab_detail`]
    fn ungrab_detail(&mut self, master: Option<MasterId>, grab: &DetailGrab) -> Result<(), GrabError> {
        let _ = (master, grab);
        Ok(())
    }

    /// Actively grab every event of the given classes from the master's devices
    fn grab_device(&mut self, master: Option<MasterId>, mask: DeviceClass) -> Result<(), GrabError> {
        let _ = (master, mask);
        Ok(())
    }

    /// Release a grab taken by [`InputHandler::grab_device`]
    fn ungrab_device(&mut self, master: Option<MasterId>, mask: DeviceClass) -> Result<(), GrabError> {
        let _ = (master, mask);
        Ok(())
    }
}

/// Add (or remove, or toggle) a binding on the flat list
///
/// A binding leaving the list through [`AddFlag::Remove`] or a toggle is
/// removed with [`remove_binding`].
pub fn add_binding<D: InputHandler>(data: &mut D, binding: Binding<D>, flag: AddFlag) -> AddResult {
    let removes = matches!(flag, AddFlag::Remove | AddFlag::Toggle | AddFlag::PrependToggle);
    if removes && data.input_state().bindings().contains(&binding) {
        remove_binding(data, binding.name());
        return AddResult::Removed;
    }
    data.input_state().add_binding(binding, flag)
}

/// Remove the binding named `name` from the flat list
///
/// If the binding opens a chain, that chain is ended on every stack it is
/// open on before the binding is returned, so its grabs are released and
/// its end hook runs.
pub fn remove_binding<D: InputHandler>(data: &mut D, name: &str) -> Option<Binding<D>> {
    let binding = data.input_state().bindings.remove_by(|b| b.name() == name)?;
    trace!(binding = name, "removed binding");
    if let Some(opened) = binding.chain() {
        let ended = chain::end_everywhere(opened, data);
        if ended > 0 {
            debug!(binding = name, ended, "ended chain of removed binding");
        }
    }
    Some(binding)
}

/// Entry point for input: remember `event` and dispatch [`EventKind::DeviceEvent`]
///
/// Returns the result of the dispatch.
#[profiling::function]
pub fn process_device_event<D: InputHandler>(data: &mut D, event: UserEvent) -> bool {
    data.input_state().set_last_event(event);
    let context = Context {
        window: event.window,
        master: event.master,
    };
    apply_event_rules(data, EventKind::DeviceEvent, context)
}

/// Offer `event` to every binding of the flat list, in order
///
/// Returns `false` if a triggered binding halted propagation.
#[instrument(level = "debug", skip_all, fields(event = %event))]
pub fn check_flat_bindings<D: InputHandler>(data: &mut D, event: &UserEvent) -> bool {
    let bindings = data.input_state().bindings().snapshot();
    binding::check_bindings(data, event, &bindings)
}

/// Offer `event` to the active chains, then to the flat bindings
///
/// The flat list is skipped if an active chain halted propagation.
pub fn check_all_bindings<D: InputHandler>(data: &mut D, event: &UserEvent) -> bool {
    if !chain::check_all_chain_bindings(data, event) {
        debug!("chain stopped propagation, flat bindings skipped");
        return false;
    }
    check_flat_bindings(data, event)
}

/// Grab every binding of the flat list
///
/// Returns the number of bindings whose grab failed. Failures are logged and
/// never retried.
pub fn grab_flat_bindings<D: InputHandler>(data: &mut D) -> usize {
    let bindings = data.input_state().bindings().snapshot();
    bindings
        .iter()
        .filter(|binding| binding.grab(data, None).is_err())
        .count()
}

/// Release the grabs of every binding of the flat list
///
/// Returns the number of bindings whose ungrab failed.
pub fn ungrab_flat_bindings<D: InputHandler>(data: &mut D) -> usize {
    let bindings = data.input_state().bindings().snapshot();
    bindings
        .iter()
        .filter(|binding| binding.ungrab(data, None).is_err())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Handler;
    use crate::test_utils::TestState;

    #[test]
    fn parse_modifiers() {
        assert_eq!(
            "Mod4|Shift".parse::<Modifiers>(),
            Ok(Modifiers::MOD4 | Modifiers::SHIFT)
        );
        assert_eq!(" ctrl | alt ".parse::<Modifiers>(), Ok(Modifiers::CONTROL | Modifiers::MOD1));
        assert_eq!("".parse::<Modifiers>(), Ok(Modifiers::empty()));
        assert_eq!(
            "Mod4|Hyper".parse::<Modifiers>(),
            Err(ParseModifiersError("Hyper".into()))
        );
    }

    #[test]
    fn device_class_parts() {
        let mask = DeviceClass::KEY_PRESS | DeviceClass::BUTTON_RELEASE;
        assert_eq!(mask.keyboard(), DeviceClass::KEY_PRESS);
        assert_eq!(mask.pointer(), DeviceClass::BUTTON_RELEASE);
        assert!(DeviceClass::MOTION.keyboard().is_empty());
    }

    #[test]
    fn process_records_last_event() {
        let mut state = TestState::new();
        let master = state.add_master();
        let event = UserEvent::new(Modifiers::SHIFT, 10, DeviceClass::KEY_PRESS).with_master(master);
        assert!(process_device_event(&mut state, event));
        assert_eq!(state.input.last_event(), Some(event));
        assert_eq!(state.registry.trigger_count(EventKind::DeviceEvent), 1);
    }

    #[test]
    fn target_override() {
        let mut state = InputState::<TestState>::new(InputConfig::default());
        state.set_target(MasterId(1), Some(WindowId(5)));
        assert_eq!(state.target(MasterId(1)), Some(WindowId(5)));
        state.set_target(MasterId(1), None);
        assert_eq!(state.target(MasterId(1)), None);
    }

    #[test]
    fn flat_bindings_stop_at_halting_binding() {
        let mut state = TestState::new();
        let master = state.add_master();
        for (name, policy) in [
            ("first", crate::rules::ContinuationPolicy::NeverContinue),
            ("second", crate::rules::ContinuationPolicy::AlwaysContinue),
        ] {
            let recorder = state.recorder.clone();
            state.input.add_binding(
                Binding::new(
                    Modifiers::empty(),
                    0,
                    Handler::niladic(name, move |_: &mut TestState| recorder.push(name)).with_policy(policy),
                ),
                AddFlag::Append,
            );
        }
        let event = UserEvent::new(Modifiers::empty(), 24, DeviceClass::KEY_PRESS).with_master(master);
        assert!(!check_flat_bindings(&mut state, &event));
        assert_eq!(state.recorder.take(), ["first"]);
    }

    fn resize_binding(state: &TestState) -> Binding<TestState> {
        let ends = state.recorder.clone();
        let chain = Chain::new(
            "resize",
            vec![Binding::new(Modifiers::empty(), 43, Handler::named("shrink"))
                .with_flags(BindingFlags::TERMINATOR)],
        )
        .with_grab_mask(DeviceClass::KEYBOARD)
        .on_end(Handler::niladic("leave_resize", move |_: &mut TestState| ends.push("leave_resize")));
        Binding::opening(Modifiers::MOD4, 27, chain)
    }

    #[test]
    fn removing_binding_ends_its_open_chain() {
        let mut state = TestState::new();
        let master = state.add_master();
        let binding = resize_binding(&state);
        assert!(add_binding(&mut state, binding, AddFlag::Append).is_inserted());

        let event = UserEvent::new(Modifiers::MOD4, 27, DeviceClass::KEY_PRESS).with_master(master);
        check_flat_bindings(&mut state, &event);
        assert!(chain::active_chain(&mut state, Some(master)).is_some());
        assert_eq!(state.device_grabs(), [(Some(master), DeviceClass::KEYBOARD)]);
        assert_eq!(state.detail_grabs(), [43]);

        let removed = remove_binding(&mut state, "resize").expect("binding should be registered");
        assert!(removed.chain().is_some());
        assert!(chain::active_chain(&mut state, Some(master)).is_none());
        assert!(state.device_grabs().is_empty());
        assert!(state.detail_grabs().is_empty());
        assert_eq!(state.recorder.take(), ["leave_resize"]);
        assert!(remove_binding(&mut state, "resize").is_none());
    }

    #[test]
    fn toggling_off_a_chain_binding_ends_its_chain() {
        let mut state = TestState::new();
        let master = state.add_master();
        let binding = resize_binding(&state);
        add_binding(&mut state, binding, AddFlag::Toggle);

        let event = UserEvent::new(Modifiers::MOD4, 27, DeviceClass::KEY_PRESS).with_master(master);
        check_flat_bindings(&mut state, &event);
        assert!(chain::active_chain(&mut state, Some(master)).is_some());

        let key = resize_binding(&state);
        assert_eq!(add_binding(&mut state, key, AddFlag::Toggle), AddResult::Removed);
        assert!(state.input.bindings().is_empty());
        assert!(state.device_grabs().is_empty());
        assert_eq!(state.recorder.take(), ["leave_resize"]);
    }

    #[test]
    fn grab_failures_are_counted() {
        let mut state = TestState::new();
        state.input.add_binding(
            Binding::new(Modifiers::MOD4, 36, Handler::named("ok")),
            AddFlag::Append,
        );
        state.input.add_binding(
            Binding::new(Modifiers::MOD4, 37, Handler::named("refused")),
            AddFlag::Append,
        );
        state.input.add_binding(
            Binding::new(Modifiers::MOD4, 38, Handler::named("no_grab")).with_flags(BindingFlags::NO_GRAB),
            AddFlag::Append,
        );
        state.refuse_detail(37);
        assert_eq!(grab_flat_bindings(&mut state), 1);
        assert_eq!(state.detail_grabs(), [36]);
        assert_eq!(ungrab_flat_bindings(&mut state), 0);
        assert!(state.detail_grabs().is_empty());
    }
}
