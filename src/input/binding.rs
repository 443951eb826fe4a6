//! Bindings: handlers triggered by matching input
//!
//! A [`Binding`] pairs a [`Handler`] with the key or button combinations
//! that trigger it. A binding may additionally own a [`Chain`]: triggering
//! it then opens that chain after the handler ran.

use std::{fmt, sync::Arc};

use bitflags::bitflags;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace, warn};

use super::{
    chain::{self, Chain},
    DetailGrab, DeviceClass, GrabError, InputHandler, Modifiers, UserEvent,
};
use crate::{
    context::{MasterId, Mode, WindowId},
    rules::Handler,
};

/// One modifier+detail combination of a [`Binding`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    /// Modifiers that have to be held, or [`Modifiers::ANY`]
    pub modifiers: Modifiers,
    /// Keycode or button; `0` matches every detail
    pub detail: u32,
}

impl KeyBinding {
    /// Create a new combination
    pub fn new(modifiers: Modifiers, detail: u32) -> Self {
        KeyBinding { modifiers, detail }
    }

    /// Whether this combination matches the (already stripped) event state
    pub fn matches(&self, modifiers: Modifiers, detail: u32) -> bool {
        (self.modifiers == Modifiers::ANY || self.modifiers == modifiers)
            && (self.detail == 0 || self.detail == detail)
    }
}

bitflags! {
    /// Behavior switches of a [`Binding`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindingFlags: u8 {
        /// Never grab the device for this binding
        const NO_GRAB = 1 << 0;
        /// Do not trigger on auto-repeated key presses
        const NO_KEY_REPEAT = 1 << 1;
        /// Triggering this binding inside a chain ends the chain
        const TERMINATOR = 1 << 2;
        /// Input matching no member of the enclosing chain does not end it
        const SURVIVE_EXTERNAL_INPUT = 1 << 3;
    }
}

/// Which window a triggered binding acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowTarget {
    /// The focused window for keyboard bindings, the event window otherwise
    #[default]
    Default,
    /// The window the input occurred on
    EventWindow,
    /// The window focused by the master
    Focused,
}

/// A handler together with the input that triggers it
pub struct Binding<D> {
    keys: SmallVec<[KeyBinding; 1]>,
    mask: DeviceClass,
    mode: Mode,
    flags: BindingFlags,
    target: WindowTarget,
    handler: Handler<D>,
    chain: Option<Arc<Chain<D>>>,
}

impl<D> Clone for Binding<D> {
    fn clone(&self) -> Self {
        Binding {
            keys: self.keys.clone(),
            mask: self.mask,
            mode: self.mode,
            flags: self.flags,
            target: self.target,
            handler: self.handler.clone(),
            chain: self.chain.clone(),
        }
    }
}

impl<D> fmt::Debug for Binding<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name())
            .field("keys", &self.keys)
            .field("mask", &self.mask)
            .field("mode", &self.mode)
            .field("flags", &self.flags)
            .field("target", &self.target)
            .field("chain", &self.chain.as_ref().map(|c| c.id()))
            .finish()
    }
}

impl<D> PartialEq for Binding<D> {
    fn eq(&self, other: &Self) -> bool {
        self.handler == other.handler
    }
}

impl<D> Binding<D> {
    /// A key binding triggering `handler`
    ///
    /// The binding listens to key presses in [`Mode::DEFAULT`]; see the
    /// `with_*` methods to change that.
    pub fn new(modifiers: Modifiers, detail: u32, handler: Handler<D>) -> Self {
        Binding {
            keys: smallvec![KeyBinding::new(modifiers, detail)],
            mask: DeviceClass::KEY_PRESS,
            mode: Mode::DEFAULT,
            flags: BindingFlags::empty(),
            target: WindowTarget::Default,
            handler,
            chain: None,
        }
    }

    /// A binding that opens `chain` when triggered
    ///
    /// The binding is named after the chain.
    pub fn opening(modifiers: Modifiers, detail: u32, chain: Chain<D>) -> Self {
        let mut binding = Self::new(modifiers, detail, Handler::named(chain.name().to_owned()));
        binding.chain = Some(Arc::new(chain));
        binding
    }

    /// Also trigger on `modifiers`+`detail`
    pub fn with_key(mut self, modifiers: Modifiers, detail: u32) -> Self {
        self.keys.push(KeyBinding::new(modifiers, detail));
        self
    }

    /// Listen to `mask` instead of key presses
    pub fn with_mask(mut self, mask: DeviceClass) -> Self {
        self.mask = mask;
        self
    }

    /// Only trigger while the master is in `mode`
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the behavior flags
    pub fn with_flags(mut self, flags: BindingFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the window the binding acts on
    pub fn with_target(mut self, target: WindowTarget) -> Self {
        self.target = target;
        self
    }

    /// Identity of the binding, the name of its handler
    pub fn name(&self) -> &str {
        self.handler.name()
    }

    /// The combinations triggering this binding
    pub fn keys(&self) -> &[KeyBinding] {
        &self.keys
    }

    /// Event classes this binding listens to
    pub fn mask(&self) -> DeviceClass {
        self.mask
    }

    /// Mode this binding is active in
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Behavior flags
    pub fn flags(&self) -> BindingFlags {
        self.flags
    }

    /// Declared target window policy
    pub fn target(&self) -> WindowTarget {
        self.target
    }

    /// The triggered handler
    pub fn handler(&self) -> &Handler<D> {
        &self.handler
    }

    /// The chain opened by this binding, if any
    pub fn chain(&self) -> Option<&Arc<Chain<D>>> {
        self.chain.as_ref()
    }

    /// Whether this binding ends its enclosing chain
    pub fn is_terminator(&self) -> bool {
        self.flags.contains(BindingFlags::TERMINATOR)
    }

    /// Whether `event` triggers this binding
    ///
    /// `mode` is the current mode of the event's master (`None` without a
    /// master, which allows every mode). `ignored` modifiers are stripped
    /// from the event before comparison.
    pub fn matches(&self, event: &UserEvent, mode: Option<Mode>, ignored: Modifiers) -> bool {
        if !event.mask.is_empty() && !self.mask.intersects(event.mask) {
            return false;
        }
        if event.repeat && self.flags.contains(BindingFlags::NO_KEY_REPEAT) {
            return false;
        }
        if let Some(mode) = mode {
            if !self.mode.allows(mode) {
                return false;
            }
        }
        let modifiers = event.modifiers - ignored;
        self.keys.iter().any(|key| key.matches(modifiers, event.detail))
    }

    fn detail_grabs(&self, ignored: Modifiers) -> impl Iterator<Item = DetailGrab> + '_ {
        self.keys
            .iter()
            .filter(|key| key.detail != 0)
            .map(move |key| DetailGrab {
                detail: key.detail,
                modifiers: key.modifiers,
                mask: self.mask,
                ignored,
            })
    }
}

impl<D: InputHandler> Binding<D> {
    /// The window a trigger by `event` acts on
    ///
    /// A target override set for the event's master takes precedence over
    /// the declared [`WindowTarget`].
    pub fn acting_window(&self, data: &mut D, event: &UserEvent) -> Option<WindowId> {
        let focused = |data: &mut D| event.master.and_then(|master| data.focused_window(master));
        if let Some(target) = event.master.and_then(|master| data.input_state().target(master)) {
            return Some(target);
        }
        match self.target {
            WindowTarget::Default if !self.mask.keyboard().is_empty() => focused(data),
            WindowTarget::Default | WindowTarget::EventWindow => event.window,
            WindowTarget::Focused => focused(data),
        }
    }

    /// Run the handler, open the chain if there is one, and apply the policy
    ///
    /// Returns whether propagation should continue.
    pub fn trigger(&self, data: &mut D, event: &UserEvent) -> bool {
        debug!(binding = self.name(), %event, "triggering binding");
        let window = self.acting_window(data, event);
        let master = event.master.or_else(|| data.active_master());
        let mut result = self.handler.call(data, window, master);
        if let Some(opened) = &self.chain {
            result = chain::start(opened, data, event) && result;
        }
        self.handler.policy().evaluate(result)
    }

    /// Passively grab every combination of this binding
    ///
    /// Does nothing for [`BindingFlags::NO_GRAB`] bindings. Stops at the
    /// first failing combination.
    pub fn grab(&self, data: &mut D, master: Option<MasterId>) -> Result<(), GrabError> {
        if self.flags.contains(BindingFlags::NO_GRAB) {
            return Ok(());
        }
        let ignored = data.input_state().config().ignored_modifiers;
        for grab in self.detail_grabs(ignored) {
            trace!(binding = self.name(), ?grab, "grabbing detail");
            data.grab_detail(master, &grab).map_err(|err| {
                warn!(binding = self.name(), ?grab, "failed to grab: {}", err);
                err
            })?;
        }
        Ok(())
    }

    /// Release the grabs taken by [`Binding::grab`]
    pub fn ungrab(&self, data: &mut D, master: Option<MasterId>) -> Result<(), GrabError> {
        if self.flags.contains(BindingFlags::NO_GRAB) {
            return Ok(());
        }
        let ignored = data.input_state().config().ignored_modifiers;
        for grab in self.detail_grabs(ignored) {
            trace!(binding = self.name(), ?grab, "ungrabbing detail");
            data.ungrab_detail(master, &grab).map_err(|err| {
                warn!(binding = self.name(), ?grab, "failed to ungrab: {}", err);
                err
            })?;
        }
        Ok(())
    }
}

/// Offer `event` to `bindings` in order, triggering every match
///
/// Returns `false` as soon as a triggered binding halts propagation.
pub fn check_bindings<D: InputHandler>(data: &mut D, event: &UserEvent, bindings: &[Binding<D>]) -> bool {
    let mode = event.master.map(|master| data.binding_mode(master));
    let ignored = data.input_state().config().ignored_modifiers;
    trace!(bindings = bindings.len(), %event, "checking bindings");
    for binding in bindings {
        if binding.matches(event, mode, ignored) && !binding.trigger(data, event) {
            debug!(binding = binding.name(), "binding check terminated early");
            return false;
        }
    }
    true
}
