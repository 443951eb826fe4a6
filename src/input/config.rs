//! Input configuration and the default input rules

use tracing::debug;

use super::{check_all_bindings, chain, InputHandler, Modifiers};
use crate::rules::{AddFlag, ContinuationPolicy, EventKind, Handler, Registry};

/// Name of the rule that feeds device events to the chains and bindings
pub const CHECK_BINDINGS_RULE: &str = "check_all_bindings";
/// Name of the rule that drops repeated key presses
pub const IGNORE_KEY_REPEAT_RULE: &str = "ignore_key_repeat";
/// Name of the batched rule that aborts idle chains
pub const ABORT_IDLE_CHAINS_RULE: &str = "abort_idle_chains";

/// Input configuration
///
/// The default ignores the Caps lock and Num lock states, lets repeated key
/// presses through and appends the binding check to the device event rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConfig {
    /// Lock modifiers stripped from events before matching and added to every grab
    pub ignored_modifiers: Modifiers,
    /// Stop processing repeated key presses before any binding sees them
    pub ignore_key_repeat: bool,
    /// How the binding check rule is inserted into the device event rules
    pub binding_rule_flag: AddFlag,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            ignored_modifiers: Modifiers::LOCK | Modifiers::MOD2,
            ignore_key_repeat: false,
            binding_rule_flag: AddFlag::AppendUnique,
        }
    }
}

impl InputConfig {
    /// Register the default input rules into `registry`
    ///
    /// - [`CHECK_BINDINGS_RULE`] on [`EventKind::DeviceEvent`], which runs
    ///   [`check_all_bindings`] with the last event and stops the device
    ///   event rules if a binding halted propagation;
    /// - [`IGNORE_KEY_REPEAT_RULE`], prepended to the same list, if
    ///   `ignore_key_repeat` is set;
    /// - [`ABORT_IDLE_CHAINS_RULE`] on the batched device event rules.
    pub fn install<D: InputHandler>(&self, registry: &mut Registry<D>) {
        debug!(config = ?self, "installing input rules");
        registry.add(
            EventKind::DeviceEvent,
            Handler::niladic(CHECK_BINDINGS_RULE, |data: &mut D| {
                match data.input_state().last_event() {
                    Some(event) => check_all_bindings(data, &event),
                    None => true,
                }
            })
            .with_policy(ContinuationPolicy::ContinueIfTrue),
            self.binding_rule_flag,
        );
        if self.ignore_key_repeat {
            registry.add(
                EventKind::DeviceEvent,
                Handler::niladic(IGNORE_KEY_REPEAT_RULE, |data: &mut D| {
                    !data.input_state().last_event().map_or(false, |event| event.repeat)
                })
                .with_policy(ContinuationPolicy::ContinueIfTrue),
                AddFlag::PrependUnique,
            );
        }
        registry.add_batch(
            EventKind::DeviceEvent,
            Handler::niladic(ABORT_IDLE_CHAINS_RULE, |data: &mut D| chain::abort_idle_chains(data)),
            AddFlag::AppendUnique,
        );
    }

    /// Remove the rules registered by [`InputConfig::install`]
    pub fn uninstall<D: InputHandler>(registry: &mut Registry<D>) {
        registry.remove_named(EventKind::DeviceEvent, CHECK_BINDINGS_RULE);
        registry.remove_named(EventKind::DeviceEvent, IGNORE_KEY_REPEAT_RULE);
        registry.remove_batch_named(EventKind::DeviceEvent, ABORT_IDLE_CHAINS_RULE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        input::{process_device_event, Binding, DeviceClass, UserEvent},
        test_utils::TestState,
    };

    fn counting_binding(state: &mut TestState) {
        let recorder = state.recorder.clone();
        state.input.add_binding(
            Binding::new(
                Modifiers::empty(),
                5,
                Handler::niladic("hit", move |_: &mut TestState| recorder.push("hit")),
            ),
            AddFlag::Append,
        );
    }

    #[test]
    fn install_is_idempotent() {
        let mut state = TestState::new();
        let config = InputConfig {
            ignore_key_repeat: true,
            ..Default::default()
        };
        config.install(&mut state.registry);
        config.install(&mut state.registry);
        let names: Vec<_> = state
            .registry
            .rules(EventKind::DeviceEvent)
            .iter()
            .map(|h| h.name().to_owned())
            .collect();
        assert_eq!(names, [IGNORE_KEY_REPEAT_RULE, CHECK_BINDINGS_RULE]);
        assert_eq!(state.registry.batched_rules(EventKind::DeviceEvent).len(), 1);

        InputConfig::uninstall(&mut state.registry);
        assert!(state.registry.rules(EventKind::DeviceEvent).is_empty());
        assert!(state.registry.batched_rules(EventKind::DeviceEvent).is_empty());
    }

    #[test]
    fn repeated_keys_are_dropped() {
        let mut state = TestState::new();
        let master = state.add_master();
        InputConfig {
            ignore_key_repeat: true,
            ..Default::default()
        }
        .install(&mut state.registry);
        counting_binding(&mut state);

        let event = UserEvent::new(Modifiers::empty(), 5, DeviceClass::KEY_PRESS).with_master(master);
        assert!(process_device_event(&mut state, event));
        assert!(!process_device_event(&mut state, event.repeated()));
        assert_eq!(state.recorder.take(), ["hit"]);
    }

    #[test]
    fn lock_modifiers_do_not_break_bindings() {
        let mut state = TestState::new();
        let master = state.add_master();
        InputConfig::default().install(&mut state.registry);
        counting_binding(&mut state);
        let event = UserEvent::new(Modifiers::LOCK | Modifiers::MOD2, 5, DeviceClass::KEY_PRESS).with_master(master);
        process_device_event(&mut state, event);
        assert_eq!(state.recorder.take(), ["hit"]);
    }
}
