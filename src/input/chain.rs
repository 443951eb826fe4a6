//! Chains: modal multi-step input sequences
//!
//! A [`Chain`] is opened by triggering the [`Binding`] that owns it. While
//! open, the chain sits on the active-chain stack of its master (or on the
//! global stack for [`ChainFlags::GLOBAL`] chains) and its members get the
//! first look at every input event, most recently opened chain first.
//!
//! The stacks only hold weak references. A chain dropped while open (for
//! example because its binding was removed) is treated as no longer active.
//!
//! A chain is ended by triggering one of its [`BindingFlags::TERMINATOR`]
//! members, by input that matches none of its members while it has a
//! terminator without [`BindingFlags::SURVIVE_EXTERNAL_INPUT`], or
//! explicitly with [`end`] or [`end_active_chain`]. Ending a chain that is
//! not open does nothing.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use bitflags::bitflags;
use tracing::{debug, info, instrument, trace, warn};

use super::{
    binding::{Binding, BindingFlags},
    ChainStack, DeviceClass, InputHandler, UserEvent,
};
use crate::{
    context::MasterId,
    rules::{ContinuationPolicy, Handler},
    utils::ids::id_gen,
};

id_gen! {
    /// Identity of a [`Chain`]
    pub struct ChainId;
}

bitflags! {
    /// Behavior switches of a [`Chain`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChainFlags: u8 {
        /// Trigger the first member with the opening event
        const AUTO_TRIGGER = 1 << 0;
        /// Track the chain on the process-wide stack instead of the master's
        const GLOBAL = 1 << 1;
        /// End the chain with abort semantics on the next idle cycle
        const ABORT_ON_IDLE = 1 << 2;
    }
}

/// Handlers run on chain transitions
pub struct ChainHooks<D> {
    /// Run after the chain was opened
    pub on_start: Option<Handler<D>>,
    /// Run after the chain was ended
    pub on_end: Option<Handler<D>>,
    /// Run before `on_end` when the chain was aborted
    pub on_abort: Option<Handler<D>>,
}

impl<D> Default for ChainHooks<D> {
    fn default() -> Self {
        ChainHooks {
            on_start: None,
            on_end: None,
            on_abort: None,
        }
    }
}

impl<D> fmt::Debug for ChainHooks<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainHooks")
            .field("on_start", &self.on_start.as_ref().map(|h| h.name()))
            .field("on_end", &self.on_end.as_ref().map(|h| h.name()))
            .field("on_abort", &self.on_abort.as_ref().map(|h| h.name()))
            .finish()
    }
}

/// A set of member bindings that become active together
pub struct Chain<D> {
    id: ChainId,
    name: String,
    members: Vec<Binding<D>>,
    grab_mask: DeviceClass,
    flags: ChainFlags,
    policy: ContinuationPolicy,
    hooks: ChainHooks<D>,
}

impl<D> fmt::Debug for Chain<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("members", &self.members)
            .field("grab_mask", &self.grab_mask)
            .field("flags", &self.flags)
            .field("policy", &self.policy)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<D> Chain<D> {
    /// Create a chain with the given members
    ///
    /// By default the chain takes no device grab and halts propagation of
    /// every event one of its members accepted.
    pub fn new(name: impl Into<String>, members: Vec<Binding<D>>) -> Self {
        Chain {
            id: ChainId::new(),
            name: name.into(),
            members,
            grab_mask: DeviceClass::empty(),
            flags: ChainFlags::empty(),
            policy: ContinuationPolicy::NeverContinue,
            hooks: ChainHooks::default(),
        }
    }

    /// Grab these event classes of the master's devices while the chain is open
    pub fn with_grab_mask(mut self, mask: DeviceClass) -> Self {
        self.grab_mask = mask;
        self
    }

    /// Set the behavior flags
    pub fn with_flags(mut self, flags: ChainFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set whether events accepted by the chain propagate further
    pub fn with_policy(mut self, policy: ContinuationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run `handler` when the chain is opened
    pub fn on_start(mut self, handler: Handler<D>) -> Self {
        self.hooks.on_start = Some(handler);
        self
    }

    /// Run `handler` when the chain is ended
    pub fn on_end(mut self, handler: Handler<D>) -> Self {
        self.hooks.on_end = Some(handler);
        self
    }

    /// Run `handler` when the chain is aborted
    pub fn on_abort(mut self, handler: Handler<D>) -> Self {
        self.hooks.on_abort = Some(handler);
        self
    }

    /// Identity of this chain
    pub fn id(&self) -> &ChainId {
        &self.id
    }

    /// Name of this chain
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member bindings
    pub fn members(&self) -> &[Binding<D>] {
        &self.members
    }

    /// Event classes grabbed while open
    pub fn grab_mask(&self) -> DeviceClass {
        self.grab_mask
    }

    /// Behavior flags
    pub fn flags(&self) -> ChainFlags {
        self.flags
    }

    /// Continuation policy applied to accepted events
    pub fn policy(&self) -> ContinuationPolicy {
        self.policy
    }

    /// Transition hooks
    pub fn hooks(&self) -> &ChainHooks<D> {
        &self.hooks
    }

    fn is_global(&self) -> bool {
        self.flags.contains(ChainFlags::GLOBAL)
    }

    fn ends_on_external_input(&self) -> bool {
        self.members.iter().any(|member| {
            member.is_terminator() && !member.flags().contains(BindingFlags::SURVIVE_EXTERNAL_INPUT)
        })
    }
}

fn refers_to<D>(weak: &Weak<Chain<D>>, chain: &Arc<Chain<D>>) -> bool {
    std::ptr::eq(weak.as_ptr(), Arc::as_ptr(chain))
}

/// The stack `chain` lives on: `None` for the global stack
fn owner<D: InputHandler>(data: &D, chain: &Chain<D>, master: Option<MasterId>) -> Option<MasterId> {
    if chain.is_global() {
        None
    } else {
        master.or_else(|| data.active_master())
    }
}

fn stack<D: InputHandler>(data: &mut D, owner: Option<MasterId>) -> Option<&mut ChainStack<D>> {
    let input = data.input_state();
    match owner {
        None => Some(&mut input.global_chains),
        Some(master) => input.chains.get_mut(&master),
    }
}

fn push<D: InputHandler>(data: &mut D, chain: &Arc<Chain<D>>, owner: Option<MasterId>) {
    let input = data.input_state();
    let stack = match owner {
        None => &mut input.global_chains,
        Some(master) => input.chains.entry(master).or_default(),
    };
    stack.push(Arc::downgrade(chain));
}

fn remove<D: InputHandler>(data: &mut D, chain: &Arc<Chain<D>>, owner: Option<MasterId>) -> bool {
    let Some(stack) = stack(data, owner) else {
        return false;
    };
    let Some(index) = stack.iter().rposition(|weak| refers_to(weak, chain)) else {
        return false;
    };
    stack.remove(index);
    if stack.is_empty() {
        if let Some(master) = owner {
            data.input_state().chains.shift_remove(&master);
        }
    }
    true
}

fn prune_dead<D: InputHandler>(data: &mut D) {
    let input = data.input_state();
    input.global_chains.retain(|weak| weak.strong_count() > 0);
    for stack in input.chains.values_mut() {
        stack.retain(|weak| weak.strong_count() > 0);
    }
    input.chains.retain(|_, stack| !stack.is_empty());
}

/// Whether `chain` is currently open for `master`
///
/// A reference to a chain held across other calls must be re-checked with
/// this before relying on the chain still being open.
pub fn is_still_active<D: InputHandler>(data: &mut D, chain: &Arc<Chain<D>>, master: Option<MasterId>) -> bool {
    let owner = owner(data, chain, master);
    stack(data, owner).map_or(false, |stack| stack.iter().any(|weak| refers_to(weak, chain)))
}

/// Open `chain` for the master of `event`
///
/// A same-identity chain already open is ended first. The chain is pushed
/// on its stack, the chain-wide device grab and the member grabs are taken
/// (failures are logged and do not prevent activation), the start hook runs
/// and, for [`ChainFlags::AUTO_TRIGGER`] chains, the first member is
/// triggered with `event`.
///
/// Returns `false` if the start hook or the auto-triggered member failed.
pub fn start<D: InputHandler>(chain: &Arc<Chain<D>>, data: &mut D, event: &UserEvent) -> bool {
    let owner = owner(data, chain, event.master);
    if is_still_active(data, chain, owner) {
        debug!(chain = chain.name(), "chain already active, restarting");
        end(chain, data, owner);
    }
    info!(
        chain = chain.name(),
        id = chain.id().as_raw(),
        mask = ?chain.grab_mask,
        global = chain.is_global(),
        "starting chain"
    );
    push(data, chain, owner);

    if !chain.grab_mask.is_empty() {
        if let Err(err) = data.grab_device(owner, chain.grab_mask) {
            warn!(chain = chain.name(), "failed to grab devices: {}", err);
        }
    }
    for member in &chain.members {
        // failures are already logged by the binding
        let _ = member.grab(data, owner);
    }

    let master = owner.or_else(|| data.active_master());
    let mut result = true;
    if let Some(hook) = &chain.hooks.on_start {
        result = hook.call(data, event.window, master);
    }
    if chain.flags.contains(ChainFlags::AUTO_TRIGGER) {
        if let Some(first) = chain.members.first() {
            trace!(chain = chain.name(), member = first.name(), "auto triggering");
            result = first.trigger(data, event) && result;
            if first.is_terminator() {
                end(chain, data, owner);
            }
        }
    }
    result
}

/// End `chain` for `master`
///
/// Removes the chain from its stack, releases its grabs and runs the end
/// hook. Returns `false` without doing anything if the chain is not open.
pub fn end<D: InputHandler>(chain: &Arc<Chain<D>>, data: &mut D, master: Option<MasterId>) -> bool {
    finish(chain, data, master, false)
}

/// Like [`end`], but runs the abort hook before the end hook
pub fn abort<D: InputHandler>(chain: &Arc<Chain<D>>, data: &mut D, master: Option<MasterId>) -> bool {
    finish(chain, data, master, true)
}

fn finish<D: InputHandler>(chain: &Arc<Chain<D>>, data: &mut D, master: Option<MasterId>, aborted: bool) -> bool {
    let owner = owner(data, chain, master);
    if !remove(data, chain, owner) {
        trace!(chain = chain.name(), "chain not active, nothing to end");
        return false;
    }
    info!(
        chain = chain.name(),
        id = chain.id().as_raw(),
        global = chain.is_global(),
        aborted,
        "ending chain"
    );

    if !chain.grab_mask.is_empty() {
        if let Err(err) = data.ungrab_device(owner, chain.grab_mask) {
            warn!(chain = chain.name(), "failed to ungrab devices: {}", err);
        }
    }
    for member in &chain.members {
        let _ = member.ungrab(data, owner);
    }

    let master = owner.or_else(|| data.active_master());
    if aborted {
        if let Some(hook) = &chain.hooks.on_abort {
            hook.call(data, None, master);
        }
    }
    if let Some(hook) = &chain.hooks.on_end {
        hook.call(data, None, master);
    }
    true
}

/// End `chain` on every stack it is currently open on
///
/// Returns the number of stacks it was removed from.
pub fn end_everywhere<D: InputHandler>(chain: &Arc<Chain<D>>, data: &mut D) -> usize {
    let input = data.input_state();
    let mut owners = Vec::new();
    if input.global_chains.iter().any(|weak| refers_to(weak, chain)) {
        owners.push(None);
    }
    owners.extend(
        input
            .chains
            .iter()
            .filter(|(_, stack)| stack.iter().any(|weak| refers_to(weak, chain)))
            .map(|(master, _)| Some(*master)),
    );
    owners
        .into_iter()
        .filter(|owner| end(chain, data, *owner))
        .count()
}

/// Offer `event` to the members of an open `chain`
///
/// Every matching member is triggered in order until one halts. A matching
/// terminator ends the chain right after its handler ran. If no member
/// matched, the chain is ended when it has a terminator that does not
/// survive external input, and the event propagates.
///
/// Returns whether the event should propagate to lower chains and the flat
/// bindings.
pub fn check<D: InputHandler>(chain: &Arc<Chain<D>>, data: &mut D, event: &UserEvent) -> bool {
    let mode = event.master.map(|master| data.binding_mode(master));
    let ignored = data.input_state().config().ignored_modifiers;
    let owner = owner(data, chain, event.master);

    let mut accepted = false;
    let mut proceed = true;
    for member in &chain.members {
        if !member.matches(event, mode, ignored) {
            continue;
        }
        accepted = true;
        proceed = member.trigger(data, event);
        if member.is_terminator() {
            end(chain, data, owner);
            break;
        }
        if !proceed || !is_still_active(data, chain, owner) {
            break;
        }
    }

    if !accepted {
        if chain.ends_on_external_input() {
            debug!(chain = chain.name(), "unrelated input ends chain");
            end(chain, data, owner);
        }
        return true;
    }
    chain.policy.evaluate(proceed)
}

/// Open chains of `master` in check order
///
/// Global chains come first, then the master's own; each stack is listed
/// most recently opened first.
pub fn active_chains<D: InputHandler>(data: &mut D, master: Option<MasterId>) -> Vec<Arc<Chain<D>>> {
    let master = master.or_else(|| data.active_master());
    let input = data.input_state();
    let own = master.and_then(|master| input.chains.get(&master));
    input
        .global_chains
        .iter()
        .rev()
        .chain(own.into_iter().flat_map(|stack| stack.iter().rev()))
        .filter_map(Weak::upgrade)
        .collect()
}

/// The chain an event from `master` is offered to first
pub fn active_chain<D: InputHandler>(data: &mut D, master: Option<MasterId>) -> Option<Arc<Chain<D>>> {
    active_chains(data, master).into_iter().next()
}

/// End the chain an event from `master` is offered to first
///
/// Returns `false` if there is no open chain.
pub fn end_active_chain<D: InputHandler>(data: &mut D, master: Option<MasterId>) -> bool {
    let master = master.or_else(|| data.active_master());
    match active_chain(data, master) {
        Some(chain) => end(&chain, data, master),
        None => false,
    }
}

/// Offer `event` to every open chain of its master, top of stack first
///
/// Chains ended while the walk is in progress are skipped. Returns `false`
/// as soon as a chain halts propagation.
#[instrument(level = "debug", skip_all, fields(event = %event))]
pub fn check_all_chain_bindings<D: InputHandler>(data: &mut D, event: &UserEvent) -> bool {
    prune_dead(data);
    let master = event.master.or_else(|| data.active_master());
    for chain in active_chains(data, master) {
        if !is_still_active(data, &chain, master) {
            trace!(chain = chain.name(), "chain ended during walk, skipping");
            continue;
        }
        if !check(&chain, data, event) {
            debug!(chain = chain.name(), "chain check terminated early");
            return false;
        }
    }
    true
}

/// Abort the topmost chain of every master if it allows abortion on idle
pub fn abort_idle_chains<D: InputHandler>(data: &mut D) {
    let mut owners: Vec<Option<MasterId>> = vec![None];
    owners.extend(data.input_state().masters_with_chains().map(Some));
    for owner in owners {
        let top = stack(data, owner).and_then(|stack| stack.last().and_then(Weak::upgrade));
        if let Some(chain) = top.filter(|chain| chain.flags.contains(ChainFlags::ABORT_ON_IDLE)) {
            debug!(chain = chain.name(), "aborting idle chain");
            abort(&chain, data, owner);
        }
    }
}
