//! Event rule registry and dispatcher
//!
//! Every feature of the window manager participates in event handling by
//! registering [`Handler`]s into the [`Registry`], never by calling another
//! feature directly. Each [`EventKind`] owns two rule lists:
//!
//! - the *immediate* list, run by [`apply_event_rules`] for every occurrence
//!   of the event, with the window and master the event is about;
//! - the *batched* list, run by [`apply_batch_event_rules`] at most once per
//!   idle cycle if the event occurred at least once since the last cycle.
//!
//! Immediate rules are meant for cheap, order-sensitive bookkeeping; batched
//! rules for expensive recomputation that only needs to happen once after a
//! flood of identical events.
//!
//! ## Usage
//!
//! ```
//! use mpxwm::context::{ContextHandler, MasterId, MonitorId, WindowId, WorkspaceId};
//! use mpxwm::rules::{apply_event_rules, AddFlag, Context, EventKind, Handler, Registry, RulesHandler};
//!
//! struct State {
//!     registry: Registry<Self>,
//!     moves: usize,
//! }
//!
//! impl ContextHandler for State {
//!     fn active_master(&self) -> Option<MasterId> { Some(MasterId(2)) }
//!     fn workspace_of(&self, _: MasterId) -> Option<WorkspaceId> { None }
//!     fn monitor_of(&self, _: WorkspaceId) -> Option<MonitorId> { None }
//!     fn focused_window(&self, _: MasterId) -> Option<WindowId> { None }
//! }
//!
//! impl RulesHandler for State {
//!     fn registry(&mut self) -> &mut Registry<Self> { &mut self.registry }
//! }
//!
//! let mut state = State { registry: Registry::new(), moves: 0 };
//! state.registry.add(
//!     EventKind::WindowMove,
//!     Handler::on_window("count_moves", |state: &mut State, _window| state.moves += 1),
//!     AddFlag::AppendUnique,
//! );
//! assert!(apply_event_rules(&mut state, EventKind::WindowMove, Context::window(WindowId(1))));
//! assert_eq!(state.moves, 1);
//! ```

use std::fmt;

use tracing::{debug, trace, warn};

use crate::context::{ContextHandler, MasterId, WindowId};

pub use crate::context::Context;

pub mod handler;
pub mod list;

pub use self::handler::{ContinuationPolicy, Handler, HandlerOutcome, Payload};
pub use self::list::{AddFlag, AddResult, OrderedList};

/// An ordered list of handlers
pub type RuleList<D> = OrderedList<Handler<D>>;

macro_rules! event_kinds {
    ($($(#[$attr:meta])* $variant:ident,)*) => {
        /// Trigger points of the dispatcher
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventKind {
            $($(#[$attr])* $variant,)*
        }

        impl EventKind {
            /// Every kind, in enumeration order
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant,)*];
            /// Number of kinds
            pub const COUNT: usize = [$(EventKind::$variant,)*].len();

            /// Name of the kind, for logging
            pub fn as_str(self) -> &'static str {
                match self {
                    $(EventKind::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

event_kinds! {
    /// A protocol event the window manager has no dedicated kind for
    Extra,
    /// The connection to the display server was established
    Connection,
    /// A new window was added to the internal lists
    PostRegisterWindow,
    /// A window is about to be removed from the internal lists
    UnregisterWindow,
    /// Properties of a window were (re)loaded
    PropertyLoad,
    /// Key, button or motion activity of an input device
    DeviceEvent,
    /// A client window was allowed to be mapped
    ClientMapAllow,
    /// A client window withdrew its map request
    ClientMapDisallow,
    /// The root screen changed size or layout
    ScreenChange,
    /// A workspace was tiled
    TileWorkspace,
    /// A window left a workspace
    WorkspaceWindowRemove,
    /// A window joined a workspace
    WorkspaceWindowAdd,
    /// A master switched workspaces
    WorkspaceChange,
    /// A monitor started showing another workspace
    MonitorWorkspaceChange,
    /// A managed window was moved or resized
    WindowMove,
    /// Periodic timer tick
    Periodic,
    /// The connection has no pending events
    Idle,
    /// Runs after the idle batch; must not change server state
    TrueIdle,
}

impl EventKind {
    /// Position of this kind in the registry tables
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table of rule lists, two per [`EventKind`], and per-kind trigger counters
pub struct Registry<D> {
    immediate: Vec<RuleList<D>>,
    batched: Vec<RuleList<D>>,
    counters: Vec<usize>,
}

impl<D> fmt::Debug for Registry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            let i = kind.index();
            if self.immediate[i].is_empty() && self.batched[i].is_empty() && self.counters[i] == 0 {
                continue;
            }
            map.entry(
                kind,
                &format_args!(
                    "immediate: {:?}, batched: {:?}, triggered: {}",
                    self.immediate[i], self.batched[i], self.counters[i]
                ),
            );
        }
        map.finish()
    }
}

impl<D> Default for Registry<D> {
    fn default() -> Self {
        Registry {
            immediate: (0..EventKind::COUNT).map(|_| RuleList::new()).collect(),
            batched: (0..EventKind::COUNT).map(|_| RuleList::new()).collect(),
            counters: vec![0; EventKind::COUNT],
        }
    }
}

impl<D> Registry<D> {
    /// Create a registry with empty lists and zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// The immediate rule list of `kind`
    pub fn rules(&self, kind: EventKind) -> &RuleList<D> {
        &self.immediate[kind.index()]
    }

    /// Mutable access to the immediate rule list of `kind`
    pub fn rules_mut(&mut self, kind: EventKind) -> &mut RuleList<D> {
        &mut self.immediate[kind.index()]
    }

    /// The batched rule list of `kind`
    pub fn batched_rules(&self, kind: EventKind) -> &RuleList<D> {
        &self.batched[kind.index()]
    }

    /// Mutable access to the batched rule list of `kind`
    pub fn batched_rules_mut(&mut self, kind: EventKind) -> &mut RuleList<D> {
        &mut self.batched[kind.index()]
    }

    /// Register `handler` into the immediate list of `kind`
    pub fn add(&mut self, kind: EventKind, handler: Handler<D>, flag: AddFlag) -> AddResult {
        trace!(%kind, handler = handler.name(), ?flag, "adding rule");
        self.rules_mut(kind).add(handler, flag)
    }

    /// Register `handler` into the batched list of `kind`
    ///
    /// Batched rules run without a window, so a handler asking for one is
    /// skipped on every batch.
    pub fn add_batch(&mut self, kind: EventKind, handler: Handler<D>, flag: AddFlag) -> AddResult {
        if handler.wants_window() {
            warn!(
                %kind,
                handler = handler.name(),
                "batched rule can never receive a window, it will always be skipped"
            );
        }
        trace!(%kind, handler = handler.name(), ?flag, "adding batch rule");
        self.batched_rules_mut(kind).add(handler, flag)
    }

    /// Remove the handler equal to `handler` from the immediate list of `kind`
    pub fn remove(&mut self, kind: EventKind, handler: &Handler<D>) -> Option<Handler<D>> {
        self.rules_mut(kind).remove(handler)
    }

    /// Remove the handler named `name` from the immediate list of `kind`
    pub fn remove_named(&mut self, kind: EventKind, name: &str) -> Option<Handler<D>> {
        self.rules_mut(kind).remove_by(|h| h.name() == name)
    }

    /// Remove the handler named `name` from the batched list of `kind`
    pub fn remove_batch_named(&mut self, kind: EventKind, name: &str) -> Option<Handler<D>> {
        self.batched_rules_mut(kind).remove_by(|h| h.name() == name)
    }

    /// How often `kind` was triggered since its batched list last ran
    pub fn trigger_count(&self, kind: EventKind) -> usize {
        self.counters[kind.index()]
    }

    /// Note one occurrence of `kind` for the next batch
    pub fn increment_trigger_count(&mut self, kind: EventKind) {
        self.counters[kind.index()] += 1;
    }

    /// Drop every rule of every kind and reset all counters
    pub fn clear(&mut self) {
        for list in self.immediate.iter_mut().chain(self.batched.iter_mut()) {
            list.clear();
        }
        self.counters.iter_mut().for_each(|c| *c = 0);
    }

    fn take_trigger_count(&mut self, kind: EventKind) -> usize {
        std::mem::take(&mut self.counters[kind.index()])
    }
}

/// Implemented by the window manager state that owns the [`Registry`]
pub trait RulesHandler: ContextHandler + Sized {
    /// [`Registry`] getter
    fn registry(&mut self) -> &mut Registry<Self>;
}

fn apply_rules<D: ContextHandler>(
    data: &mut D,
    rules: &[Handler<D>],
    window: Option<WindowId>,
    master: Option<MasterId>,
) -> bool {
    for handler in rules {
        trace!(handler = handler.name(), "running rule");
        if !handler.execute(data, window, master) {
            debug!(handler = handler.name(), "rules aborted early");
            return false;
        }
    }
    trace!("rules finished normally");
    true
}

/// Run the immediate rules of `kind`
///
/// The trigger counter of `kind` is incremented first, even when the list is
/// empty. Rules run in list order until one of them halts according to its
/// [`ContinuationPolicy`]; the function then returns `false`. It returns
/// `true` if every rule let dispatch proceed.
///
/// The list is snapshotted before it is walked: rules added or removed by a
/// running handler take effect from the next dispatch.
#[profiling::function]
pub fn apply_event_rules<D: RulesHandler>(data: &mut D, kind: EventKind, context: Context) -> bool {
    let master = context.master.or_else(|| data.active_master());
    let registry = data.registry();
    registry.increment_trigger_count(kind);
    let rules = registry.rules(kind).snapshot();
    debug!(
        %kind,
        rules = rules.len(),
        window = ?context.window,
        ?master,
        "event detected"
    );
    apply_rules(data, &rules, context.window, master)
}

/// Run the batched rules of every kind triggered since the last call
///
/// Kinds are visited in enumeration order. Batched rules receive no window;
/// master-, workspace- and monitor-level rules see the active master. A
/// kind's counter is reset right before its list runs, so occurrences raised
/// by batched rules themselves are handled on the next call.
#[profiling::function]
pub fn apply_batch_event_rules<D: RulesHandler>(data: &mut D) {
    for &kind in EventKind::ALL {
        let registry = data.registry();
        let count = registry.take_trigger_count(kind);
        if count == 0 {
            continue;
        }
        let rules = registry.batched_rules(kind).snapshot();
        debug!(%kind, count, rules = rules.len(), "applying batch rules");
        let master = data.active_master();
        apply_rules(data, &rules, None, master);
    }
}

/// One idle pass of the event loop
///
/// Runs the [`EventKind::Idle`] rules, then the batched rules, then the
/// [`EventKind::TrueIdle`] rules.
pub fn run_idle_cycle<D: RulesHandler>(data: &mut D) {
    apply_event_rules(data, EventKind::Idle, Context::none());
    apply_batch_event_rules(data);
    apply_event_rules(data, EventKind::TrueIdle, Context::none());
}
