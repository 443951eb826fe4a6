//! Named units of work registered into rule lists and bindings

use std::{fmt, sync::Arc};

use tracing::trace;

use crate::context::{ContextHandler, MasterId, MonitorId, WindowId, WorkspaceId};

/// Decides whether dispatch proceeds past a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContinuationPolicy {
    /// Always proceed
    #[default]
    AlwaysContinue,
    /// Always halt, whatever the handler returned
    NeverContinue,
    /// Proceed only if the handler succeeded
    ContinueIfTrue,
    /// Proceed only if the handler failed (or was skipped)
    ContinueIfFalse,
}

impl ContinuationPolicy {
    /// Whether dispatch proceeds after a handler produced `result`
    pub fn evaluate(self, result: bool) -> bool {
        match self {
            ContinuationPolicy::AlwaysContinue => true,
            ContinuationPolicy::NeverContinue => false,
            ContinuationPolicy::ContinueIfTrue => result,
            ContinuationPolicy::ContinueIfFalse => !result,
        }
    }
}

/// Return types a handler function may have
///
/// `()` counts as success, integers follow the C convention of non-zero
/// meaning success.
pub trait HandlerOutcome {
    /// Collapse the value into success or failure
    fn into_outcome(self) -> bool;
}

impl HandlerOutcome for bool {
    fn into_outcome(self) -> bool {
        self
    }
}

impl HandlerOutcome for () {
    fn into_outcome(self) -> bool {
        true
    }
}

impl HandlerOutcome for i32 {
    fn into_outcome(self) -> bool {
        self != 0
    }
}

impl HandlerOutcome for u32 {
    fn into_outcome(self) -> bool {
        self != 0
    }
}

type Func<D, A> = Arc<dyn Fn(&mut D, A) -> bool + Send + Sync>;

/// The function carried by a [`Handler`], tagged by the context it wants
pub enum Payload<D> {
    /// No function; running it always succeeds
    None,
    /// Takes no context
    Niladic(Arc<dyn Fn(&mut D) -> bool + Send + Sync>),
    /// Wants the window supplied to the dispatch
    OnWindow(Func<D, WindowId>),
    /// Wants the (resolved) master
    OnMaster(Func<D, MasterId>),
    /// Wants the master's current workspace
    OnWorkspace(Func<D, WorkspaceId>),
    /// Wants the monitor of the master's current workspace
    OnMonitor(Func<D, MonitorId>),
}

impl<D> Clone for Payload<D> {
    fn clone(&self) -> Self {
        match self {
            Payload::None => Payload::None,
            Payload::Niladic(f) => Payload::Niladic(f.clone()),
            Payload::OnWindow(f) => Payload::OnWindow(f.clone()),
            Payload::OnMaster(f) => Payload::OnMaster(f.clone()),
            Payload::OnWorkspace(f) => Payload::OnWorkspace(f.clone()),
            Payload::OnMonitor(f) => Payload::OnMonitor(f.clone()),
        }
    }
}

impl<D> fmt::Debug for Payload<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Payload::None => "None",
            Payload::Niladic(_) => "Niladic",
            Payload::OnWindow(_) => "OnWindow",
            Payload::OnMaster(_) => "OnMaster",
            Payload::OnWorkspace(_) => "OnWorkspace",
            Payload::OnMonitor(_) => "OnMonitor",
        })
    }
}

/// A named function with a continuation policy
///
/// The name is the identity of a handler: two handlers with the same name
/// compare equal regardless of their functions, which is what unique
/// insertion, toggling and removal rely on.
pub struct Handler<D> {
    name: Arc<str>,
    policy: ContinuationPolicy,
    payload: Payload<D>,
}

impl<D> Clone for Handler<D> {
    fn clone(&self) -> Self {
        Handler {
            name: self.name.clone(),
            policy: self.policy,
            payload: self.payload.clone(),
        }
    }
}

impl<D> fmt::Debug for Handler<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("payload", &self.payload)
            .finish()
    }
}

impl<D> PartialEq for Handler<D> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<D> Eq for Handler<D> {}

impl<D> Handler<D> {
    fn with_payload(name: impl Into<Arc<str>>, payload: Payload<D>) -> Self {
        Handler {
            name: name.into(),
            policy: ContinuationPolicy::default(),
            payload,
        }
    }

    /// A handler without a function
    ///
    /// Useful as a lookup key for removal, or to halt a list with
    /// [`ContinuationPolicy::NeverContinue`].
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::with_payload(name, Payload::None)
    }

    /// A handler taking no context
    pub fn niladic<R, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        R: HandlerOutcome,
        F: Fn(&mut D) -> R + Send + Sync + 'static,
    {
        Self::with_payload(name, Payload::Niladic(Arc::new(move |d: &mut D| f(d).into_outcome())))
    }

    /// A handler operating on the window supplied to the dispatch
    pub fn on_window<R, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        R: HandlerOutcome,
        F: Fn(&mut D, WindowId) -> R + Send + Sync + 'static,
    {
        Self::with_payload(
            name,
            Payload::OnWindow(Arc::new(move |d: &mut D, w| f(d, w).into_outcome())),
        )
    }

    /// A handler operating on the resolved master
    pub fn on_master<R, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        R: HandlerOutcome,
        F: Fn(&mut D, MasterId) -> R + Send + Sync + 'static,
    {
        Self::with_payload(
            name,
            Payload::OnMaster(Arc::new(move |d: &mut D, m| f(d, m).into_outcome())),
        )
    }

    /// A handler operating on the master's current workspace
    pub fn on_workspace<R, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        R: HandlerOutcome,
        F: Fn(&mut D, WorkspaceId) -> R + Send + Sync + 'static,
    {
        Self::with_payload(
            name,
            Payload::OnWorkspace(Arc::new(move |d: &mut D, w| f(d, w).into_outcome())),
        )
    }

    /// A handler operating on the monitor of the master's current workspace
    pub fn on_monitor<R, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        R: HandlerOutcome,
        F: Fn(&mut D, MonitorId) -> R + Send + Sync + 'static,
    {
        Self::with_payload(
            name,
            Payload::OnMonitor(Arc::new(move |d: &mut D, m| f(d, m).into_outcome())),
        )
    }

    /// Set the continuation policy
    pub fn with_policy(mut self, policy: ContinuationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Identity of this handler
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Continuation policy of this handler
    pub fn policy(&self) -> ContinuationPolicy {
        self.policy
    }

    /// The wrapped function
    pub fn payload(&self) -> &Payload<D> {
        &self.payload
    }

    /// Whether this handler can only run with a window supplied
    pub fn wants_window(&self) -> bool {
        matches!(self.payload, Payload::OnWindow(_))
    }
}

impl<D: ContextHandler> Handler<D> {
    /// Resolve the requested context and run the function
    ///
    /// `master` is the already resolved master of the dispatch. If the
    /// function wants a context that cannot be resolved it is not called and
    /// the result is `false`.
    pub fn call(&self, data: &mut D, window: Option<WindowId>, master: Option<MasterId>) -> bool {
        match &self.payload {
            Payload::None => true,
            Payload::Niladic(f) => f(data),
            Payload::OnWindow(f) => match window {
                Some(window) => f(data, window),
                None => self.skipped("window"),
            },
            Payload::OnMaster(f) => match master {
                Some(master) => f(data, master),
                None => self.skipped("master"),
            },
            Payload::OnWorkspace(f) => match master.and_then(|m| data.workspace_of(m)) {
                Some(workspace) => f(data, workspace),
                None => self.skipped("workspace"),
            },
            Payload::OnMonitor(f) => match master
                .and_then(|m| data.workspace_of(m))
                .and_then(|w| data.monitor_of(w))
            {
                Some(monitor) => f(data, monitor),
                None => self.skipped("monitor"),
            },
        }
    }

    /// Run the handler and apply its continuation policy
    ///
    /// Returns whether dispatch should proceed to the next handler.
    pub fn execute(&self, data: &mut D, window: Option<WindowId>, master: Option<MasterId>) -> bool {
        let result = self.call(data, window, master);
        self.policy.evaluate(result)
    }

    fn skipped(&self, missing: &str) -> bool {
        trace!(handler = %self.name, missing, "context unavailable, handler skipped");
        false
    }
}
