//! Dispatch context
//!
//! Handlers may ask for one of four kinds of context: a window, a master, a
//! workspace or a monitor. This module defines the identifiers for those
//! objects and the [`ContextHandler`] trait through which the dispatcher
//! resolves them. The window manager state owns the actual objects; the
//! dispatcher only ever sees their identifiers.

use std::fmt;

macro_rules! context_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                $name(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

context_id!(
    /// Identifier of a managed window
    WindowId
);
context_id!(
    /// Identifier of a master device pair (one keyboard and one pointer)
    ///
    /// Every master has its own focus, binding mode and active-chain stack.
    MasterId
);
context_id!(
    /// Identifier of a workspace
    WorkspaceId
);
context_id!(
    /// Identifier of a monitor
    MonitorId
);

/// Binding mode of a master
///
/// A binding only fires for a master whose current mode equals the binding's
/// mode, unless the binding uses [`Mode::ANY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mode(pub u32);

impl Mode {
    /// Mode every master starts in
    pub const DEFAULT: Mode = Mode(0);
    /// Matches every mode
    pub const ANY: Mode = Mode(u32::MAX);

    /// Whether a binding declared with `self` may fire while a master is in `current`
    pub fn allows(self, current: Mode) -> bool {
        self == Mode::ANY || self == current
    }
}

/// Context directly supplied to a dispatch call
///
/// At most one window is supplied directly. The master defaults to the
/// active master of the [`ContextHandler`] when left empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    /// The window the event is about, if any
    pub window: Option<WindowId>,
    /// Overrides the active master
    pub master: Option<MasterId>,
}

impl Context {
    /// A context without any supplied object
    pub fn none() -> Self {
        Self::default()
    }

    /// A context carrying `window`
    pub fn window(window: WindowId) -> Self {
        Context {
            window: Some(window),
            master: None,
        }
    }

    /// Replace the master used for this dispatch
    pub fn with_master(mut self, master: MasterId) -> Self {
        self.master = Some(master);
        self
    }
}

/// Provides access to the window manager objects a handler may ask for
///
/// Every lookup may fail; the dispatcher treats a missing link as "do not
/// call the handler".
pub trait ContextHandler {
    /// The master currently driving the window manager
    fn active_master(&self) -> Option<MasterId>;

    /// The workspace the master is currently on
    fn workspace_of(&self, master: MasterId) -> Option<WorkspaceId>;

    /// The monitor the workspace is currently shown on
    fn monitor_of(&self, workspace: WorkspaceId) -> Option<MonitorId>;

    /// The window currently focused by the master
    fn focused_window(&self, master: MasterId) -> Option<WindowId>;

    /// The binding mode the master is currently in
    fn binding_mode(&self, _master: MasterId) -> Mode {
        Mode::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_mode_matches_everything() {
        assert!(Mode::ANY.allows(Mode::DEFAULT));
        assert!(Mode::ANY.allows(Mode(7)));
        assert!(Mode(7).allows(Mode(7)));
        assert!(!Mode(7).allows(Mode::DEFAULT));
    }

    #[test]
    fn context_builders() {
        let ctx = Context::window(WindowId(3)).with_master(MasterId(2));
        assert_eq!(ctx.window, Some(WindowId(3)));
        assert_eq!(ctx.master, Some(MasterId(2)));
        assert_eq!(Context::none(), Context::default());
    }
}
