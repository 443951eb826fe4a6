#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # mpxwm: the rule engine of a multi-pointer window manager
//!
//! This crate is the core every feature of an X11 window manager with
//! multiple master devices plugs into: an event rule dispatcher and an input
//! binding and chain state machine. Tiling, monitor geometry, session
//! handling and the protocol connection itself live outside of it and only
//! talk to it through the traits described below.
//!
//! ## Structure of the crate
//!
//! - [`rules`] contains the [`Registry`](rules::Registry) of rule lists and
//!   the dispatch functions. Features react to events exclusively by
//!   registering [`Handler`](rules::Handler)s there.
//! - [`input`] contains [`Binding`](input::Binding)s, modal
//!   [`Chain`](input::Chain)s and the per-master state tracking them.
//! - [`context`] contains the identifiers of the objects handlers operate on
//!   and the [`ContextHandler`](context::ContextHandler) trait resolving them.
//! - [`producer`] contains helpers to feed events from secondary threads
//!   into the event loop.
//!
//! ## General principles
//!
//! ### The event loop and state handling
//!
//! mpxwm is meant to be driven by [`calloop`]. All state lives in one value
//! of your own type, which implements [`RulesHandler`](rules::RulesHandler)
//! and [`InputHandler`](input::InputHandler) to hand out the registry and
//! input state it owns. Every dispatch function takes that value as
//! `&mut D` and passes it on to the handlers, so handlers can mutate any
//! part of the state, including the rule lists themselves, without locks.
//!
//! A typical loop iteration resolves a protocol event into an
//! [`EventKind`](rules::EventKind), calls
//! [`apply_event_rules`](rules::apply_event_rules) (or
//! [`process_device_event`](input::process_device_event) for input), and
//! once the connection has no pending events runs
//! [`run_idle_cycle`](rules::run_idle_cycle).
//!
//! ### Logging
//!
//! mpxwm makes extensive use of [`tracing`] for its internal logging.
//!
//! For release builds it is recommended to limit the log level during compile time.
//! This can be done by adding a dependency to [`tracing`] and enabling the corresponding features.
//! For example to enable `trace` messages for debug builds, but limit release builds to `debug` add
//! the following in your binary crate `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tracing = { version = "0.1", features = ["max_level_trace", "release_max_level_debug"] }
//! ```

pub mod context;
pub mod input;
pub mod producer;
pub mod rules;
mod utils;

#[cfg(test)]
mod test_utils;
