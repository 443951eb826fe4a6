//! Device grab requests
//!
//! Bindings ask the display server to filter input at the source with
//! passive grabs of their modifier+detail combinations; chains may grab a
//! whole class of events for their lifetime. The requests are described
//! here and carried out by the [`InputHandler`](super::InputHandler).

use super::{DeviceClass, Modifiers};

/// A passive grab of one modifier+detail combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetailGrab {
    /// Keycode or button
    pub detail: u32,
    /// Modifiers that have to be held; [`Modifiers::ANY`] grabs every state
    pub modifiers: Modifiers,
    /// Event classes to grab
    pub mask: DeviceClass,
    /// Lock modifiers; the backend has to grab every combination of these
    /// on top of `modifiers`
    pub ignored: Modifiers,
}

impl DetailGrab {
    /// Every modifier state this grab has to cover
    ///
    /// Yields `modifiers` combined with each subset of `ignored`. A grab for
    /// [`Modifiers::ANY`] yields just that.
    pub fn modifier_combinations(&self) -> impl Iterator<Item = Modifiers> + '_ {
        let ignored = if self.modifiers.contains(Modifiers::ANY) {
            Modifiers::empty()
        } else {
            self.ignored - self.modifiers
        };
        let bits: Vec<u16> = ignored.iter().map(|m| m.bits()).collect();
        (0..1u32 << bits.len()).map(move |subset| {
            bits.iter()
                .enumerate()
                .filter(|(i, _)| subset & (1 << i) != 0)
                .fold(self.modifiers, |mods, (_, bit)| mods | Modifiers::from_bits_retain(*bit))
        })
    }
}

/// Failure reported by the display server for a grab or ungrab
///
/// Grab failures are reported to the caller and never retried.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GrabError {
    /// Another client holds a conflicting grab
    #[error("the device is already grabbed by another client")]
    AlreadyGrabbed,
    /// The device is frozen by another grab
    #[error("the device is frozen by another grab")]
    Frozen,
    /// The grab window is not viewable
    #[error("the grab window is not viewable")]
    NotViewable,
    /// The request timestamp is older than the last grab
    #[error("the grab request time is invalid")]
    InvalidTime,
    /// The master has no device of the requested class
    #[error("no device of class {0:?} to grab")]
    NoDevice(DeviceClass),
    /// The request failed at the protocol level
    #[error("grab request failed: {0}")]
    Protocol(String),
}
