//! Internal helpers

pub(crate) mod ids;
