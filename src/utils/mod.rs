//! Internal helpers shared by the change-unit engine.

pub mod graph;
