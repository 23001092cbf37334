//! Command line surface.
pub mod cli;
pub mod render;
