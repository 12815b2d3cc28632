//! Slicing engine integration.
//!
//! The engine is an opaque, untrusted binary. This module builds its command
//! line ([`command`]), runs it under a wall-clock bound ([`subprocess`]), and
//! extracts metrics from what it produced ([`parser`]). Nothing here touches
//! the network or owns a workspace.

pub mod command;
pub mod parser;
pub mod subprocess;
