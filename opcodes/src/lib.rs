//! Decodes 16-bit AVR opcodes into a tagged [`Instr`] via a table compiled from
//! `instructions.json` by `build.rs`. See that file for the longest-specific-match
//! dispatch strategy and the collision check run at generation time.

pub(crate) mod fields;

// Generated by build.rs from instructions.json; not checked into version control.
mod decode;
pub use decode::{decode, Instr};
