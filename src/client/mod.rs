//! Outbound notification of rotated sequences.

pub mod template;
pub mod webhook;
