//! Session quota enforcement.

pub mod session;
