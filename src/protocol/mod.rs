//! Boundary types shared with the transport and forwarding layers.

pub mod models;
pub mod path;
