//! FFI bridge crate for the TaskTrack Flutter shell.

pub mod api;
