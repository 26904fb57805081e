//! Infrastructure layer for the host.
//!
//! Contains OS-facing adapters: the keyboard hook, the WebSocket observer
//! endpoint, the screenshot and viewer programs behind the overlay, and
//! configuration file loading.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keystream_core`, but MUST NOT be imported by the `application` layer.

pub mod input_capture;
pub mod network;
pub mod overlay;
pub mod storage;
