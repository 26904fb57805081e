//! Network infrastructure.
//!
//! - **`ws_server`** – WebSocket accept loop and per-observer sessions.  Each
//!   session registers its outbound half with the observer registry and
//!   echoes inbound text back to the sender.

pub mod ws_server;
