//! Protocol module containing the classified event types and their JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_event, encode_event, ProtocolError};
pub use messages::{ClassifiedEvent, EventKind};
