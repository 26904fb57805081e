//! JSON codec for [`ClassifiedEvent`]s.
//!
//! Observers receive one WebSocket text frame per event.  Encoding happens
//! once per event in the broadcaster, not once per observer.

use thiserror::Error;

use crate::protocol::messages::ClassifiedEvent;

/// Errors that can occur during event encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),

    /// The text is not a JSON object of the expected shape.
    #[error("malformed event: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Serializes an event into its wire text.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use keystream_core::{encode_event, ClassifiedEvent};
///
/// let text = encode_event(&ClassifiedEvent::Keystroke { key: "a".into() }).unwrap();
/// assert_eq!(text, r#"{"event":"keystroke","data":{"key":"a"}}"#);
/// ```
pub fn encode_event(event: &ClassifiedEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Parses wire text back into an event.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for unknown kinds, missing payload
/// fields, or invalid JSON.
pub fn decode_event(text: &str) -> Result<ClassifiedEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Malformed)
}
