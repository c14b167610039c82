//! Hub Wire Formats
//!
//! Decoding for the two message flows the hub touches: inbound viewer
//! control messages (filter updates) and the `device_name` tag of a sample
//! record. Sample payloads are otherwise opaque and forwarded verbatim.

use serde::Deserialize;
use std::borrow::Cow;
use thiserror::Error;

/// A decoded viewer control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCommand {
    /// Add an interface to the viewer's interest filter.
    Add(String),
    /// Remove an interface from the viewer's interest filter.
    Remove(String),
}

/// Classification of a rejected control message.
///
/// All of these are non-fatal: the message is logged and ignored, the
/// connection stays open, and no reply is sent.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Not a decodable JSON object
    #[error("invalid control message: {0}")]
    Parse(#[from] serde_json::Error),

    /// Structurally valid but missing `action` or `interface`
    #[error("missing `action` or `interface` field")]
    MissingField,

    /// `action` outside the known set
    #[error("unsupported action: {0}")]
    UnknownAction(String),
}

#[derive(Deserialize)]
struct RawCommand {
    action: Option<String>,
    interface: Option<String>,
}

#[derive(Deserialize)]
struct SampleTag {
    device_name: String,
}

/// Parse an inbound viewer message into a [`FilterCommand`].
///
/// Accepts both single- and double-quoted string literals; see
/// [`normalize_quotes`].
pub fn parse_command(text: &str) -> Result<FilterCommand, CommandError> {
    let normalized = normalize_quotes(text);
    let raw: RawCommand = serde_json::from_str(&normalized)?;

    let (action, interface) = match (raw.action, raw.interface) {
        (Some(action), Some(interface)) => (action, interface),
        _ => return Err(CommandError::MissingField),
    };

    match action.as_str() {
        "add" => Ok(FilterCommand::Add(interface)),
        "remove" => Ok(FilterCommand::Remove(interface)),
        _ => Err(CommandError::UnknownAction(action)),
    }
}

/// Extract the interface a sample record pertains to.
///
/// Returns `None` for records without a decodable `device_name`; the rest of
/// the record is never inspected.
pub fn device_name(raw: &str) -> Option<String> {
    serde_json::from_str::<SampleTag>(raw)
        .ok()
        .map(|tag| tag.device_name)
}

/// The wire format permits single-quoted string literals; rewrite them to
/// double quotes before structural decoding. Interface names on this wire
/// never contain apostrophes, so a blanket replace is safe.
fn normalize_quotes(text: &str) -> Cow<'_, str> {
    if text.contains('\'') {
        Cow::Owned(text.replace('\'', "\""))
    } else {
        Cow::Borrowed(text)
    }
}
