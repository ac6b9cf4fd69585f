//! # Sync Protocol Messages
//!
//! Messages posted on broadcast channels between register windows.
//!
//! ## Wire Format
//! ```json
//! { "type": "CART_UPDATED", "version": 1, "payload": { "schemaVersion": 1, "items": [...] } }
//! ```
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cashier window ───► CART_UPDATED { snapshot }  ───► customer display   │
//! │  cashier window ───► CART_CLEARED {}            ───► customer display   │
//! │  newer window   ───► SOMETHING_NEW { ... }      ───► ignored (Unknown)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Consumers skip message types they do not know. A message whose
//! `version` is newer than [`PROTOCOL_VERSION`] is rejected instead of
//! half-understood.

use corepos_core::snapshot::{CartSnapshot, CART_SNAPSHOT_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// Current message schema.
pub const PROTOCOL_VERSION: u32 = 1;

/// Channel name the cart is broadcast on.
pub const CART_SYNC_CHANNEL: &str = "pos-cart-sync";

/// Message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    CartUpdated,
    CartCleared,
    /// Sent by a newer window; skipped.
    #[serde(other)]
    Unknown,
}

/// A versioned message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub payload: Value,
}

fn default_version() -> u32 {
    PROTOCOL_VERSION
}

/// What a consumer gets out of a cart channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum CartMessage {
    Updated(CartSnapshot),
    Cleared,
}

impl SyncMessage {
    pub fn cart_updated(snapshot: &CartSnapshot) -> SyncResult<Self> {
        Ok(SyncMessage {
            kind: MessageKind::CartUpdated,
            version: PROTOCOL_VERSION,
            payload: serde_json::to_value(snapshot)?,
        })
    }

    pub fn cart_cleared() -> Self {
        SyncMessage {
            kind: MessageKind::CartCleared,
            version: PROTOCOL_VERSION,
            payload: Value::Null,
        }
    }

    /// Parses a raw message, e.g. one read off a foreign transport.
    pub fn from_json(raw: &str) -> SyncResult<Self> {
        serde_json::from_str(raw).map_err(|e| SyncError::InvalidMessage(e.to_string()))
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Interprets the message as a cart message.
    ///
    /// ## Returns
    /// * `Ok(None)` - Not a cart message this window understands
    /// * `Err(UnsupportedVersion)` - Message or snapshot from a newer schema
    /// * `Err(InvalidMessage)` - `CART_UPDATED` whose payload is not a snapshot
    pub fn decode_cart(&self) -> SyncResult<Option<CartMessage>> {
        if self.version > PROTOCOL_VERSION {
            return Err(SyncError::UnsupportedVersion {
                what: "message",
                found: self.version,
                supported: PROTOCOL_VERSION,
            });
        }

        match self.kind {
            MessageKind::CartUpdated => {
                let snapshot: CartSnapshot = serde_json::from_value(self.payload.clone())
                    .map_err(|e| SyncError::InvalidMessage(e.to_string()))?;
                check_snapshot_version(&snapshot)?;
                Ok(Some(CartMessage::Updated(snapshot)))
            }
            MessageKind::CartCleared => Ok(Some(CartMessage::Cleared)),
            MessageKind::Unknown => Ok(None),
        }
    }
}

/// Rejects snapshots written by a newer schema.
pub fn check_snapshot_version(snapshot: &CartSnapshot) -> SyncResult<()> {
    if snapshot.schema_version > CART_SNAPSHOT_VERSION {
        return Err(SyncError::UnsupportedVersion {
            what: "snapshot",
            found: snapshot.schema_version,
            supported: CART_SNAPSHOT_VERSION,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let msg = SyncMessage::cart_updated(&CartSnapshot::default()).unwrap();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "CART_UPDATED");
        assert_eq!(json["version"], 1);
        assert_eq!(json["payload"]["schemaVersion"], 1);
        assert!(json["payload"]["items"].is_array());
    }

    #[test]
    fn test_unknown_type_ignored() {
        let msg = SyncMessage::from_json(r#"{"type":"PRINTER_READY","version":1}"#).unwrap();
        assert_eq!(msg.kind, MessageKind::Unknown);
        assert_eq!(msg.decode_cart().unwrap(), None);
    }

    #[test]
    fn test_newer_message_rejected() {
        let msg = SyncMessage::from_json(r#"{"type":"CART_CLEARED","version":2}"#).unwrap();
        assert!(matches!(
            msg.decode_cart(),
            Err(SyncError::UnsupportedVersion { what: "message", found: 2, .. })
        ));
    }

    #[test]
    fn test_newer_snapshot_rejected() {
        let msg = SyncMessage {
            kind: MessageKind::CartUpdated,
            version: 1,
            payload: json!({"schemaVersion": 5, "items": []}),
        };
        assert!(matches!(
            msg.decode_cart(),
            Err(SyncError::UnsupportedVersion { what: "snapshot", found: 5, .. })
        ));
    }

    #[test]
    fn test_bad_payload() {
        let msg = SyncMessage {
            kind: MessageKind::CartUpdated,
            version: 1,
            payload: json!("nope"),
        };
        assert!(matches!(msg.decode_cart(), Err(SyncError::InvalidMessage(_))));
        assert!(matches!(SyncMessage::from_json("{"), Err(SyncError::InvalidMessage(_))));
    }

    #[test]
    fn test_cleared_round_trip() {
        let raw = SyncMessage::cart_cleared().to_json().unwrap();
        let parsed = SyncMessage::from_json(&raw).unwrap();
        assert_eq!(parsed.decode_cart().unwrap(), Some(CartMessage::Cleared));
    }
}
