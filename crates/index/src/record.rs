//! The persisted index record.
//!
//! The stored value pairs the canonical event with its decrypted body
//! under the `nostrEvent` / `decryptedContent` keys, plus the derived
//! share fields. This layout is a public contract for migration tools.

use serde::{Deserialize, Serialize};

use common::event::Event;
use common::item::{DriveItem, ItemContent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveRecord {
    /// The canonical signed event.
    pub nostr_event: Event,
    /// The parsed JSON body recovered from the event content.
    pub decrypted_content: ItemContent,
    /// The `p`-tag recipient, for outbound share events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<String>,
    /// The source event a share event was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_event_id: Option<String>,
}

impl DriveRecord {
    pub fn new(event: Event, content: ItemContent) -> Self {
        Self {
            nostr_event: event,
            decrypted_content: content,
            shared_with: None,
            original_event_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.nostr_event.id
    }

    pub fn author(&self) -> &str {
        &self.nostr_event.pubkey
    }

    pub fn created_at(&self) -> u64 {
        self.nostr_event.created_at
    }

    pub fn path(&self) -> &str {
        self.decrypted_content.path()
    }

    /// Whether the given identity may see this record: its author, or
    /// a `p`-tag recipient.
    pub fn accessible_to(&self, pubkey_hex: &str) -> bool {
        self.author() == pubkey_hex || self.nostr_event.is_addressed_to(pubkey_hex)
    }

    /// Materialise the record into a view item.
    pub fn to_item(&self) -> Option<DriveItem> {
        DriveItem::from_content(self.id(), self.created_at(), &self.decrypted_content).ok()
    }
}
