use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex account identifier length, `0x` prefix included.
pub const ADDRESS_LEN: usize = 42;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in headers, e.g. `0x1234...abcd`.
    pub fn truncated(&self) -> String {
        let value = self.0.as_str();
        match (value.get(..6), value.get(value.len().saturating_sub(4)..)) {
            (Some(head), Some(tail)) if value.len() > 10 => format!("{head}...{tail}"),
            _ => value.to_owned(),
        }
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// String-encoded integer token id, as the contracts and indexer report it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSlot {
    Weapon,
    Chest,
    Head,
    Waist,
    Foot,
    Hand,
    Neck,
    Ring,
}

impl AttributeSlot {
    /// Slot order shared by bag records and the bundler's `ItemIds` tuple.
    pub const ALL: [AttributeSlot; 8] = [
        AttributeSlot::Weapon,
        AttributeSlot::Chest,
        AttributeSlot::Head,
        AttributeSlot::Waist,
        AttributeSlot::Foot,
        AttributeSlot::Hand,
        AttributeSlot::Neck,
        AttributeSlot::Ring,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AttributeSlot::Weapon => "weapon",
            AttributeSlot::Chest => "chest",
            AttributeSlot::Head => "head",
            AttributeSlot::Waist => "waist",
            AttributeSlot::Foot => "foot",
            AttributeSlot::Hand => "hand",
            AttributeSlot::Neck => "neck",
            AttributeSlot::Ring => "ring",
        }
    }
}

/// One bag and its eight item attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: TokenId,
    pub weapon: String,
    pub chest: String,
    pub head: String,
    pub waist: String,
    pub foot: String,
    pub hand: String,
    pub neck: String,
    pub ring: String,
}

impl TokenRecord {
    /// Builds a record from attribute values given in [`AttributeSlot::ALL`] order.
    pub fn from_slots(id: TokenId, values: [String; 8]) -> Self {
        let [weapon, chest, head, waist, foot, hand, neck, ring] = values;
        Self {
            id,
            weapon,
            chest,
            head,
            waist,
            foot,
            hand,
            neck,
            ring,
        }
    }

    pub fn attribute(&self, slot: AttributeSlot) -> &str {
        match slot {
            AttributeSlot::Weapon => &self.weapon,
            AttributeSlot::Chest => &self.chest,
            AttributeSlot::Head => &self.head,
            AttributeSlot::Waist => &self.waist,
            AttributeSlot::Foot => &self.foot,
            AttributeSlot::Hand => &self.hand,
            AttributeSlot::Neck => &self.neck,
            AttributeSlot::Ring => &self.ring,
        }
    }

    pub fn attributes(&self) -> Vec<String> {
        AttributeSlot::ALL
            .iter()
            .map(|slot| self.attribute(*slot).to_owned())
            .collect()
    }
}

/// ERC-1155 item ids a bag decomposes into, in slot order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentIds(pub [String; 8]);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Unbundle,
    Rebundle,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Unbundle => "unbundle",
            Operation::Rebundle => "rebundle",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── HTTP DTOs ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletResponse {
    pub address: Option<String>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Authenticate,
    Submit,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PanelButtonView {
    pub label: String,
    pub enabled: bool,
    pub action: ButtonAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PanelItemView {
    pub id: String,
    pub label: String,
    pub attributes: Vec<String>,
    pub selected: bool,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PanelView {
    pub operation: Operation,
    pub title: String,
    pub description: String,
    pub status: Option<String>,
    pub items: Vec<PanelItemView>,
    pub selected: Option<String>,
    pub submitting: bool,
    pub button: PanelButtonView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    pub token_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationView {
    pub seq: u64,
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<NotificationView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfigResponse {
    pub chain_id: u64,
    pub loot_address: String,
    pub bundler_address: String,
    pub inventory_source: String,
    pub confirmations: u64,
}
