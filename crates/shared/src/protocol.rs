use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::ItemId;

/// One element of the `GET /menu` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuEntry {
    #[serde(rename = "Item")]
    pub item: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub selected_items: Vec<ItemId>,
}

/// Raw `POST /optimize` success body. Fields are optional on the wire so that
/// a structurally present but incomplete answer can be told apart from an
/// unreadable one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal_selection: Option<BTreeMap<ItemId, Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}
