//! Mode payloads of the table actions, as posted by the UI.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ObjectId, SortOrder},
    name::Name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Case-insensitive substring match on text.
    Contains,
    StartsWith,
    IsNull,
    NotNull,
}

/// Inclusive selected range with the identities the UI saw at its ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedRows {
    pub first_row: usize,
    pub last_row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSelectionMode {
    #[serde(default)]
    pub current_row: Option<usize>,
    #[serde(default)]
    pub current_row_id: Option<ObjectId>,
    #[serde(default)]
    pub current_column: Option<usize>,
    #[serde(default)]
    pub current_field_name: Option<String>,
    #[serde(default)]
    pub selected_rows: Vec<SelectedRows>,
    #[serde(default)]
    pub collection_count: usize,
    #[serde(default)]
    pub action_routes: Vec<Name>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMode {
    pub row: usize,
    pub column: usize,
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedMode {
    pub objects: Vec<Name>,
    /// Row count the UI currently shows.
    #[serde(default)]
    pub rows: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDataMode {
    pub rows: Vec<usize>,
    /// Empty means every column.
    #[serde(default)]
    pub columns: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDataItem {
    pub row: usize,
    pub object_id: ObjectId,
    pub column: usize,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortMode {
    /// `None` restores the natural order.
    #[serde(default)]
    pub column: Option<usize>,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFieldActionMode {
    pub row: usize,
    pub column: usize,
    pub object_id: ObjectId,
    pub action_route: Name,
    #[serde(default)]
    pub action_mode: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyFilterMode {
    pub field: String,
    pub operator: FilterOp,
    #[serde(default)]
    pub value: serde_json::Value,
    /// Drop the filter on `field` with `operator` instead of setting it.
    #[serde(default)]
    pub clear: bool,
}
