use std::{collections::BTreeMap, ops::BitOr};

use serde::{Deserialize, Serialize};

use crate::name::Name;

/// Process-unique identity of a domain object, carried in `ObjectRole`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemRole {
    #[serde(rename = "EditRole")]
    Edit,
    #[serde(rename = "PreviewRole")]
    Preview,
    #[serde(rename = "ObjectRole")]
    Object,
    #[serde(rename = "CompletionsRole")]
    Completions,
    #[serde(rename = "ActionRoutesRole")]
    ActionRoutes,
    #[serde(rename = "ActionStatesRole")]
    ActionStates,
    #[serde(rename = "ActionModeRole")]
    ActionMode,
    #[serde(rename = "FocusPolicyRole")]
    FocusPolicy,
    #[serde(rename = "VisibleRole")]
    Visible,
    #[serde(rename = "NullableRole")]
    Nullable,
    #[serde(rename = "ToolTipRole")]
    ToolTip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemFlags(pub u32);

impl ItemFlags {
    pub const NONE: ItemFlags = ItemFlags(0);
    pub const SELECTABLE: ItemFlags = ItemFlags(1);
    pub const EDITABLE: ItemFlags = ItemFlags(2);
    pub const DRAG_ENABLED: ItemFlags = ItemFlags(4);
    pub const DROP_ENABLED: ItemFlags = ItemFlags(8);
    pub const ENABLED: ItemFlags = ItemFlags(32);

    pub fn contains(self, other: ItemFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn without(self, other: ItemFlags) -> ItemFlags {
        ItemFlags(self.0 & !other.0)
    }
}

impl BitOr for ItemFlags {
    type Output = ItemFlags;

    fn bitor(self, rhs: ItemFlags) -> ItemFlags {
        ItemFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusPolicy {
    NoFocus,
    TabFocus,
    ClickFocus,
    #[default]
    StrongFocus,
}

/// One cell of a table patch. Roles without a value are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCell {
    pub row: usize,
    pub column: usize,
    pub flags: ItemFlags,
    #[serde(default)]
    pub roles: BTreeMap<ItemRole, serde_json::Value>,
}

impl DataCell {
    pub fn new(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            flags: ItemFlags::NONE,
            roles: BTreeMap::new(),
        }
    }

    pub fn role(&self, role: ItemRole) -> Option<&serde_json::Value> {
        self.roles.get(&role)
    }

    pub fn set_role(&mut self, role: ItemRole, value: serde_json::Value) {
        if value.is_null() {
            self.roles.remove(&role);
        } else {
            self.roles.insert(role, value);
        }
    }
}

/// Vertical header of a row: identity and validity of the object shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<ObjectId>,
    pub verbose_identifier: String,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RowHeader {
    /// Header of a row whose object is gone.
    pub fn emptied() -> Self {
        Self {
            object_id: None,
            verbose_identifier: String::new(),
            valid: true,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedRange {
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<RowHeader>,
    #[serde(default)]
    pub cells: Vec<DataCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    #[serde(default)]
    pub notification: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modes: Vec<ModeRecord>,
}

impl Default for ActionState {
    fn default() -> Self {
        Self {
            verbose_name: None,
            icon: None,
            tooltip: None,
            visible: true,
            enabled: true,
            notification: false,
            modes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteState {
    pub route: Name,
    pub state: ActionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceItem {
    pub value: serde_json::Value,
    pub verbose_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub name: Name,
    pub verbose_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

/// Static attributes of a column as shipped with `SetColumns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAttributes {
    pub field_name: String,
    pub verbose_name: String,
    pub delegate: String,
    pub editable: bool,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_width: Option<u32>,
    #[serde(default)]
    pub focus_policy: FocusPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_routes: Vec<Name>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceItem>,
}

/// Inclusive range of selected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub first_row: usize,
    pub last_row: usize,
}

impl SelectionRange {
    pub fn new(first_row: usize, last_row: usize) -> Self {
        Self {
            first_row: first_row.min(last_row),
            last_row: first_row.max(last_row),
        }
    }

    pub fn row_count(&self) -> usize {
        self.last_row - self.first_row + 1
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}
