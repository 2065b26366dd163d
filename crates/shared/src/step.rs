use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChangedRange, ChoiceItem, ColumnAttributes, CompletionItem, RouteState},
    error::ProtocolError,
    name::Name,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub clear_details: bool,
}

impl UpdateProgress {
    pub fn new(current: u64, maximum: u64) -> Self {
        Self {
            current: Some(current),
            maximum: Some(maximum),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushProgressLevel {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCount {
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetColumns {
    pub admin_route: Name,
    pub columns: Vec<ColumnAttributes>,
}

/// Payload of both `Update` and `Created`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangedRanges {
    pub changed_ranges: Vec<ChangedRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub row: usize,
    pub column: usize,
    pub prefix: String,
    pub completions: Vec<CompletionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSelection {
    pub action_states: Vec<RouteState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateUpdateDelete {
    #[serde(default)]
    pub objects_created: Vec<Name>,
    #[serde(default)]
    pub objects_updated: Vec<Name>,
    #[serde(default)]
    pub objects_deleted: Vec<Name>,
}

impl CreateUpdateDelete {
    pub fn is_empty(&self) -> bool {
        self.objects_created.is_empty()
            && self.objects_updated.is_empty()
            && self.objects_deleted.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageIcon {
    #[default]
    Information,
    Warning,
    Critical,
    Question,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardButton {
    Ok,
    Cancel,
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBox {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub icon: MessageIcon,
    pub standard_buttons: Vec<StandardButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl MessageBox {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            icon: MessageIcon::Information,
            standard_buttons: vec![StandardButton::Ok, StandardButton::Cancel],
            resolution: None,
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub items: Vec<ChoiceItem>,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectObjects {
    pub admin_route: Name,
    pub verbose_name_plural: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_text: Option<String>,
    pub single: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeObject {
    pub admin_route: Name,
    pub object: Name,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenFormView {
    pub admin_route: Name,
    pub objects: Vec<Name>,
    pub row: usize,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainWindow {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTableView {
    pub admin_route: Name,
    pub model_context: Name,
    pub title: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list_actions: Vec<Name>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub return_code: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallTranslator {
    pub language: String,
}

/// Everything an action can yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__")]
pub enum ActionStep {
    UpdateProgress(UpdateProgress),
    PushProgressLevel(PushProgressLevel),
    PopProgressLevel,
    RowCount(RowCount),
    SetColumns(SetColumns),
    Update(ChangedRanges),
    Created(ChangedRanges),
    Completion(Completion),
    ChangeSelection(ChangeSelection),
    CreateUpdateDelete(CreateUpdateDelete),
    MessageBox(MessageBox),
    SelectItem(SelectItem),
    SelectObjects(SelectObjects),
    ChangeObject(ChangeObject),
    OpenFormView(OpenFormView),
    MainWindow(MainWindow),
    OpenTableView(OpenTableView),
    Exit(Exit),
    InstallTranslator(InstallTranslator),
}

impl ActionStep {
    /// Blocking steps park the run until the UI answers.
    pub fn blocking(&self) -> bool {
        matches!(
            self,
            ActionStep::MessageBox(_)
                | ActionStep::SelectItem(_)
                | ActionStep::SelectObjects(_)
                | ActionStep::ChangeObject(_)
        )
    }

    pub fn step_type(&self) -> &'static str {
        match self {
            ActionStep::UpdateProgress(_) => "UpdateProgress",
            ActionStep::PushProgressLevel(_) => "PushProgressLevel",
            ActionStep::PopProgressLevel => "PopProgressLevel",
            ActionStep::RowCount(_) => "RowCount",
            ActionStep::SetColumns(_) => "SetColumns",
            ActionStep::Update(_) => "Update",
            ActionStep::Created(_) => "Created",
            ActionStep::Completion(_) => "Completion",
            ActionStep::ChangeSelection(_) => "ChangeSelection",
            ActionStep::CreateUpdateDelete(_) => "CreateUpdateDelete",
            ActionStep::MessageBox(_) => "MessageBox",
            ActionStep::SelectItem(_) => "SelectItem",
            ActionStep::SelectObjects(_) => "SelectObjects",
            ActionStep::ChangeObject(_) => "ChangeObject",
            ActionStep::OpenFormView(_) => "OpenFormView",
            ActionStep::MainWindow(_) => "MainWindow",
            ActionStep::OpenTableView(_) => "OpenTableView",
            ActionStep::Exit(_) => "Exit",
            ActionStep::InstallTranslator(_) => "InstallTranslator",
        }
    }

    /// Steps that patch the caches of a table model.
    pub fn is_model_patch(&self) -> bool {
        matches!(
            self,
            ActionStep::RowCount(_)
                | ActionStep::SetColumns(_)
                | ActionStep::Update(_)
                | ActionStep::Created(_)
                | ActionStep::Completion(_)
                | ActionStep::ChangeSelection(_)
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<UpdateProgress> for ActionStep {
    fn from(value: UpdateProgress) -> Self {
        ActionStep::UpdateProgress(value)
    }
}

impl From<MessageBox> for ActionStep {
    fn from(value: MessageBox) -> Self {
        ActionStep::MessageBox(value)
    }
}

impl From<CreateUpdateDelete> for ActionStep {
    fn from(value: CreateUpdateDelete) -> Self {
        ActionStep::CreateUpdateDelete(value)
    }
}

impl From<RowCount> for ActionStep {
    fn from(value: RowCount) -> Self {
        ActionStep::RowCount(value)
    }
}

#[cfg(test)]
#[path = "tests/step_tests.rs"]
mod tests;
