//! Per-column policies turning field values into cell roles and back.

use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    domain::{ChoiceItem, DataCell, ItemRole},
    Name,
};

use crate::{
    admin::{DynamicAttributes, FieldAttributes},
    naming::NamingContext,
    value::{bind_object, resolve_object, Value},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Delegate {
    Text { max_length: Option<usize> },
    Integer,
    Float { precision: u8 },
    Boolean,
    Date,
    DateTime,
    Enumeration,
    ManyToOne { display_field: Option<String> },
    OneToMany,
    File,
    Image,
    Color,
    Custom(String),
}

impl Delegate {
    pub fn text() -> Self {
        Delegate::Text { max_length: None }
    }

    pub fn name(&self) -> &str {
        match self {
            Delegate::Text { .. } => "text",
            Delegate::Integer => "integer",
            Delegate::Float { .. } => "float",
            Delegate::Boolean => "boolean",
            Delegate::Date => "date",
            Delegate::DateTime => "datetime",
            Delegate::Enumeration => "enumeration",
            Delegate::ManyToOne { .. } => "many2one",
            Delegate::OneToMany => "one2many",
            Delegate::File => "file",
            Delegate::Image => "image",
            Delegate::Color => "color",
            Delegate::Custom(name) => name,
        }
    }

    /// Collections cannot be compared for equality, any write counts as a change.
    pub fn is_collection(&self) -> bool {
        matches!(self, Delegate::OneToMany)
    }

    pub fn edit_value(&self, value: &Value, root: &NamingContext) -> serde_json::Value {
        match value {
            Value::Object(obj) => match bind_object(root, obj) {
                Ok(name) => serde_json::to_value(name).unwrap_or_default(),
                Err(err) => {
                    tracing::warn!(object = obj.id().0, "cannot bind related object: {err}");
                    serde_json::Value::Null
                }
            },
            Value::Objects(objs) => serde_json::Value::Array(
                objs.iter()
                    .filter_map(|obj| bind_object(root, obj).ok())
                    .filter_map(|name| serde_json::to_value(name).ok())
                    .collect(),
            ),
            other => other.to_json(),
        }
    }

    pub fn preview(&self, value: &Value, choices: &[ChoiceItem]) -> String {
        match (self, value) {
            (_, Value::Null) => String::new(),
            (Delegate::Float { precision }, Value::Float(v)) => {
                format!("{:.*}", *precision as usize, v)
            }
            (Delegate::Float { precision }, Value::Int(v)) => {
                format!("{:.*}", *precision as usize, *v as f64)
            }
            (Delegate::Enumeration, value) => {
                let raw = value.to_json();
                choices
                    .iter()
                    .find(|choice| choice.value == raw)
                    .map(|choice| choice.verbose_name.clone())
                    .unwrap_or_else(|| value.to_string())
            }
            (
                Delegate::ManyToOne {
                    display_field: Some(field),
                },
                Value::Object(obj),
            ) => obj.get(field).to_string(),
            (Delegate::OneToMany, Value::Objects(objs)) => format!("{} items", objs.len()),
            (_, value) => value.to_string(),
        }
    }

    /// Fill the value-dependent roles of `cell`.
    pub fn fill_roles(
        &self,
        cell: &mut DataCell,
        value: &Value,
        attributes: &FieldAttributes,
        dynamic: &DynamicAttributes,
        root: &NamingContext,
    ) {
        let choices = dynamic.choices.as_deref().unwrap_or(&attributes.choices);
        cell.set_role(ItemRole::Edit, self.edit_value(value, root));
        cell.set_role(
            ItemRole::Preview,
            serde_json::Value::String(self.preview(value, choices)),
        );
        if matches!(self, Delegate::Enumeration) {
            cell.set_role(
                ItemRole::Completions,
                serde_json::to_value(choices).unwrap_or_default(),
            );
        }
        cell.set_role(
            ItemRole::FocusPolicy,
            serde_json::to_value(attributes.focus_policy).unwrap_or_default(),
        );
        cell.set_role(
            ItemRole::Visible,
            serde_json::Value::Bool(dynamic.visible.unwrap_or(true)),
        );
        cell.set_role(
            ItemRole::Nullable,
            serde_json::Value::Bool(dynamic.nullable.unwrap_or(attributes.nullable)),
        );
        let tooltip = dynamic.tooltip.clone().or_else(|| attributes.tooltip.clone());
        cell.set_role(
            ItemRole::ToolTip,
            tooltip.map(serde_json::Value::String).unwrap_or_default(),
        );
    }

    /// Convert a value sent by the UI into a field value.
    pub fn from_wire(
        &self,
        value: &serde_json::Value,
        root: &NamingContext,
    ) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Delegate::Text { max_length } => {
                let text = expect_str(value)?;
                match max_length {
                    Some(max) if text.chars().count() > *max => {
                        Err(format!("text is longer than {max} characters"))
                    }
                    _ => Ok(Value::Text(text.to_string())),
                }
            }
            Delegate::File | Delegate::Image | Delegate::Color => {
                Ok(Value::Text(expect_str(value)?.to_string()))
            }
            Delegate::Integer => match value {
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(Value::Int)
                    .ok_or_else(|| format!("{n} is not an integer")),
                serde_json::Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|err| err.to_string()),
                other => Err(format!("{other} is not an integer")),
            },
            Delegate::Float { .. } => match value {
                serde_json::Value::Number(n) => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| format!("{n} is not a number")),
                serde_json::Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|err| err.to_string()),
                other => Err(format!("{other} is not a number")),
            },
            Delegate::Boolean => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| format!("{value} is not a boolean")),
            Delegate::Date => NaiveDate::parse_from_str(expect_str(value)?, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|err| err.to_string()),
            Delegate::DateTime => DateTime::parse_from_rfc3339(expect_str(value)?)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .map_err(|err| err.to_string()),
            Delegate::ManyToOne { .. } => {
                let name: Name =
                    serde_json::from_value(value.clone()).map_err(|err| err.to_string())?;
                resolve_object(root, &name)
                    .map(Value::Object)
                    .map_err(|err| err.to_string())
            }
            Delegate::OneToMany => {
                let names: Vec<Name> =
                    serde_json::from_value(value.clone()).map_err(|err| err.to_string())?;
                names
                    .iter()
                    .map(|name| resolve_object(root, name).map_err(|err| err.to_string()))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Objects)
            }
            Delegate::Enumeration | Delegate::Custom(_) => Ok(Value::from_json(value)),
        }
    }
}

fn expect_str(value: &serde_json::Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("{value} is not a string"))
}

#[cfg(test)]
#[path = "tests/delegate_tests.rs"]
mod tests;
