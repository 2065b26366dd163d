use std::sync::Arc;

use crate::value::{Entity, ObjectRef};

pub trait Validator: Send + Sync {
    /// Messages describing why `obj` cannot be flushed; empty when valid.
    fn validate_object(&self, obj: &ObjectRef) -> Vec<String>;

    fn is_valid(&self, obj: &ObjectRef) -> bool {
        self.validate_object(obj).is_empty()
    }
}

pub struct NoValidation;

impl Validator for NoValidation {
    fn validate_object(&self, _obj: &ObjectRef) -> Vec<String> {
        Vec::new()
    }
}

type Rule = Arc<dyn Fn(&Entity) -> Option<String> + Send + Sync>;

/// Checks required fields, then custom rules in registration order.
#[derive(Default, Clone)]
pub struct EntityValidator {
    required: Vec<(String, String)>,
    rules: Vec<Rule>,
}

impl EntityValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, field: impl Into<String>, verbose_name: impl Into<String>) -> Self {
        self.required.push((field.into(), verbose_name.into()));
        self
    }

    pub fn rule(mut self, rule: impl Fn(&Entity) -> Option<String> + Send + Sync + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }
}

impl Validator for EntityValidator {
    fn validate_object(&self, obj: &ObjectRef) -> Vec<String> {
        let mut messages: Vec<String> = self
            .required
            .iter()
            .filter(|(field, _)| {
                let value = obj.get(field);
                value.is_null() || value.as_str().is_some_and(|text| text.trim().is_empty())
            })
            .map(|(_, verbose_name)| format!("{verbose_name} is a required field"))
            .collect();
        messages.extend(self.rules.iter().filter_map(|rule| rule(obj.as_ref())));
        messages
    }
}

#[cfg(test)]
#[path = "tests/validator_tests.rs"]
mod tests;
