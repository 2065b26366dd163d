use shared::{
    error::ProtocolError,
    step::{ActionStep, StandardButton},
    Name,
};

use crate::{
    error::ActionError,
    naming::NamingContext,
    value::{resolve_object, ObjectRef},
};

/// Typed answer of the UI to a blocking step.
#[derive(Debug, Clone)]
pub enum StepResult {
    Button(StandardButton),
    Value(serde_json::Value),
    Object(Option<ObjectRef>),
    Objects(Vec<ObjectRef>),
}

impl StepResult {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            StepResult::Button(StandardButton::Ok) | StepResult::Button(StandardButton::Yes)
        )
    }
}

fn unexpected(step: &ActionStep, err: impl std::fmt::Display) -> ActionError {
    let err = ProtocolError::UnexpectedResponse {
        step_type: step.step_type().to_string(),
        message: err.to_string(),
    };
    ActionError::programming(err.to_string())
}

/// Interpret `response` in terms of the step that asked for it.
pub fn deserialize_result(
    root: &NamingContext,
    last_step: Option<&ActionStep>,
    response: serde_json::Value,
) -> Result<StepResult, ActionError> {
    let Some(step) = last_step else {
        return Ok(StepResult::Value(response));
    };
    match step {
        ActionStep::MessageBox(_) => serde_json::from_value::<StandardButton>(response)
            .map(StepResult::Button)
            .map_err(|err| unexpected(step, err)),
        ActionStep::SelectObjects(_) => {
            let names: Vec<Name> =
                serde_json::from_value(response).map_err(|err| unexpected(step, err))?;
            let objects = names
                .iter()
                .map(|name| resolve_object(root, name))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(StepResult::Objects(objects))
        }
        ActionStep::ChangeObject(_) => {
            let name: Option<Name> =
                serde_json::from_value(response).map_err(|err| unexpected(step, err))?;
            match name {
                Some(name) => Ok(StepResult::Object(Some(resolve_object(root, &name)?))),
                None => Ok(StepResult::Object(None)),
            }
        }
        _ => Ok(StepResult::Value(response)),
    }
}
