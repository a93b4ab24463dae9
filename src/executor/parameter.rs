use crate::core::Result;
use crate::driver::{DriverParameter, DriverRequest};
use crate::mapping::BoundCommand;
use crate::scripting::Parameter;
use log::debug;

/// Sets the bound values of a command on a driver request.
pub trait ParameterHandler: Send {
    fn parameter_object(&self) -> Parameter;

    fn set_parameters(&self, request: DriverRequest) -> Result<DriverRequest>;
}

impl<H: ParameterHandler + ?Sized> ParameterHandler for Box<H> {
    fn parameter_object(&self) -> Parameter {
        (**self).parameter_object()
    }

    fn set_parameters(&self, request: DriverRequest) -> Result<DriverRequest> {
        (**self).set_parameters(request)
    }
}

pub struct DefaultParameterHandler {
    command: BoundCommand,
}

impl DefaultParameterHandler {
    pub fn new(command: BoundCommand) -> Self {
        Self { command }
    }
}

impl ParameterHandler for DefaultParameterHandler {
    fn parameter_object(&self) -> Parameter {
        self.command.parameter.clone()
    }

    fn set_parameters(&self, mut request: DriverRequest) -> Result<DriverRequest> {
        request.parameters = self
            .command
            .parameter_mappings
            .iter()
            .zip(self.command.values.iter())
            .enumerate()
            .map(|(i, (mapping, value))| DriverParameter {
                index: i + 1,
                value: mapping.mode.is_input().then(|| value.clone()),
                mode: mapping.mode,
                jdbc_type: mapping.jdbc_type.clone(),
                numeric_scale: mapping.numeric_scale,
            })
            .collect();

        debug!("==> Parameters: {}", describe_parameters(&request.parameters));
        Ok(request)
    }
}

/// `1(INTEGER), bob(TEXT), null` in the style of the statement log.
pub fn describe_parameters(parameters: &[DriverParameter]) -> String {
    parameters
        .iter()
        .map(|p| match &p.value {
            Some(value) if value.is_null() => "null".to_string(),
            Some(value) => format!("{}({})", value, value.type_name()),
            None => format!("<{}>", p.mode),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
