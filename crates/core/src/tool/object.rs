use futures_util::future::{BoxFuture, FutureExt, ready};
use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolArguments, ToolResult};

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(
        &self,
        arguments: ToolArguments,
    ) -> BoxFuture<'static, ToolResult>;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObjectImpl<T> {
    fn parse_input(&self, arguments: ToolArguments) -> Result<T::Input, Error> {
        match arguments {
            // A bare string is free text, whichever way it arrived.
            ToolArguments::Text(text)
            | ToolArguments::Structured(Value::String(text)) => {
                self.0.input_from_text(&text)
            }
            ToolArguments::Structured(value) => serde_json::from_value(value)
                .map_err(|err| {
                    Error::invalid_input().with_reason(format!("{err}"))
                }),
        }
    }
}

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        &self,
        arguments: ToolArguments,
    ) -> BoxFuture<'static, ToolResult> {
        let input = match self.parse_input(arguments) {
            Ok(input) => input,
            Err(err) => {
                debug!("rejected tool input: {err}");
                return ready(Err(err)).boxed();
            }
        };
        self.0
            .execute(input)
            .instrument(debug_span!("tool execute", tool = self.0.name()))
            .boxed()
    }
}
