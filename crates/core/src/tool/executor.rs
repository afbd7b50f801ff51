use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, ready};
use scout_model::ModelTool;

use crate::tool::{Error, ToolObject, ToolObservation, ToolRequest};

/// An executor that handles tool call requests from the model.
pub struct Executor {
    tools: BTreeMap<String, Box<dyn ToolObject>>,
    timeout: Option<Duration>,
}

impl Executor {
    pub fn with_tools(
        tools: Vec<Box<dyn ToolObject>>,
        timeout: Option<Duration>,
    ) -> Self {
        let tools = tools
            .into_iter()
            .map(|tool| (tool.name().to_owned(), tool))
            .collect();
        Self { tools, timeout }
    }

    /// Returns the tool catalog, ordered by name.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Runs the requested tool, turning every failure into an observation.
    ///
    /// Unknown tool names are answered without running anything.
    pub fn dispatch(
        &self,
        req: &ToolRequest,
    ) -> BoxFuture<'static, ToolObservation> {
        let span = debug_span!("tool executor", tool = %req.tool_name);
        let _enter = span.enter();

        let call_id = req.call_id.clone();
        let tool_name = req.tool_name.clone();
        let Some(tool) = self.tools.get(&req.tool_name) else {
            warn!("tool not found: {}", req.tool_name);
            let available: Vec<&str> =
                self.tools.keys().map(String::as_str).collect();
            let err = Error::unknown_tool().with_reason(format!(
                "{} is not a valid tool, try one of [{}].",
                req.tool_name,
                available.join(", ")
            ));
            let observation =
                ToolObservation::from_result(call_id, tool_name, Err(err));
            return ready(observation).boxed();
        };

        trace!("running tool ({call_id}) with args: {}", req.arguments);
        let execution = tool.execute(req.arguments.clone());
        let timeout = self.timeout;
        async move {
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, execution)
                    .await
                    .unwrap_or_else(|_| {
                        warn!("tool {tool_name} timed out");
                        Err(Error::timeout().with_reason(format!(
                            "no result after {} seconds",
                            limit.as_secs_f32()
                        )))
                    }),
                None => execution.await,
            };
            ToolObservation::from_result(call_id, tool_name, result)
        }
        .boxed()
    }
}
