use std::pin::Pin;

use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolResult};

pub(crate) type PreparedCall = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    /// Validates the arguments and returns the pending invocation.
    ///
    /// Nothing runs until the returned future is polled.
    fn prepare(&self, arguments: Value) -> Result<PreparedCall, Error>;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn prepare(&self, arguments: Value) -> Result<PreparedCall, Error> {
        let input: T::Input = serde_json::from_value(arguments)?;
        let span = debug_span!("tool execute", tool = self.0.name());
        Ok(Box::pin(self.0.execute(input).instrument(span)))
    }
}
