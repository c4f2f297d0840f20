use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use marketeer_model::ModelTool;
use serde_json::{Value, json};

use super::{PreparedCall, Tool, ToolObject, ToolObjectImpl};
use crate::role::RoleId;
use crate::{Error, ErrorKind};

/// Returns the name of the hand-off tool that transfers control to `target`.
#[inline]
pub fn handoff_tool_name(target: RoleId) -> String {
    format!("handoff_to_{}", target.as_str())
}

/// A resolved entry of the [`Registry`].
#[derive(Clone)]
pub struct ToolRef {
    name: String,
    target: Target,
}

#[derive(Clone)]
enum Target {
    Domain(Arc<dyn ToolObject>),
    Handoff(RoleId),
}

impl ToolRef {
    /// Returns the name the model calls this tool by.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the role this tool hands off to, if it is a hand-off tool.
    #[inline]
    pub fn handoff_target(&self) -> Option<RoleId> {
        match self.target {
            Target::Handoff(target) => Some(target),
            Target::Domain(_) => None,
        }
    }

    /// Returns the definition advertised to the model.
    pub fn definition(&self) -> ModelTool {
        match &self.target {
            Target::Domain(tool) => ModelTool {
                name: self.name.clone(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            },
            Target::Handoff(target) => ModelTool {
                name: self.name.clone(),
                description: format!(
                    "Transfers the conversation to the {}.",
                    target.as_str().replace('_', " ")
                ),
                parameters: json!({
                    "type": "object",
                    "properties": {},
                    "additionalProperties": false,
                }),
            },
        }
    }

    pub(crate) fn prepare(
        &self,
        arguments: Value,
    ) -> Option<Result<PreparedCall, super::Error>> {
        match &self.target {
            Target::Domain(tool) => Some(tool.prepare(arguments)),
            Target::Handoff(_) => None,
        }
    }
}

impl fmt::Debug for ToolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ToolRef");
        s.field("name", &self.name);
        if let Target::Handoff(target) = self.target {
            s.field("handoff", &target);
        }
        s.finish()
    }
}

/// Maps tool names to domain tools and hand-off tools.
#[derive(Clone, Default)]
pub struct Registry {
    tools: HashMap<String, ToolRef>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a domain tool under its own name.
    ///
    /// Fails with [`ErrorKind::InvalidConfig`] if the name is taken.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), Error> {
        let name = tool.name().to_owned();
        let object: Arc<dyn ToolObject> = Arc::new(ToolObjectImpl(tool));
        self.insert(ToolRef {
            name,
            target: Target::Domain(object),
        })
    }

    pub(crate) fn register_handoff(
        &mut self,
        target: RoleId,
    ) -> Result<(), Error> {
        self.insert(ToolRef {
            name: handoff_tool_name(target),
            target: Target::Handoff(target),
        })
    }

    /// Resolves a tool by name.
    pub fn resolve(&self, name: &str) -> Result<&ToolRef, Error> {
        self.tools.get(name).ok_or_else(|| {
            Error::new(ErrorKind::UnknownTool)
                .with_reason(format!("no tool named `{name}` is registered"))
        })
    }

    /// Returns whether a tool with the given name is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn insert(&mut self, tool: ToolRef) -> Result<(), Error> {
        if self.tools.contains_key(&tool.name) {
            return Err(Error::new(ErrorKind::InvalidConfig).with_reason(
                format!("tool `{}` is registered twice", tool.name),
            ));
        }
        trace!("registered tool: {}", tool.name);
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("tools", &names).finish()
    }
}
