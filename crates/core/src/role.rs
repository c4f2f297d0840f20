//! Roles and the static hand-off graph between them.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

use marketeer_model::ModelTool;

use crate::tool::{Registry, ToolRef};
use crate::{Error, ErrorKind};

/// Identifies one of the pipeline roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleId {
    /// Talks to the user and kicks off the pipeline.
    UserInterface,
    /// Fetches the website.
    WebsiteScraper,
    /// Analyzes the scraped content.
    Analyst,
    /// Proposes a campaign.
    CampaignIdea,
    /// Writes the final copy.
    Copywriter,
}

impl RoleId {
    /// All role identifiers, in pipeline order.
    pub const ALL: [RoleId; 5] = [
        RoleId::UserInterface,
        RoleId::WebsiteScraper,
        RoleId::Analyst,
        RoleId::CampaignIdea,
        RoleId::Copywriter,
    ];

    /// Returns the configuration key of this role.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            RoleId::UserInterface => "user_interface_agent",
            RoleId::WebsiteScraper => "website_scraper_agent",
            RoleId::Analyst => "analyst_agent",
            RoleId::CampaignIdea => "campaign_idea_agent",
            RoleId::Copywriter => "copywriter_agent",
        }
    }
}

impl Display for RoleId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidConfig)
                    .with_reason(format!("unknown role `{s}`"))
            })
    }
}

/// The declarative description of a role, before its tools are resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleDefinition {
    /// The role identifier.
    pub id: RoleId,
    /// The display name. Must be unique within a [`RoleSet`].
    pub name: String,
    /// The instructions sent to the backend as the system prompt.
    pub instructions: String,
    /// Names of the tools this role may call, hand-off tools included.
    pub tools: Vec<String>,
}

impl RoleDefinition {
    /// Creates a definition without tools.
    pub fn new<S1, S2>(id: RoleId, name: S1, instructions: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            id,
            name: name.into(),
            instructions: instructions.into(),
            tools: vec![],
        }
    }

    /// Allows the role to call the named tool.
    pub fn with_tool<S: Into<String>>(mut self, name: S) -> Self {
        self.tools.push(name.into());
        self
    }
}

/// A role whose tool names have been resolved against a registry.
#[derive(Clone, Debug)]
pub struct Role {
    id: RoleId,
    name: String,
    instructions: String,
    tools: Vec<ToolRef>,
}

impl Role {
    /// Returns the role identifier.
    #[inline]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the display name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the system prompt for this role.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.instructions
    }

    /// Returns the tools this role may call.
    #[inline]
    pub fn allowed_tools(&self) -> &[ToolRef] {
        &self.tools
    }

    /// Looks up an allowed tool by name.
    pub fn allowed_tool(&self, name: &str) -> Option<&ToolRef> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Returns `true` if the role cannot hand off to anyone.
    ///
    /// A text reply from a terminal role ends the run.
    pub fn is_terminal(&self) -> bool {
        self.tools.iter().all(|tool| tool.handoff_target().is_none())
    }

    pub(crate) fn tool_definitions(&self) -> Vec<ModelTool> {
        self.tools.iter().map(ToolRef::definition).collect()
    }
}

/// An immutable set of roles sharing one tool registry.
#[derive(Clone, Debug)]
pub struct RoleSet {
    roles: BTreeMap<RoleId, Role>,
    registry: Arc<Registry>,
}

impl RoleSet {
    /// Returns a builder over the given registry of domain tools.
    #[inline]
    pub fn builder(registry: Registry) -> RoleSetBuilder {
        RoleSetBuilder {
            registry,
            definitions: vec![],
        }
    }

    /// Returns the role with the given identifier.
    #[inline]
    pub fn get(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id)
    }

    /// Returns all roles, in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Returns the registry backing this set.
    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// A builder for [`RoleSet`].
#[derive(Debug)]
pub struct RoleSetBuilder {
    registry: Registry,
    definitions: Vec<RoleDefinition>,
}

impl RoleSetBuilder {
    /// Adds a role definition.
    pub fn role(mut self, definition: RoleDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Registers the hand-off tools and resolves every declared tool.
    ///
    /// Fails with [`ErrorKind::DuplicateRoleName`] when two roles share a
    /// name or an identifier, and with [`ErrorKind::UnknownTool`] when a
    /// role declares a tool that does not exist, including hand-offs to
    /// roles missing from the set.
    pub fn build(self) -> Result<RoleSet, Error> {
        let Self {
            mut registry,
            definitions,
        } = self;

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for definition in &definitions {
            if !names.insert(definition.name.as_str()) {
                return Err(Error::new(ErrorKind::DuplicateRoleName)
                    .with_reason(format!(
                        "role name `{}` is used twice",
                        definition.name
                    )));
            }
            if !ids.insert(definition.id) {
                return Err(Error::new(ErrorKind::DuplicateRoleName)
                    .with_reason(format!(
                        "role `{}` is defined twice",
                        definition.id
                    )));
            }
        }

        for definition in &definitions {
            registry.register_handoff(definition.id)?;
        }

        let mut roles = BTreeMap::new();
        for definition in definitions {
            let tools = definition
                .tools
                .iter()
                .map(|name| {
                    registry.resolve(name).cloned().map_err(|err| {
                        err.with_reason(format!(
                            "role `{}` declares unknown tool `{name}`",
                            definition.id
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            debug!("role {} may call {} tools", definition.id, tools.len());
            roles.insert(
                definition.id,
                Role {
                    id: definition.id,
                    name: definition.name,
                    instructions: definition.instructions,
                    tools,
                },
            );
        }

        Ok(RoleSet {
            roles,
            registry: Arc::new(registry),
        })
    }
}
