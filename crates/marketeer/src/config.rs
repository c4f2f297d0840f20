use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use marketeer_core::role::RoleId;
use marketeer_core::{Error, ErrorKind};
use serde::Deserialize;

/// Display name and instructions of one role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    /// The display name.
    pub name: String,
    /// The system prompt.
    pub instructions: String,
}

/// Role configuration for every pipeline role.
///
/// The file is TOML with one `[agents.<role_id>]` table per role:
///
/// ```toml
/// [agents.user_interface_agent]
/// name = "User Interface Agent"
/// instructions = "Greet the user and ask for a website URL."
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentsConfig {
    agents: BTreeMap<RoleId, AgentConfig>,
}

#[derive(Deserialize)]
struct RawConfig {
    agents: Option<BTreeMap<String, RawAgent>>,
}

#[derive(Deserialize)]
struct RawAgent {
    name: Option<String>,
    instructions: Option<String>,
}

impl AgentsConfig {
    /// Reads and parses the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::InvalidConfig)
                .with_reason(format!("cannot read {}: {err}", path.display()))
        })?;
        debug!("loaded agents config from {}", path.display());
        text.parse()
    }

    /// Returns the configuration of the given role.
    #[inline]
    pub fn get(&self, id: RoleId) -> Option<&AgentConfig> {
        self.agents.get(&id)
    }
}

impl FromStr for AgentsConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawConfig = toml::from_str(s).map_err(|err| {
            Error::new(ErrorKind::InvalidConfig).with_reason(err.to_string())
        })?;
        let mut raw_agents = raw.agents.ok_or_else(|| missing_key("agents"))?;

        let mut agents = BTreeMap::new();
        for id in RoleId::ALL {
            let key = format!("agents.{id}");
            let raw_agent = raw_agents
                .remove(id.as_str())
                .ok_or_else(|| missing_key(&key))?;
            let name = raw_agent
                .name
                .ok_or_else(|| missing_key(&format!("{key}.name")))?;
            let instructions = raw_agent
                .instructions
                .ok_or_else(|| missing_key(&format!("{key}.instructions")))?;
            agents.insert(id, AgentConfig { name, instructions });
        }

        for unknown in raw_agents.keys() {
            warn!("ignoring unknown agent `{unknown}` in config");
        }

        Ok(Self { agents })
    }
}

fn missing_key(key: &str) -> Error {
    Error::new(ErrorKind::ConfigKeyMissing).with_reason(format!("`{key}`"))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    const FULL: &str = include_str!("../../../agents_config.toml");

    #[test]
    fn test_parse_full() {
        let config: AgentsConfig = FULL.parse().unwrap();
        for id in RoleId::ALL {
            let agent = config.get(id).unwrap();
            assert!(!agent.name.is_empty());
            assert!(!agent.instructions.is_empty());
        }
    }

    #[test]
    fn test_missing_role() {
        let text = FULL.replace("[agents.analyst_agent]", "[agents.sales]");
        let err = text.parse::<AgentsConfig>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigKeyMissing);
        assert_eq!(err.reason(), "`agents.analyst_agent`");
    }

    #[test]
    fn test_missing_field() {
        let text = r#"
[agents.user_interface_agent]
name = "UI"
"#;
        let err = text.parse::<AgentsConfig>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigKeyMissing);
        assert_eq!(err.reason(), "`agents.user_interface_agent.instructions`");
    }

    #[test]
    fn test_missing_agents_table() {
        let err = "title = \"x\"".parse::<AgentsConfig>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigKeyMissing);
    }

    #[test]
    fn test_malformed() {
        let err = "[agents".parse::<AgentsConfig>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let text = "[agents.copywriter_agent]\nname = 42\n";
        let err = text.parse::<AgentsConfig>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = AgentsConfig::load(file.path()).unwrap();
        assert_eq!(config, FULL.parse::<AgentsConfig>().unwrap());

        let dir = tempfile::tempdir().unwrap();
        let err = AgentsConfig::load(dir.path().join("missing.toml"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
