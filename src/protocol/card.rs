//! Capability descriptors published by agents at their well-known path

use serde::{Deserialize, Serialize};

/// Descriptor an agent publishes to advertise what it can do
///
/// # Examples
/// ```
/// use mortgage_router::protocol::{CapabilityDescriptor, Skill};
///
/// let card = CapabilityDescriptor::new("credit_risk_agent", "http://localhost:10002/")
///     .with_description("Credit risk assessment for mortgage applicants")
///     .with_skill(Skill::new("credit_risk", "Credit risk analysis", &["risk", "credit"]));
///
/// assert!(card.skills[0].tags.contains(&"risk".to_string()));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityDescriptor {
    /// Unique key in the registry
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Address tasks are sent to
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, alias = "defaultInputModes")]
    pub input_modes: Vec<String>,
    #[serde(default, alias = "defaultOutputModes")]
    pub output_modes: Vec<String>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
}

/// One advertised skill
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Transport features an agent supports
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, alias = "pushNotifications")]
    pub push_notifications: bool,
}

impl CapabilityDescriptor {
    pub fn new<N: Into<String>, U: Into<String>>(name: N, url: U) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: url.into(),
            version: "1.0.0".to_string(),
            input_modes: vec!["text".to_string()],
            output_modes: vec!["text".to_string()],
            skills: Vec::new(),
            capabilities: AgentCapabilities::default(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Case-insensitive substring match against name, description, skill names and tags
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() {
            return false;
        }

        self.name.to_lowercase().contains(&keyword)
            || self.description.to_lowercase().contains(&keyword)
            || self.skills.iter().any(|skill| {
                skill.name.to_lowercase().contains(&keyword)
                    || skill
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&keyword))
            })
    }
}

impl Skill {
    pub fn new(id: &str, name: &str, tags: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }
}
