//! Declarative table of known credentials.
//!
//! Each [`CredentialSpec`] maps a stable identity to the environment
//! variable it satisfies and the tool and node-type names that require it.
//! The registry is loaded once per process and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Metadata for one known credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSpec {
    /// Stable identity, provider plus purpose (e.g. `anthropic/api`).
    pub id: String,
    /// Environment variable the credential satisfies.
    pub env_var: String,
    /// Tool names that require it.
    #[serde(default)]
    pub tools: BTreeSet<String>,
    /// Workload node types that require it.
    #[serde(default)]
    pub node_types: BTreeSet<String>,
    /// Where the operator can obtain a key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
    /// Short human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CredentialSpec {
    pub fn new(id: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            env_var: env_var.into(),
            tools: BTreeSet::new(),
            node_types: BTreeSet::new(),
            help_url: None,
            description: None,
        }
    }

    /// Add a tool name that requires this credential.
    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.insert(name.into());
        self
    }

    /// Add a node type that requires this credential.
    pub fn node_type(mut self, name: impl Into<String>) -> Self {
        self.node_types.insert(name.into());
        self
    }

    pub fn help_url(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Read-only registry of credential specs, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    by_id: BTreeMap<String, CredentialSpec>,
}

impl SpecRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of specs.
    pub fn from_specs(specs: impl IntoIterator<Item = CredentialSpec>) -> Self {
        let mut registry = Self::new();
        registry.extend_with(specs);
        registry
    }

    /// Extend the registry with additional specs.
    ///
    /// Identities are unique: the first spec registered for an id wins and
    /// later duplicates are dropped with a warning.
    pub fn extend_with(&mut self, specs: impl IntoIterator<Item = CredentialSpec>) {
        for spec in specs {
            if self.by_id.contains_key(&spec.id) {
                tracing::warn!("Duplicate credential spec ignored: {}", spec.id);
                continue;
            }
            self.by_id.insert(spec.id.clone(), spec);
        }
    }

    /// The built-in spec table for standard Hive tools and node types.
    pub fn builtin() -> Self {
        Self::from_specs([
            CredentialSpec::new("anthropic/api", "ANTHROPIC_API_KEY")
                .node_type("llm")
                .node_type("agent")
                .help_url("https://console.anthropic.com/settings/keys")
                .description("Anthropic API key used by LLM and agent nodes"),
            CredentialSpec::new("tavily/search", "TAVILY_API_KEY")
                .tool("web_search")
                .tool("search_news")
                .help_url("https://app.tavily.com/home")
                .description("Tavily search API key"),
            CredentialSpec::new("firecrawl/scrape", "FIRECRAWL_API_KEY")
                .tool("scrape_url")
                .tool("crawl_site")
                .help_url("https://www.firecrawl.dev/app/api-keys")
                .description("Firecrawl key for URL scraping tools"),
            CredentialSpec::new("github/api", "GITHUB_TOKEN")
                .tool("github_create_issue")
                .tool("github_search_code")
                .help_url("https://github.com/settings/tokens")
                .description("GitHub personal access token"),
            CredentialSpec::new("slack/bot", "SLACK_BOT_TOKEN")
                .tool("slack_post_message")
                .help_url("https://api.slack.com/apps")
                .description("Slack bot token for channel posting"),
            CredentialSpec::new("exa/search", "EXA_API_KEY")
                .tool("exa_search")
                .help_url("https://dashboard.exa.ai/api-keys")
                .description("Exa semantic search API key"),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&CredentialSpec> {
        self.by_id.get(id)
    }

    /// Iterate over all specs in deterministic (id) order.
    pub fn specs(&self) -> impl Iterator<Item = &CredentialSpec> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_non_empty_and_sorted() {
        let registry = SpecRegistry::builtin();
        assert!(!registry.is_empty());

        let ids: Vec<&str> = registry.specs().map(|s| s.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let registry = SpecRegistry::from_specs([
            CredentialSpec::new("svc/api", "FIRST_KEY"),
            CredentialSpec::new("svc/api", "SECOND_KEY"),
        ]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("svc/api").unwrap().env_var, "FIRST_KEY");
    }

    #[test]
    fn builder_collects_requirements() {
        let spec = CredentialSpec::new("svc/api", "SVC_KEY")
            .tool("b_tool")
            .tool("a_tool")
            .node_type("llm")
            .help_url("https://example.com")
            .description("test");

        assert_eq!(
            spec.tools.iter().collect::<Vec<_>>(),
            vec!["a_tool", "b_tool"]
        );
        assert!(spec.node_types.contains("llm"));
        assert_eq!(spec.help_url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn spec_json_roundtrip() {
        let spec = CredentialSpec::new("svc/api", "SVC_KEY").tool("a_tool");
        let json = serde_json::to_string(&spec).unwrap();
        let parsed: CredentialSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }
}
