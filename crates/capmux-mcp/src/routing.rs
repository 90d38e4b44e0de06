//! Capability detection for free-text requests
//!
//! Resolution order:
//! 1. A configured capability name appearing literally in the request
//! 2. Keywords a server declares in `metadata.keywords`
//! 3. Built-in domain keyword tables (issue tracking, code hosting, docs),
//!    each routed to the first capability whose name matches the domain
//! 4. The first configured capability

use capmux_core::Configuration;
use tracing::debug;

/// A domain keyword table and the capability names that serve it
#[derive(Debug, Clone)]
pub struct KeywordRoute {
    pub domain: &'static str,
    pub keywords: &'static [&'static str],
    pub capability_hints: &'static [&'static str],
}

pub const DEFAULT_ROUTES: &[KeywordRoute] = &[
    KeywordRoute {
        domain: "issue_tracking",
        keywords: &[
            "ticket", "issue", "project", "sprint", "epic", "story", "stories", "bug", "backlog",
        ],
        capability_hints: &["jira", "atlassian", "issue", "ticket"],
    },
    KeywordRoute {
        domain: "code_hosting",
        keywords: &[
            "repository", "repositories", "repo", "commit", "branch", "pull request", "merge",
            "code",
        ],
        capability_hints: &["github", "gitlab", "bitbucket", "git", "code"],
    },
    KeywordRoute {
        domain: "documentation",
        keywords: &["wiki", "page", "documentation", "article", "confluence", "docs"],
        capability_hints: &["confluence", "wiki", "docs", "notion", "documentation"],
    },
];

struct RouteTarget {
    capability: String,
    keywords: Vec<String>,
}

/// Picks a capability for a request
pub struct CapabilityRouter {
    targets: Vec<RouteTarget>,
    routes: &'static [KeywordRoute],
}

impl CapabilityRouter {
    /// Route over enabled servers, or over all servers when none is enabled
    pub fn from_configuration(config: &Configuration) -> Self {
        let enabled = config.get_enabled_servers();
        let servers: Vec<_> = if enabled.is_empty() {
            config.servers().iter().collect()
        } else {
            enabled
        };

        Self {
            targets: servers
                .into_iter()
                .map(|server| RouteTarget {
                    capability: server.capability.clone(),
                    keywords: server.keywords(),
                })
                .collect(),
            routes: DEFAULT_ROUTES,
        }
    }

    /// Replace the built-in keyword tables
    pub fn with_routes(mut self, routes: &'static [KeywordRoute]) -> Self {
        self.routes = routes;
        self
    }

    /// Capability for `request`; `None` only when nothing is configured
    pub fn detect(&self, request: &str) -> Option<&str> {
        let text = request.to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if let Some(target) = self
            .targets
            .iter()
            .find(|t| text.contains(&t.capability.to_lowercase()))
        {
            debug!(capability = %target.capability, "Routed by capability name");
            return Some(target.capability.as_str());
        }

        if let Some(target) = self
            .targets
            .iter()
            .find(|t| t.keywords.iter().any(|kw| matches_keyword(&text, &words, kw)))
        {
            debug!(capability = %target.capability, "Routed by configured keyword");
            return Some(target.capability.as_str());
        }

        for route in self.routes {
            if !route.keywords.iter().any(|kw| matches_keyword(&text, &words, kw)) {
                continue;
            }
            let hit = self.targets.iter().find(|t| {
                let name = t.capability.to_lowercase();
                route.capability_hints.iter().any(|hint| name.contains(hint))
            });
            if let Some(target) = hit {
                debug!(capability = %target.capability, domain = route.domain, "Routed by domain keyword");
                return Some(target.capability.as_str());
            }
        }

        self.targets.first().map(|t| t.capability.as_str())
    }
}

/// Phrases match as substrings, single words as whole words or plurals
fn matches_keyword(text: &str, words: &[&str], keyword: &str) -> bool {
    if keyword.contains(' ') {
        return text.contains(keyword);
    }
    words.iter().any(|word| {
        *word == keyword
            || word
                .strip_suffix('s')
                .is_some_and(|stem| stem == keyword || stem.strip_suffix('e') == Some(keyword))
    })
}
