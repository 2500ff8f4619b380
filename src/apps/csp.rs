//! Content Security Policy declarations for widgets

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Four independent allow-lists, serialized under `openai/widgetCSP`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetCsp {
    /// Origins the widget may fetch data from
    #[serde(default)]
    pub connect_domains: Vec<String>,
    /// Origins for passive loads: images, fonts, scripts
    #[serde(default)]
    pub resource_domains: Vec<String>,
    /// Origins the widget may navigate the top-level page to
    #[serde(default)]
    pub redirect_domains: Vec<String>,
    /// Origins allowed as embedded frames
    #[serde(default)]
    pub frame_domains: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CspList {
    Connect,
    Resource,
    Redirect,
    Frame,
}

impl fmt::Display for CspList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CspList::Connect => "connect_domains",
            CspList::Resource => "resource_domains",
            CspList::Redirect => "redirect_domains",
            CspList::Frame => "frame_domains",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Must be fixed before the tool can be registered
    Violation,
    /// Allowed, but gets a closer look at review time
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspFinding {
    pub list: CspList,
    pub domain: String,
    pub severity: Severity,
    pub reason: String,
}

impl fmt::Display for CspFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`: {}", self.list, self.domain, self.reason)
    }
}

impl WidgetCsp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(mut self, origin: impl Into<String>) -> Self {
        self.connect_domains.push(origin.into());
        self
    }

    pub fn resource(mut self, origin: impl Into<String>) -> Self {
        self.resource_domains.push(origin.into());
        self
    }

    pub fn redirect(mut self, origin: impl Into<String>) -> Self {
        self.redirect_domains.push(origin.into());
        self
    }

    pub fn frame(mut self, origin: impl Into<String>) -> Self {
        self.frame_domains.push(origin.into());
        self
    }

    fn lists(&self) -> [(CspList, &[String]); 4] {
        [
            (CspList::Connect, self.connect_domains.as_slice()),
            (CspList::Resource, self.resource_domains.as_slice()),
            (CspList::Redirect, self.redirect_domains.as_slice()),
            (CspList::Frame, self.frame_domains.as_slice()),
        ]
    }

    /// Returns every finding across the four lists.
    pub fn lint(&self) -> Vec<CspFinding> {
        let mut findings = Vec::new();
        for (list, domains) in self.lists() {
            for (i, domain) in domains.iter().enumerate() {
                let violation = |reason: &str| CspFinding {
                    list,
                    domain: domain.clone(),
                    severity: Severity::Violation,
                    reason: reason.to_string(),
                };
                if let Some(reason) = origin_problem(domain) {
                    findings.push(violation(&reason));
                } else if domains[..i].contains(domain) {
                    findings.push(violation("listed more than once"));
                }
                if list == CspList::Frame {
                    findings.push(CspFinding {
                        list,
                        domain: domain.clone(),
                        severity: Severity::Review,
                        reason: "embedded frames receive heavier review".to_string(),
                    });
                }
            }
        }
        findings
    }

    pub fn violations(&self) -> Vec<CspFinding> {
        self.lint()
            .into_iter()
            .filter(|f| f.severity == Severity::Violation)
            .collect()
    }
}

fn origin_problem(domain: &str) -> Option<String> {
    if domain.contains('*') {
        return Some("wildcards are not allowed".to_string());
    }
    let url = match Url::parse(domain) {
        Ok(url) => url,
        Err(e) => return Some(format!("not a valid origin ({})", e)),
    };
    if url.scheme() != "https" {
        return Some("only https origins are allowed".to_string());
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Some("origin has no host".to_string());
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Some("list the bare origin without a path".to_string());
    }
    None
}
