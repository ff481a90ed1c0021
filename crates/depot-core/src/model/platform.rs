use serde::{Deserialize, Serialize};

/// Platform filters declared on a plugin or non-plugin entry.
///
/// Each field is a comma separated list. An absent, empty or `*` list matches
/// every environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nl: Option<String>,
}

impl PlatformConstraints {
    /// Whether an entry with these constraints is installable into `environment`.
    pub fn matches(&self, environment: &Environment) -> bool {
        matches_token(self.os.as_deref(), &environment.os)
            && matches_token(self.ws.as_deref(), &environment.ws)
            && matches_token(self.arch.as_deref(), &environment.arch)
            && matches_locale(self.nl.as_deref(), &environment.nl)
    }
}

fn is_wildcard(candidates: Option<&str>) -> bool {
    match candidates {
        None => true,
        Some(list) => {
            let list = list.trim();
            list.is_empty() || list == "*"
        }
    }
}

fn matches_token(candidates: Option<&str>, value: &str) -> bool {
    if is_wildcard(candidates) {
        return true;
    }
    candidates
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .any(|token| token == "*" || token.eq_ignore_ascii_case(value))
}

// Locales match on prefix in either direction: `en` accepts `en_US` and vice versa.
fn matches_locale(candidates: Option<&str>, value: &str) -> bool {
    if is_wildcard(candidates) {
        return true;
    }
    let value = value.to_ascii_lowercase();
    candidates
        .unwrap_or_default()
        .split(',')
        .map(|token| token.trim().to_ascii_lowercase())
        .any(|token| token == "*" || value.starts_with(&token) || token.starts_with(&value))
}

/// Concrete platform of the running installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub os: String,
    pub ws: String,
    pub arch: String,
    pub nl: String,
}

impl Environment {
    pub fn new(os: impl Into<String>, ws: impl Into<String>, arch: impl Into<String>, nl: impl Into<String>) -> Self {
        Self { os: os.into(), ws: ws.into(), arch: arch.into(), nl: nl.into() }
    }

    /// Detect the running platform.
    pub fn current() -> Self {
        let os = std::env::consts::OS;
        let ws = match os {
            "windows" => "win32",
            "macos" => "cocoa",
            _ => "gtk",
        };
        // LANG looks like `en_US.UTF-8`
        let nl = std::env::var("LANG")
            .ok()
            .and_then(|lang| lang.split('.').next().map(str::to_string))
            .filter(|lang| !lang.is_empty() && lang != "C" && lang != "POSIX")
            .unwrap_or_else(|| "en_US".to_string());
        Self::new(os, ws, std::env::consts::ARCH, nl)
    }

    pub fn with_overrides(mut self, overrides: &EnvironmentOverrides) -> Self {
        if let Some(os) = &overrides.os { self.os = os.clone(); }
        if let Some(ws) = &overrides.ws { self.ws = ws.clone(); }
        if let Some(arch) = &overrides.arch { self.arch = arch.clone(); }
        if let Some(nl) = &overrides.nl { self.nl = nl.clone(); }
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

/// Configured replacements for detected environment values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nl: Option<String>,
}
