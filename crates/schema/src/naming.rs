//! Naming and taxonomy helpers.
//!
//! Everything here is a pure function of `(method, path, server_url)` so the same endpoint always
//! maps to the same tool name across runs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

/// Fallback resource name when a path has no usable segment.
pub const FALLBACK_RESOURCE: &str = "resource";
/// Fallback vendor when no host can be derived.
pub const FALLBACK_VENDOR: &str = "api";
/// Fallback version when a path carries no `v<N>` marker.
pub const FALLBACK_VERSION: &str = "v1";
/// Path segments that are routing prefixes rather than resources.
pub const PREFIX_SEGMENTS: &[&str] = &["api"];
/// Longest first sentence of a description that is used verbatim as a display name.
pub const MAX_DESCRIPTION_DISPLAY_NAME_CHARS: usize = 50;

static VERSION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^v\d+$").expect("valid regex"));
static VERSION_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)v(\d+)").expect("valid regex"));
static SEARCH_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(search|find)").expect("valid regex"));
static LIST_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/list").expect("valid regex"));
static NON_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("valid regex"));
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Which component forms the last segment of a tool name.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NamingScheme {
    /// `VENDOR__RESOURCE__VERB`.
    #[default]
    Verb,
    /// `VENDOR__RESOURCE__SANITIZED_DISPLAY_NAME`.
    DisplayName,
}

impl std::str::FromStr for NamingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verb" => Ok(Self::Verb),
            "display-name" | "display_name" | "displayname" => Ok(Self::DisplayName),
            other => Err(format!(
                "unknown naming scheme '{other}' (expected 'verb' or 'display-name')"
            )),
        }
    }
}

/// Derive the resource a path operates on.
///
/// Version markers (`v2`), placeholders (`{id}`) and routing prefixes (`api`) are skipped.
#[must_use]
pub fn extract_resource(path: &str) -> String {
    path.split('/')
        .filter(|seg| !seg.is_empty())
        .filter(|seg| !VERSION_SEGMENT.is_match(seg))
        .filter(|seg| !(seg.starts_with('{') && seg.ends_with('}')))
        .find(|seg| !PREFIX_SEGMENTS.iter().any(|p| seg.eq_ignore_ascii_case(p)))
        .map_or_else(|| FALLBACK_RESOURCE.to_string(), ToString::to_string)
}

/// First `v<digits>` marker in the path, lowercased. Defaults to `v1`.
#[must_use]
pub fn extract_version(path: &str) -> String {
    VERSION_ANYWHERE
        .captures(path)
        .and_then(|c| c.get(1))
        .map_or_else(|| FALLBACK_VERSION.to_string(), |m| format!("v{}", m.as_str()))
}

/// Derive a vendor label from a server URL (`https://api.example.com/v1` -> `example`).
#[must_use]
pub fn extract_vendor(server_url: &str) -> String {
    let trimmed = server_url.trim();
    if trimmed.is_empty() {
        return FALLBACK_VENDOR.to_string();
    }

    let parsed = Url::parse(trimmed)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{trimmed}")).ok());
    let Some(host) = parsed.as_ref().and_then(Url::host_str) else {
        return FALLBACK_VENDOR.to_string();
    };
    if host.is_empty() {
        return FALLBACK_VENDOR.to_string();
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 2 {
        labels[labels.len() - 2].to_string()
    } else {
        host.to_string()
    }
}

/// Map method and path onto a semantic verb (`get`, `list`, `create`, ...).
#[must_use]
pub fn determine_verb(method: &str, path: &str) -> &'static str {
    if SEARCH_PATH.is_match(path) {
        return "search";
    }
    if LIST_PATH.is_match(path) {
        return "list";
    }

    match method.trim().to_ascii_uppercase().as_str() {
        "GET" if path.contains('{') => "get",
        "GET" => "list",
        "POST" => "create",
        "PUT" | "PATCH" => "update",
        "DELETE" => "delete",
        _ => "execute",
    }
}

#[must_use]
pub fn compose_tool_name(vendor: &str, resource: &str, verb: &str) -> String {
    format!("{vendor}__{resource}__{verb}").to_uppercase()
}

/// Tool name whose last segment is the sanitized display name.
///
/// `verb` is used instead when nothing of the display name survives sanitizing.
#[must_use]
pub fn compose_tool_name_from_display(
    vendor: &str,
    resource: &str,
    display_name: &str,
    verb: &str,
) -> String {
    let stripped = NON_NAME_CHARS.replace_all(display_name, "");
    let sanitized = WHITESPACE_RUN.replace_all(stripped.trim(), "_");
    if sanitized.is_empty() {
        return compose_tool_name(vendor, resource, verb);
    }
    compose_tool_name(vendor, resource, &sanitized)
}

/// Heuristic display name used when no oracle answer is available.
#[must_use]
pub fn fallback_display_name(method: &str, path: &str, description: &str) -> String {
    if let Some(first) = description.split('.').next() {
        let first = first.trim();
        if !first.is_empty() && first.chars().count() <= MAX_DESCRIPTION_DISPLAY_NAME_CHARS {
            return first.to_string();
        }
    }

    let resource = extract_resource(path);
    let verb = determine_verb(method, path);
    title_case(&format!("{verb} {resource}").replace('_', " "))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
