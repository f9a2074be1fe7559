//! `$ref` resolution over parsed spec documents.
//!
//! Supports local refs (`#/components/...`) and file refs relative to the document that contains
//! them (`./common.yaml#/Pet`). Referenced files are parsed once and cached. Resolution is
//! always relative to the current document, so callers carry the document path along.
//!
//! File access is blocking; async callers run resolution on the blocking pool.

use crate::error::{DiscoveryError, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parse a spec document as JSON, falling back to YAML.
///
/// # Errors
///
/// Returns [`DiscoveryError::Parse`] if neither parser accepts `content`.
pub fn parse_document(content: &str, location: &str) -> Result<Value> {
    serde_json::from_str(content)
        .or_else(|_| serde_yaml::from_str(content))
        .map_err(|e: serde_yaml::Error| DiscoveryError::Parse {
            location: location.to_string(),
            message: e.to_string(),
        })
}

#[derive(Debug)]
pub struct RefResolver {
    root: PathBuf,
    docs: RwLock<HashMap<PathBuf, Arc<Value>>>,
}

impl RefResolver {
    pub fn new(root: impl Into<PathBuf>, document: Value) -> Self {
        let root = canonicalize_best_effort(root.into());
        let mut docs = HashMap::new();
        docs.insert(root.clone(), Arc::new(document));
        Self {
            root,
            docs: RwLock::new(docs),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root document as loaded.
    #[must_use]
    pub fn root_document(&self) -> Arc<Value> {
        self.docs
            .read()
            .get(&self.root)
            .cloned()
            .unwrap_or_else(|| Arc::new(Value::Null))
    }

    /// Follow `value` while it is a `{"$ref": ...}` object.
    ///
    /// Returns the document the final value lives in along with the value.
    ///
    /// # Errors
    ///
    /// Returns an error on cycles, unreadable files, or pointers that do not exist.
    pub fn resolve(&self, current: &Path, value: &Value) -> Result<(PathBuf, Value)> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut doc = current.to_path_buf();
        let mut cur = value.clone();

        while let Some(reference) = ref_of(&cur) {
            let (target, pointer) = Self::parse_ref(&doc, reference)?;
            let key = format!("{}#{}", target.display(), pointer.as_deref().unwrap_or(""));
            if !seen.insert(key) {
                return Err(DiscoveryError::Reference(format!(
                    "Cyclic $ref detected while resolving: {reference}"
                )));
            }
            let next = self.select(&target, pointer.as_deref(), reference)?;
            doc = target;
            cur = next;
        }

        Ok((doc, cur))
    }

    /// Copy of `value` with every resolvable `$ref` inlined.
    ///
    /// Refs that fail to resolve, or that would recurse into themselves, are kept verbatim.
    #[must_use]
    pub fn inline(&self, current: &Path, value: &Value) -> Value {
        let mut stack = Vec::new();
        self.inline_inner(current, value, &mut stack)
    }

    fn inline_inner(&self, current: &Path, value: &Value, stack: &mut Vec<String>) -> Value {
        match value {
            Value::Object(obj) => {
                if let Some(reference) = ref_of(value) {
                    let Ok((target, pointer)) = Self::parse_ref(current, reference) else {
                        return value.clone();
                    };
                    let key = format!("{}#{}", target.display(), pointer.as_deref().unwrap_or(""));
                    if stack.contains(&key) {
                        return value.clone();
                    }
                    match self.select(&target, pointer.as_deref(), reference) {
                        Ok(resolved) => {
                            stack.push(key);
                            let out = self.inline_inner(&target, &resolved, stack);
                            stack.pop();
                            out
                        }
                        Err(e) => {
                            tracing::debug!("Keeping unresolved $ref '{}': {}", reference, e);
                            value.clone()
                        }
                    }
                } else {
                    Value::Object(
                        obj.iter()
                            .map(|(k, v)| (k.clone(), self.inline_inner(current, v, stack)))
                            .collect::<Map<String, Value>>(),
                    )
                }
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.inline_inner(current, v, stack))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn select(&self, doc: &Path, pointer: Option<&str>, reference: &str) -> Result<Value> {
        let loaded = self.load(doc)?;
        match pointer {
            None => Ok((*loaded).clone()),
            Some(ptr) => loaded.pointer(ptr).cloned().ok_or_else(|| {
                DiscoveryError::Reference(format!(
                    "Unresolved $ref '{reference}' (doc {}, missing pointer '{ptr}')",
                    doc.display()
                ))
            }),
        }
    }

    fn parse_ref(current: &Path, reference: &str) -> Result<(PathBuf, Option<String>)> {
        let (doc_part, frag) = match reference.split_once('#') {
            Some((d, f)) => (d, Some(f)),
            None => (reference, None),
        };

        let pointer = match frag {
            None | Some("") => None,
            Some(f) if f.starts_with('/') => Some(f.to_string()),
            Some(_) => {
                return Err(DiscoveryError::Reference(format!(
                    "Unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}"
                )));
            }
        };

        if doc_part.is_empty() {
            return Ok((current.to_path_buf(), pointer));
        }
        if doc_part.starts_with("http://") || doc_part.starts_with("https://") {
            return Err(DiscoveryError::Reference(format!(
                "Remote $ref is not supported for local spec files: {reference}"
            )));
        }

        let doc_part = doc_part.strip_prefix("file://").unwrap_or(doc_part);
        let resolved = if Path::new(doc_part).is_absolute() {
            PathBuf::from(doc_part)
        } else {
            current
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(doc_part)
        };
        Ok((canonicalize_best_effort(resolved), pointer))
    }

    fn load(&self, doc: &Path) -> Result<Arc<Value>> {
        if let Some(v) = self.docs.read().get(doc).cloned() {
            return Ok(v);
        }

        let content =
            std::fs::read_to_string(doc).map_err(|source| DiscoveryError::ReadFile {
                path: doc.display().to_string(),
                source,
            })?;
        let parsed = Arc::new(parse_document(&content, &doc.display().to_string())?);
        self.docs
            .write()
            .insert(doc.to_path_buf(), Arc::clone(&parsed));
        Ok(parsed)
    }
}

fn ref_of(value: &Value) -> Option<&str> {
    value.as_object()?.get("$ref")?.as_str()
}

fn canonicalize_best_effort(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}
