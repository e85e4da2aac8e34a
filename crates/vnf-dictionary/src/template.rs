//! `${name}` placeholder rendering.
//!
//! Rendering is referentially transparent: identical template and variable
//! bindings always produce identical output. Idempotency hashing downstream
//! depends on this.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Matches `${name}` placeholders; the capture group is the bare name.
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid regex pattern"));

/// Variable bindings for template rendering.
///
/// Values are stored in string form; callers format numbers and booleans
/// before binding them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    variables: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a variable, replacing any previous binding.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Returns the bound value for a name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Returns all bindings in name order.
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            variables: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Renders a template, substituting each `${name}` with its bound value.
///
/// Missing variables render as the empty string. This leniency is the
/// documented default: dictionaries may reference fields that only some
/// rule types supply. Use [`render_strict`] to surface missing bindings.
pub fn render(template: &str, context: &TemplateContext) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            context.get(&caps[1]).unwrap_or_default().to_string()
        })
        .into_owned()
}

/// Renders a template, reporting the names of unbound placeholders.
///
/// The rendered output is identical to [`render`]; this variant exists as
/// the opt-in strict mode for callers that want to surface dictionary
/// authoring mistakes instead of silently rendering empty strings.
pub fn render_strict(template: &str, context: &TemplateContext) -> Result<String, Vec<String>> {
    let mut missing = Vec::new();
    let rendered = PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            match context.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => {
                    missing.push(caps[1].to_string());
                    String::new()
                }
            }
        })
        .into_owned();

    if missing.is_empty() {
        Ok(rendered)
    } else {
        Err(missing)
    }
}

/// Returns true if the text still contains `${...}` syntax.
///
/// Used as a post-render sanity check; a fully substituted template never
/// reports unresolved placeholders.
pub fn has_unresolved_placeholders(text: &str) -> bool {
    PLACEHOLDER_RE.is_match(text)
}

/// Collects the distinct placeholder names appearing in a template.
pub fn placeholder_names(template: &str) -> Vec<String> {
    let mut names: Vec<String> = PLACEHOLDER_RE
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}
