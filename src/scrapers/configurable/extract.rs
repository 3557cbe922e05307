//! Ordered-fallback extraction rules evaluated against parsed HTML.
//!
//! Boards share no template, so every field is described by a list of rules
//! tried in order until one yields something non-empty.

use std::fmt;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// How many values a rule yields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Single,
    Multi,
}

/// What to read from a matched element.
///
/// Serialized as `text`, `own_text`, `html` or `attr:<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExtractKind {
    /// All descendant text.
    #[default]
    Text,
    /// Only the element's direct text children.
    OwnText,
    /// Outer HTML of the element.
    Html,
    /// Value of an attribute.
    Attr(String),
}

impl TryFrom<String> for ExtractKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "text" => Ok(Self::Text),
            "own_text" => Ok(Self::OwnText),
            "html" => Ok(Self::Html),
            other => match other.strip_prefix("attr:") {
                Some(name) if !name.is_empty() => Ok(Self::Attr(name.to_string())),
                _ => Err(format!("unknown extraction kind: {}", other)),
            },
        }
    }
}

impl From<ExtractKind> for String {
    fn from(kind: ExtractKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ExtractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::OwnText => write!(f, "own_text"),
            Self::Html => write!(f, "html"),
            Self::Attr(name) => write!(f, "attr:{}", name),
        }
    }
}

/// Post-processing applied to each extracted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcess {
    /// Trim surrounding whitespace.
    #[default]
    Trim,
    /// Collapse all whitespace runs to single spaces.
    Strip,
    /// Leave the value untouched.
    Raw,
}

impl PostProcess {
    fn apply(self, value: &str) -> String {
        match self {
            Self::Trim => value.trim().to_string(),
            Self::Strip => value.split_whitespace().collect::<Vec<_>>().join(" "),
            Self::Raw => value.to_string(),
        }
    }
}

/// A single selector-based lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// CSS selector. With `label` set it selects the label cells (default `th`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selector: String,
    /// Table label lookup: read the `td` following a cell containing this text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub kind: ExtractKind,
    #[serde(default)]
    pub post: PostProcess,
    /// Regex applied to each value; non-matching values are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Output template for `pattern` matches. `{1}` is the first capture group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl ExtractionRule {
    /// Rule reading the text of the first element matching `selector`.
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }

    /// Rule reading the cell next to a table header containing `label`.
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn multi(mut self) -> Self {
        self.cardinality = Cardinality::Multi;
        self
    }

    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.kind = ExtractKind::Attr(name.into());
        self
    }

    pub fn html(mut self) -> Self {
        self.kind = ExtractKind::Html;
        self
    }

    pub fn own_text(mut self) -> Self {
        self.kind = ExtractKind::OwnText;
        self
    }

    pub fn post(mut self, post: PostProcess) -> Self {
        self.post = post;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>, template: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self.template = Some(template.into());
        self
    }

    /// Copy of this rule with `{name}` placeholders in the selector replaced.
    pub fn substitute(&self, name: &str, value: &str) -> Self {
        let mut rule = self.clone();
        rule.selector = rule.selector.replace(&format!("{{{}}}", name), value);
        rule
    }

    /// Elements this rule points at, in document order.
    pub fn select<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let selector_str = match (&self.label, self.selector.is_empty()) {
            (Some(_), true) => "th",
            _ => self.selector.as_str(),
        };
        let selector = match Selector::parse(selector_str) {
            Ok(selector) => selector,
            Err(e) => {
                debug!("Skipping unparsable selector {:?}: {:?}", selector_str, e);
                return Vec::new();
            }
        };

        let matched = document.select(&selector);
        match &self.label {
            Some(label) => matched
                .filter(|cell| cell.text().collect::<String>().contains(label.as_str()))
                .filter_map(following_cell)
                .collect(),
            None => matched.collect(),
        }
    }

    /// Values this rule yields, already post-processed and non-empty.
    pub fn apply(&self, document: &Html) -> Vec<String> {
        let pattern = match self.pattern.as_deref().map(Regex::new).transpose() {
            Ok(pattern) => pattern,
            Err(e) => {
                debug!("Skipping rule with invalid pattern: {}", e);
                return Vec::new();
            }
        };

        let mut values = Vec::new();
        for element in self.select(document) {
            let Some(raw) = read_element(element, &self.kind) else {
                continue;
            };
            let raw = match &pattern {
                Some(re) => match apply_pattern(re, self.template.as_deref(), &raw) {
                    Some(value) => value,
                    None => continue,
                },
                None => raw,
            };
            let value = self.post.apply(&raw);
            if value.trim().is_empty() {
                continue;
            }
            values.push(value);
            if self.cardinality == Cardinality::Single {
                break;
            }
        }
        values
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Position of the rule that produced the values.
    pub rule_index: usize,
    pub values: Vec<String>,
}

impl Extraction {
    /// First value. Extractions are never empty.
    pub fn first(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or_default()
    }

    pub fn into_first(self) -> String {
        self.values.into_iter().next().unwrap_or_default()
    }
}

/// Try `rules` in order; the first one yielding a non-empty value wins.
///
/// Returns None when every rule misses. That is an ordinary outcome, not an
/// error.
pub fn extract(document: &Html, rules: &[ExtractionRule]) -> Option<Extraction> {
    rules.iter().enumerate().find_map(|(rule_index, rule)| {
        let values = rule.apply(document);
        if values.is_empty() {
            None
        } else {
            if rule_index > 0 {
                debug!(
                    "Matched fallback rule #{} ({:?})",
                    rule_index + 1,
                    rule.label.as_deref().unwrap_or(rule.selector.as_str())
                );
            }
            Some(Extraction { rule_index, values })
        }
    })
}

/// Union of every rule's values, deduplicated, in first-seen order.
pub fn extract_all(document: &Html, rules: &[ExtractionRule]) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for rule in rules {
        for value in rule.apply(document) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    values
}

/// Direct text children of an element, concatenated.
pub fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| (**t).to_owned()))
        .collect::<String>()
}

/// Resolve an href against the page it was found on.
pub fn resolve_url(base_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(base_url)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

fn read_element(element: ElementRef<'_>, kind: &ExtractKind) -> Option<String> {
    match kind {
        ExtractKind::Text => Some(element.text().collect()),
        ExtractKind::OwnText => Some(own_text(element)),
        ExtractKind::Html => Some(element.html()),
        ExtractKind::Attr(name) => element.value().attr(name).map(str::to_string),
    }
}

/// The first `td` sibling after a label cell.
fn following_cell(cell: ElementRef<'_>) -> Option<ElementRef<'_>> {
    cell.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "td")
}

fn apply_pattern(re: &Regex, template: Option<&str>, value: &str) -> Option<String> {
    let captures = re.captures(value)?;
    match template {
        Some(template) => {
            let mut out = template.to_string();
            for i in (0..captures.len()).rev() {
                let group = captures.get(i).map(|m| m.as_str()).unwrap_or_default();
                out = out.replace(&format!("{{{}}}", i), group);
            }
            Some(out)
        }
        None => captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().to_string()),
    }
}
