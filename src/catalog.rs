//! Template catalog: decoding the keyed API payload and searching it.
//!
//! The list endpoint answers with a JSON object whose keys are numeric
//! identifiers. `Catalog::from_payload` flattens it into an ordered list,
//! keeping the document order of the keys and dropping every entry that
//! does not carry a non-empty name.

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;

/// Type identifier of a template. The API sends either a string or a number.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateType {
    Number(serde_json::Number),
    Text(String),
}

impl TemplateType {
    /// Numbers and strings are taken as-is; any other value keeps its JSON
    /// text so it still shows up in search. A missing type is empty.
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => TemplateType::Number(n.clone()),
            Some(Value::String(s)) => TemplateType::Text(s.clone()),
            Some(Value::Null) | None => TemplateType::Text(String::new()),
            Some(other) => TemplateType::Text(other.to_string()),
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateType::Number(n) => write!(f, "{}", n),
            TemplateType::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for TemplateType {
    fn from(s: &str) -> Self {
        TemplateType::Text(s.to_string())
    }
}

impl From<u64> for TemplateType {
    fn from(n: u64) -> Self {
        TemplateType::Number(n.into())
    }
}

/// One entry of `default_texts`.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultText {
    Text(String),
    Choices(Vec<Value>),
    Other(Value),
}

impl From<Value> for DefaultText {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => DefaultText::Text(s),
            Value::Array(items) => DefaultText::Choices(items),
            other => DefaultText::Other(other),
        }
    }
}

impl DefaultText {
    /// The value prefilled into the form: the first choice of a list, or the
    /// value itself. Numbers and booleans are written out, null is empty.
    pub fn resolve(&self) -> String {
        match self {
            DefaultText::Text(s) => s.clone(),
            DefaultText::Choices(items) => items.first().map(scalar_text).unwrap_or_default(),
            DefaultText::Other(value) => scalar_text(value),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// A meme template as advertised by the list endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Key of the entry in the catalog payload
    pub id: String,
    /// Free-form hint text shipped next to the template
    pub tisp: String,
    pub name: String,
    pub kind: TemplateType,
    /// Preview image
    pub preview_url: Option<String>,
    /// Parameter names in form order
    pub params: Vec<String>,
    /// Defaults aligned with `params`
    pub default_texts: Vec<DefaultText>,
}

impl Template {
    /// Default value for the parameter at `index`, empty when absent.
    pub fn default_for(&self, index: usize) -> String {
        self.default_texts
            .get(index)
            .map(DefaultText::resolve)
            .unwrap_or_default()
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.kind.to_string().contains(needle)
    }

    /// Build a template from one catalog entry. Only `data.name` is checked;
    /// every other field is read leniently and falls back to empty.
    fn from_entry(id: &str, entry: &Value) -> Option<Self> {
        let data: &Map<String, Value> = entry.get("data")?.as_object()?;
        let name = data.get("name").and_then(Value::as_str).filter(|n| !n.is_empty())?;
        let text = |field: &str| data.get(field).and_then(Value::as_str).map(str::to_string);

        let params = match data.get("params") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let default_texts = match data.get("default_texts") {
            Some(Value::Array(items)) => items.iter().cloned().map(DefaultText::from).collect(),
            _ => Vec::new(),
        };

        Some(Template {
            id: id.to_string(),
            tisp: entry
                .get("tisp")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            name: name.to_string(),
            kind: TemplateType::from_value(data.get("type")),
            preview_url: text("url").filter(|u| !u.is_empty()),
            params,
            default_texts,
        })
    }
}

/// Keys are accepted when they start with an integer, optionally preceded by
/// whitespace and a sign (`"12"`, `" 7"`, `"-3"`, `"42abc"`).
fn is_numeric_key(key: &str) -> bool {
    let rest = key.trim_start();
    let rest = rest.strip_prefix(&['+', '-'][..]).unwrap_or(rest);
    rest.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Ordered, immutable list of templates loaded for the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    templates: Vec<Template>,
}

impl Catalog {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    /// Decode the raw list-endpoint body.
    pub fn from_json(body: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(body)?;
        Self::from_payload(&payload)
    }

    /// Normalize the keyed payload into an ordered catalog.
    ///
    /// Entries with a non-numeric key, a missing `data` block or an empty
    /// name are skipped. Only a non-object payload is an error.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let map = payload
            .as_object()
            .ok_or_else(|| Error::Parse("catalog payload is not a JSON object".into()))?;

        let mut templates = Vec::with_capacity(map.len());
        for (key, value) in map {
            if !is_numeric_key(key) {
                log::debug!("skipping catalog key {:?}: not numeric", key);
                continue;
            }
            match Template::from_entry(key, value) {
                Some(template) => templates.push(template),
                None => log::debug!("skipping catalog entry {}: no name", key),
            }
        }

        log::info!(
            "catalog normalized: {} of {} entries kept",
            templates.len(),
            map.len()
        );
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Entries matching a search term, in catalog order.
    ///
    /// The term is trimmed and lowercased. An empty term returns everything;
    /// otherwise an entry matches when its lowercased name or its type
    /// identifier contains the term.
    pub fn filter(&self, term: &str) -> Vec<&Template> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.templates.iter().collect();
        }
        self.templates.iter().filter(|t| t.matches(&needle)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "10": {
                "tisp": "hint",
                "data": {
                    "name": "Petpet", "type": 10, "url": "http://x/10.png", "params": ["qq"]
                }
            },
            "2": { "data": { "name": "Slap", "type": "2" } },
            "code": 200,
            "3": { "data": { "type": 3 } },
            "4": { "data": { "name": "", "type": 4 } },
            "5": "garbage",
            "7": {
                "data": {
                    "name": "Dance Party", "type": 71, "default_texts": ["hi", ["a", "b"], null]
                }
            }
        })
    }

    #[test]
    fn keeps_named_entries_in_document_order() {
        let catalog = Catalog::from_payload(&sample()).unwrap();
        let ids: Vec<_> = catalog.templates().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "2", "7"]);
        assert!(catalog.templates().iter().all(|t| !t.name.is_empty()));
    }

    #[test]
    fn carries_optional_fields() {
        let catalog = Catalog::from_payload(&sample()).unwrap();
        let petpet = catalog.get("10").unwrap();
        assert_eq!(petpet.tisp, "hint");
        assert_eq!(petpet.preview_url.as_deref(), Some("http://x/10.png"));
        assert_eq!(petpet.params, vec!["qq".to_string()]);

        let slap = catalog.get("2").unwrap();
        assert_eq!(slap.tisp, "");
        assert!(slap.params.is_empty());
        assert_eq!(slap.kind.to_string(), "2");
    }

    #[test]
    fn resolves_defaults() {
        let catalog = Catalog::from_payload(&sample()).unwrap();
        let dance = catalog.get("7").unwrap();
        assert_eq!(dance.default_for(0), "hi");
        assert_eq!(dance.default_for(1), "a");
        assert_eq!(dance.default_for(2), "");
        assert_eq!(dance.default_for(9), "");
    }

    #[test]
    fn keeps_named_entries_with_odd_optional_fields() {
        let payload = json!({
            "1": { "data": { "name": "No type", "params": ["msg"] } },
            "2": { "data": { "name": "Numeric url", "type": 2, "url": 0 } },
            "3": { "data": { "name": "Mixed params", "type": 3, "params": ["msg", 5, "qq"] } },
            "4": { "tisp": 7, "data": { "name": "Numeric hint", "type": 4 } },
            "5": { "data": { "name": "Numeric default", "type": [5], "default_texts": [42] } }
        });
        let catalog = Catalog::from_payload(&payload).unwrap();
        let ids: Vec<_> = catalog.templates().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

        assert_eq!(catalog.get("1").unwrap().kind.to_string(), "");
        assert_eq!(catalog.get("2").unwrap().preview_url, None);
        assert_eq!(catalog.get("3").unwrap().params, vec!["msg", "qq"]);
        assert_eq!(catalog.get("4").unwrap().tisp, "");
        let numeric = catalog.get("5").unwrap();
        assert_eq!(numeric.kind.to_string(), "[5]");
        assert_eq!(numeric.default_for(0), "42");
    }

    #[test]
    fn scalar_defaults_are_written_out() {
        assert_eq!(DefaultText::from(json!(42)).resolve(), "42");
        assert_eq!(DefaultText::from(json!(true)).resolve(), "true");
        assert_eq!(DefaultText::from(json!(null)).resolve(), "");
        assert_eq!(DefaultText::from(json!([7, "x"])).resolve(), "7");
        assert_eq!(DefaultText::from(json!([])).resolve(), "");
        assert_eq!(DefaultText::from(json!({ "a": 1 })).resolve(), "");
    }

    #[test]
    fn rejects_non_object_payload() {
        let err = Catalog::from_payload(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(Catalog::from_json("not json").unwrap_err().is_catalog_load());
    }

    #[test]
    fn numeric_key_rule() {
        assert!(is_numeric_key("12"));
        assert!(is_numeric_key(" -3"));
        assert!(is_numeric_key("42abc"));
        assert!(!is_numeric_key("code"));
        assert!(!is_numeric_key(""));
        assert!(!is_numeric_key("-"));
    }

    #[test]
    fn empty_term_returns_everything() {
        let catalog = Catalog::from_payload(&sample()).unwrap();
        let all: Vec<_> = catalog.filter("   ").into_iter().cloned().collect();
        assert_eq!(all, catalog.templates().to_vec());
    }

    #[test]
    fn filters_by_name_or_type() {
        let catalog = Catalog::from_payload(&sample()).unwrap();
        let by_name: Vec<_> = catalog.filter("DANCE").iter().map(|t| t.id.clone()).collect();
        assert_eq!(by_name, vec!["7"]);

        // "1" hits type 10 and type 71
        let by_type: Vec<_> = catalog.filter("1").iter().map(|t| t.id.clone()).collect();
        assert_eq!(by_type, vec!["10", "7"]);

        assert!(catalog.filter("nothing here").is_empty());
    }
}
