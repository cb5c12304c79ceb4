//! Parameter forms derived from a template's declared parameter names.

use crate::catalog::Template;
use serde::Deserialize;

/// Language of generated labels and user-facing notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Source locale of the service
    #[default]
    Zh,
    En,
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" => Ok(Locale::Zh),
            "en" => Ok(Locale::En),
            other => Err(format!("unsupported locale: {}", other)),
        }
    }
}

/// Fixed strings shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    pub qq_label: &'static str,
    pub qq_placeholder: &'static str,
    pub text_label: &'static str,
    pub text_placeholder: &'static str,
    pub no_params: &'static str,
    pub loading: &'static str,
    pub load_failed: &'static str,
    pub no_results: &'static str,
    pub generating: &'static str,
    pub generate_failed: &'static str,
    pub generate_first: &'static str,
}

const ZH: Labels = Labels {
    qq_label: "QQ号",
    qq_placeholder: "输入QQ号",
    text_label: "文本",
    text_placeholder: "输入文本",
    no_params: "此模板无需输入参数",
    loading: "加载中...",
    load_failed: "加载失败，请刷新重试",
    no_results: "没有找到表情包",
    generating: "生成中...",
    generate_failed: "生成失败，请重试",
    generate_first: "请先生成表情包",
};

const EN: Labels = Labels {
    qq_label: "QQ number",
    qq_placeholder: "enter QQ number",
    text_label: "Text",
    text_placeholder: "enter text",
    no_params: "No parameters needed for this template",
    loading: "Loading...",
    load_failed: "Failed to load, reopen to retry",
    no_results: "No memes found",
    generating: "Generating...",
    generate_failed: "Generation failed, retry",
    generate_first: "Generate a meme first",
};

impl Locale {
    pub fn labels(self) -> &'static Labels {
        match self {
            Locale::Zh => &ZH,
            Locale::En => &EN,
        }
    }
}

/// A single input of a template form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    pub placeholder: String,
    pub default_value: String,
}

impl FieldSpec {
    fn derive(param: &str, default_value: String, labels: &Labels) -> Self {
        let (label, placeholder) = if param.starts_with("qq") {
            (labels.qq_label.to_string(), labels.qq_placeholder.to_string())
        } else if param.starts_with("msg") {
            let suffix = param.replacen("msg", "", 1);
            let placeholder = if default_value.is_empty() {
                labels.text_placeholder.to_string()
            } else {
                default_value.clone()
            };
            (format!("{}{}", labels.text_label, suffix), placeholder)
        } else {
            (param.to_uppercase(), String::new())
        };

        Self {
            key: param.to_string(),
            label,
            placeholder,
            default_value,
        }
    }
}

/// Ordered form derived from a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSpec {
    pub fields: Vec<FieldSpec>,
}

impl FormSpec {
    pub fn for_template(template: &Template, locale: Locale) -> Self {
        let labels = locale.labels();
        let fields = template
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| FieldSpec::derive(param, template.default_for(i), labels))
            .collect();
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Values as the form would submit them untouched.
    pub fn initial_values(&self) -> FormValues {
        FormValues {
            entries: self
                .fields
                .iter()
                .map(|f| (f.key.clone(), f.default_value.clone()))
                .collect(),
        }
    }
}

/// Submitted form values, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    entries: Vec<(String, String)>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value or appending a new field.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Trimmed values that are not blank, in field order.
    pub fn submitted(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .map(|(k, v)| (k, v.trim()))
            .filter(|(_, v)| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = FormValues::new();
        for (k, v) in iter {
            let key: String = k.into();
            values.set(&key, v);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, DefaultText};
    use serde_json::json;

    fn template(params: &[&str], defaults: Vec<DefaultText>) -> Template {
        Template {
            id: "1".into(),
            tisp: String::new(),
            name: "t".into(),
            kind: 1u64.into(),
            preview_url: None,
            params: params.iter().map(|s| s.to_string()).collect(),
            default_texts: defaults,
        }
    }

    #[test]
    fn derives_labels_from_parameter_names() {
        let payload = json!({
            "1": { "data": { "name": "t", "type": 1,
                "params": ["qq1", "msg", "msg2"],
                "default_texts": ["", "hello", ["x", "y"]] } }
        });
        let catalog = Catalog::from_payload(&payload).unwrap();
        let form = FormSpec::for_template(&catalog.templates()[0], Locale::Zh);

        let labels: Vec<_> = form.fields.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["QQ号", "文本", "文本2"]);
        let defaults: Vec<_> = form.fields.iter().map(|f| f.default_value.as_str()).collect();
        assert_eq!(defaults, vec!["", "hello", "x"]);

        assert_eq!(form.fields[0].placeholder, "输入QQ号");
        assert_eq!(form.fields[1].placeholder, "hello");
        assert_eq!(form.fields[2].placeholder, "x");
    }

    #[test]
    fn text_placeholder_falls_back_without_default() {
        let form = FormSpec::for_template(&template(&["msg3"], vec![]), Locale::En);
        assert_eq!(form.fields[0].label, "Text3");
        assert_eq!(form.fields[0].placeholder, "enter text");
    }

    #[test]
    fn other_names_are_uppercased() {
        let form = FormSpec::for_template(
            &template(&["avatar", "name"], vec![DefaultText::Text("bob".into())]),
            Locale::Zh,
        );
        assert_eq!(form.fields[0].label, "AVATAR");
        assert_eq!(form.fields[0].placeholder, "");
        assert_eq!(form.fields[0].default_value, "bob");
        assert_eq!(form.fields[1].label, "NAME");
        assert_eq!(form.fields[1].default_value, "");
    }

    #[test]
    fn no_params_means_empty_form() {
        let form = FormSpec::for_template(&template(&[], vec![]), Locale::Zh);
        assert!(form.is_empty());
        assert!(form.initial_values().iter().next().is_none());
    }

    #[test]
    fn submitted_values_are_trimmed_and_non_blank() {
        let mut values: FormValues = [("qq", " 123 "), ("msg", "   "), ("msg2", "hi")]
            .into_iter()
            .collect();
        values.set("msg2", "hey ");
        let sent: Vec<_> = values.submitted().collect();
        assert_eq!(sent, vec![("qq", "123"), ("msg2", "hey")]);
    }

    #[test]
    fn parses_locale() {
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }
}
