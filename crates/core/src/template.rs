//! Named placeholder rendering for scripts and remote commands
//!
//! Templates use the `{{ .NAME }}` syntax. Rendering is strict: every
//! placeholder must have a value, otherwise the template is rejected instead
//! of silently producing a script with an empty substitution.

use crate::errors::{Error, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Deref;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Values substituted into a template, keyed by placeholder name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVariables(IndexMap<String, String>);

impl TemplateVariables {
    /// Create an empty set of variables
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a variable, returning the previous value if any
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Insert a boolean as `true`/`false`
    pub fn insert_bool(&mut self, key: impl Into<String>, value: bool) -> Option<String> {
        self.insert(key, value.to_string())
    }
}

impl Deref for TemplateVariables {
    type Target = IndexMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Render `template` with `variables`.
///
/// `name` only identifies the template in error messages.
pub fn render(name: &str, template: &str, variables: &TemplateVariables) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(template) {
        let (whole, key) = match (captures.get(0), captures.get(1)) {
            (Some(whole), Some(key)) => (whole, key.as_str()),
            _ => continue,
        };
        let value = variables.get(key).ok_or_else(|| {
            Error::template(name, format!("no value for placeholder '{key}'"))
        })?;

        check_unterminated(name, &template[last..whole.start()])?;
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }

    check_unterminated(name, &template[last..])?;
    rendered.push_str(&template[last..]);
    Ok(rendered)
}

/// Literal text between placeholders must not open another `{{ .`
fn check_unterminated(name: &str, literal: &str) -> Result<()> {
    if let Some(pos) = literal.find("{{") {
        let rest = literal[pos + 2..].trim_start();
        if rest.starts_with('.') {
            return Err(Error::template(
                name,
                format!("malformed placeholder near '{}'", preview(&literal[pos..])),
            ));
        }
    }
    Ok(())
}

fn preview(text: &str) -> String {
    text.chars().take(24).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn renders_every_occurrence() {
        let vars = TemplateVariables::new().with("KUBERNETES_VERSION", "1.29.4");
        let out = render(
            "pull",
            "kubeadm config images pull --kubernetes-version {{ .KUBERNETES_VERSION }} # {{.KUBERNETES_VERSION}}",
            &vars,
        )
        .unwrap();
        assert_eq!(
            out,
            "kubeadm config images pull --kubernetes-version 1.29.4 # 1.29.4"
        );
    }

    #[test]
    fn missing_variable_is_rejected() {
        let err = render("install", "echo {{ .FORCE }}", &TemplateVariables::new()).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
        assert!(err.to_string().contains("'FORCE'"));
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        let vars = TemplateVariables::new().with("A", "1");
        let err = render("broken", "echo {{ .A }} {{ .B", &vars).unwrap_err();
        assert!(err.to_string().contains("malformed placeholder"));
    }

    #[test]
    fn shell_braces_are_left_alone() {
        let vars = TemplateVariables::new();
        let script = r#"for f in "${files[@]}"; do echo "{{x}}"; done"#;
        assert_eq!(render("loop", script, &vars).unwrap(), script);
    }

    #[test]
    fn collects_from_pairs() {
        let vars: TemplateVariables = [("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("B").map(String::as_str), Some("2"));
    }

    proptest! {
        #[test]
        fn text_without_braces_is_unchanged(text in "[^{}]*") {
            prop_assert_eq!(render("plain", &text, &TemplateVariables::new()).unwrap(), text);
        }

        #[test]
        fn values_are_inserted_verbatim(value in ".*") {
            let vars = TemplateVariables::new().with("V", value.clone());
            prop_assert_eq!(render("value", "[{{ .V }}]", &vars).unwrap(), format!("[{value}]"));
        }
    }
}
