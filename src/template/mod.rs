//! # Variable substitution
//!
//! Replaces `{{NAME}}` placeholders with bound variables and resolves the
//! pseudo-variables `{{NOW ...}}` and `{{RANDOM ...}}`. Unbound placeholders
//! are left verbatim so that templates can be substituted in several passes.

mod special;
mod words;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EngineConfig;
use crate::error::TemplateError;

/// Substitution function for one compilation.
///
/// Each distinct special placeholder is resolved once and reused, so
/// `{{RANDOM NUMBER 99}}` yields the same value everywhere in one request.
pub struct Replacer<R = StdRng> {
    variables: BTreeMap<String, String>,
    now: DateTime<Utc>,
    rng: R,
    resolved: HashMap<String, String>,
}

impl Replacer<StdRng> {
    /// Replacer seeded from the configuration, or from entropy.
    pub fn from_config(variables: BTreeMap<String, String>, config: &EngineConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(variables, Utc::now(), rng)
    }
}

impl<R: Rng> Replacer<R> {
    pub fn new(variables: BTreeMap<String, String>, now: DateTime<Utc>, rng: R) -> Self {
        Self {
            variables,
            now,
            rng,
            resolved: HashMap::new(),
        }
    }

    pub fn replace(&mut self, input: &str) -> Result<String, TemplateError> {
        scan(input, |inner| self.resolve(inner))
    }

    fn resolve(&mut self, inner: &str) -> Result<Option<String>, TemplateError> {
        if let Some(value) = self.variables.get(inner) {
            return Ok(Some(value.clone()));
        }
        if let Some(value) = self.resolved.get(inner) {
            return Ok(Some(value.clone()));
        }

        let value = if special::is_now(inner) {
            special::now(inner, self.now)?
        } else if special::is_random(inner) {
            special::random(inner, &mut self.rng)?
        } else {
            return Ok(None);
        };

        self.resolved.insert(inner.to_string(), value.clone());
        Ok(Some(value))
    }
}

/// Replace bound `{{NAME}}` placeholders only; everything else, special
/// placeholders included, stays verbatim. Substituted values are not
/// scanned again.
pub fn substitute_variables(input: &str, variables: &BTreeMap<String, String>) -> String {
    if variables.is_empty() || !input.contains("{{") {
        return input.to_string();
    }
    let bound = scan(input, |inner| {
        Ok::<_, std::convert::Infallible>(variables.get(inner).cloned())
    });
    match bound {
        Ok(output) => output,
        Err(never) => match never {},
    }
}

/// Walk `input` once, handing the inside of every `{{...}}` to `resolve`.
/// Placeholders it returns `None` for are copied unchanged.
fn scan<E>(
    input: &str,
    mut resolve: impl FnMut(&str) -> Result<Option<String>, E>,
) -> Result<String, E> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let inner = &after[..end];

        // "{{a {{B}}": restart at the innermost opening braces.
        if let Some(nested) = inner.rfind("{{") {
            let cut = start + 2 + nested;
            output.push_str(&rest[..cut]);
            rest = &rest[cut..];
            continue;
        }

        output.push_str(&rest[..start]);
        match resolve(inner)? {
            Some(value) => output.push_str(&value),
            None => {
                output.push_str("{{");
                output.push_str(inner);
                output.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }

    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn replacer(vars: &[(&str, &str)]) -> Replacer<StdRng> {
        let variables = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Replacer::new(variables, now, StdRng::seed_from_u64(42))
    }

    #[test]
    fn replaces_bound_variables() {
        let mut r = replacer(&[("host", "example.com"), ("port", "8080")]);
        let result = r.replace("https://{{host}}:{{port}}/api").unwrap();
        assert_eq!(result, "https://example.com:8080/api");
    }

    #[test]
    fn leaves_unbound_placeholders_verbatim() {
        let mut r = replacer(&[]);
        assert_eq!(r.replace("https://{{host}}/api").unwrap(), "https://{{host}}/api");
        assert_eq!(r.replace("{{NOWHERE}}").unwrap(), "{{NOWHERE}}");
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let mut r = replacer(&[("a", "b")]);
        for input in ["", "plain text", "{ single } braces", "unterminated {{ brace", "}} {{"] {
            assert_eq!(r.replace(input).unwrap(), input);
        }
    }

    #[test]
    fn nested_braces_resolve_innermost() {
        let mut r = replacer(&[("B", "x")]);
        assert_eq!(r.replace("{{a {{B}}").unwrap(), "{{a x");
    }

    #[test]
    fn now_uses_default_layout() {
        let mut r = replacer(&[]);
        assert_eq!(r.replace("{{NOW}}").unwrap(), "Fri, 01 Mar 2024 12:00:00 GMT");
    }

    #[test]
    fn now_with_offset_and_layout() {
        let mut r = replacer(&[]);
        assert_eq!(r.replace(r#"{{NOW + 2d | "%Y-%m-%d"}}"#).unwrap(), "2024-03-03");
        assert_eq!(r.replace(r#"{{NOW - 90m | "%H:%M"}}"#).unwrap(), "10:30");
    }

    #[test]
    fn malformed_now_is_an_error() {
        let mut r = replacer(&[]);
        let err = r.replace("{{NOW + 3 weeks}}").unwrap_err();
        assert!(matches!(err, TemplateError::MalformedNow { .. }));
    }

    #[test]
    fn random_values_are_stable_within_one_replacer() {
        let mut r = replacer(&[]);
        let first = r.replace("{{RANDOM NUMBER 1000000}}").unwrap();
        let second = r.replace("id={{RANDOM NUMBER 1000000}}").unwrap();
        assert_eq!(format!("id={first}"), second);
    }

    #[test]
    fn bare_random_placeholder_is_malformed() {
        let mut r = replacer(&[]);
        let err = r.replace("id={{RANDOM}}").unwrap_err();
        assert!(matches!(err, TemplateError::MalformedRandom { ref reason, .. } if reason == "missing kind"));
    }

    #[test]
    fn bound_variable_shadows_special() {
        let mut r = replacer(&[("NOW", "yesterday")]);
        assert_eq!(r.replace("{{NOW}}").unwrap(), "yesterday");
    }

    #[test]
    fn substitute_variables_keeps_specials() {
        let mut vars = BTreeMap::new();
        vars.insert("host".to_string(), "h".to_string());
        assert_eq!(
            substitute_variables("{{host}} {{NOW}} {{other}}", &vars),
            "h {{NOW}} {{other}}"
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let mut vars = BTreeMap::new();
        vars.insert("A".to_string(), "{{B}}".to_string());
        vars.insert("B".to_string(), "b".to_string());
        assert_eq!(substitute_variables("{{A}}/{{B}}", &vars), "{{B}}/b");

        let mut r = replacer(&[("A", "{{B}}"), ("B", "b")]);
        assert_eq!(r.replace("{{A}}/{{B}}").unwrap(), "{{B}}/b");
    }

    #[test]
    fn substitute_variables_resolves_nested_innermost() {
        let mut vars = BTreeMap::new();
        vars.insert("B".to_string(), "x".to_string());
        assert_eq!(substitute_variables("{{a {{B}}", &vars), "{{a x");
    }
}
