//! Scalar `{field}` substitution (pass 2).
//!
//! Runs over parsed YAML with order-preserving map semantics so emitted
//! artifacts keep stable key ordering. Port-keyed fields are coerced to
//! numbers after substitution; embedded payloads with their own brace
//! syntax are exempted wholesale.

use crate::error::{RenderError, RenderResult};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Field names whose substituted values must be numeric.
const PORT_KEYS: &[&str] = &["port", "targetPort", "containerPort"];

/// Embedded payload keys never touched by scalar substitution.
const EXEMPT_KEYS: &[&str] = &["proxy.conf", "topology.json"];

/// Per-service substitution values.
pub type Bindings = BTreeMap<String, String>;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("static placeholder pattern"))
}

/// Substitute every `{field}` occurrence in a plain string.
pub fn substitute_str(template: &str, text: &str, bindings: &Bindings) -> RenderResult<String> {
    let re = placeholder();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let (Some(whole), Some(field)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value =
            bindings
                .get(field.as_str())
                .ok_or_else(|| RenderError::MissingBinding {
                    template: template.to_string(),
                    field: field.as_str().to_string(),
                })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Parse one YAML document and substitute every scalar in place.
pub fn substitute_value(
    template: &str,
    doc: &str,
    bindings: &Bindings,
) -> RenderResult<serde_yaml::Value> {
    let mut value: serde_yaml::Value = serde_yaml::from_str(doc)?;
    walk(template, &mut value, bindings, None)?;
    Ok(value)
}

fn walk(
    template: &str,
    value: &mut serde_yaml::Value,
    bindings: &Bindings,
    key: Option<&str>,
) -> RenderResult<()> {
    match value {
        serde_yaml::Value::String(s) => {
            let substituted = substitute_str(template, s, bindings)?;
            if key.is_some_and(|k| PORT_KEYS.contains(&k)) {
                if let Ok(n) = substituted.parse::<u64>() {
                    *value = serde_yaml::Value::Number(n.into());
                    return Ok(());
                }
            }
            *value = serde_yaml::Value::String(substituted);
        }
        serde_yaml::Value::Sequence(seq) => {
            for item in seq {
                walk(template, item, bindings, key)?;
            }
        }
        serde_yaml::Value::Mapping(map) => {
            let entries: Vec<_> = std::mem::take(map).into_iter().collect();
            for (mut k, mut v) in entries {
                if k.as_str().is_some_and(|ks| EXEMPT_KEYS.contains(&ks)) {
                    map.insert(k, v);
                    continue;
                }
                if let serde_yaml::Value::String(ks) = &k {
                    k = serde_yaml::Value::String(substitute_str(template, ks, bindings)?);
                }
                let child_key = k.as_str().map(str::to_string);
                walk(template, &mut v, bindings, child_key.as_deref())?;
                map.insert(k, v);
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_fields_in_strings() {
        let b = bindings(&[("endpoint", "llm-0"), ("port", "7000")]);
        let out = substitute_str("t", "http://{endpoint}:{port}", &b).unwrap();
        assert_eq!(out, "http://llm-0:7000");
    }

    #[test]
    fn missing_binding_names_template_and_field() {
        let err = substitute_str("llm", "{ghost}", &Bindings::new()).unwrap_err();
        match err {
            RenderError::MissingBinding { template, field } => {
                assert_eq!(template, "llm");
                assert_eq!(field, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn port_keys_are_numeric_after_substitution() {
        let b = bindings(&[("port", "7000")]);
        let value = substitute_value("t", "port: \"{port}\"\nname: \"{port}\"\n", &b).unwrap();
        assert_eq!(value["port"], serde_yaml::Value::Number(7000.into()));
        assert_eq!(value["name"], serde_yaml::Value::String("7000".into()));
    }

    #[test]
    fn mapping_keys_are_substituted() {
        let b = bindings(&[("endpoint", "llm-0")]);
        let value = substitute_value("t", "\"{endpoint}\":\n  a: \"1\"\n", &b).unwrap();
        assert!(value.get("llm-0").is_some());
    }

    #[test]
    fn exempt_keys_keep_their_braces() {
        let doc = "data:\n  proxy.conf: |\n    location / { }\n";
        let value = substitute_value("t", doc, &Bindings::new()).unwrap();
        let conf = value["data"]["proxy.conf"].as_str().unwrap();
        assert!(conf.contains("location / { }"));
    }
}
