//! Minimal branded layout for unknown template names

use askama::Template;

use super::BusinessIdentity;

/// Lists the context as key/value rows under the business header
#[derive(Debug, Template)]
#[template(path = "emails/fallback.html")]
pub(super) struct FallbackTemplate {
    pub title: String,
    pub heading: String,
    pub business_name: String,
    pub business_phone: String,
    pub business_website: String,
    pub fields: Vec<(String, String)>,
}

impl FallbackTemplate {
    pub(super) fn new(template_name: &str, identity: &BusinessIdentity, context: &serde_json::Value) -> Self {
        let heading = humanize(template_name);

        let mut fields = Vec::new();
        flatten("", context, &mut fields);

        Self {
            title: format!("{heading} - {}", identity.name),
            heading,
            business_name: identity.name.clone(),
            business_phone: identity.phone.clone(),
            business_website: identity.website.clone(),
            fields,
        }
    }
}

/// `customer_confirmation` -> `Customer Confirmation`
fn humanize(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            for (key, value) in map {
                if prefix.is_empty() && key == "business" {
                    continue;
                }

                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };

                flatten(&path, value, out);
            }
        }
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");

            out.push((prefix.to_string(), joined));
        }
        Value::Null => {}
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}
