//! Template renderer

use askama::Template;
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    builtin, fallback::FallbackTemplate, text, BusinessIdentity, TemplateError,
};

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    /// Subject line
    pub subject: String,

    /// CSS-inlined HTML body
    pub html: String,

    /// Plain text body derived from the HTML
    pub text: String,
}

/// Renders named templates into subject, HTML and plain text.
///
/// Templates are Handlebars sources, so they get nested lookups
/// (`{{customer.name}}`), `{{#if}}` and `{{#each}}`. The business identity
/// is available to every template as `business`.
#[derive(Debug)]
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
    identity: BusinessIdentity,
}

impl TemplateRenderer {
    /// Name of the customer quote confirmation template
    pub const CUSTOMER_CONFIRMATION: &'static str = "customer_confirmation";

    /// Name of the new quote notification sent to the business
    pub const BUSINESS_NOTIFICATION: &'static str = "business_notification";

    /// Creates a renderer with the built-in templates registered.
    pub fn new(identity: BusinessIdentity) -> Result<Self, TemplateError> {
        let mut renderer = Self {
            handlebars: Handlebars::new(),
            identity,
        };

        renderer.register(Self::CUSTOMER_CONFIRMATION, builtin::CUSTOMER_CONFIRMATION)?;
        renderer.register(Self::BUSINESS_NOTIFICATION, builtin::BUSINESS_NOTIFICATION)?;

        Ok(renderer)
    }

    /// Registers (or replaces) a template
    pub fn register(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.handlebars
            .register_template_string(name, source)
            .map_err(|err| TemplateError::InvalidTemplate {
                name: name.to_string(),
                message: err.to_string(),
            })
    }

    /// Whether a template with this name is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }

    /// The identity exposed to templates
    pub fn identity(&self) -> &BusinessIdentity {
        &self.identity
    }

    /// Renders `name` with `context`.
    ///
    /// Unknown names render the branded fallback layout instead of failing.
    /// Rendering is pure: the same name and context always give the same
    /// output.
    pub fn render(&self, name: &str, context: &serde_json::Value) -> Result<RenderedEmail, TemplateError> {
        let context = self.with_identity(context);

        let html = if self.has_template(name) {
            self.handlebars.render(name, &context)?
        } else {
            warn!(template = name, "template not found, using fallback layout");

            FallbackTemplate::new(name, &self.identity, &context).render()?
        };

        let html = css_inline::inline(&html)?;

        let subject = text::extract_title(&html)
            .unwrap_or_else(|| self.fallback_subject(name, &context));

        let text = text::html_to_text(&html);

        debug!(template = name, subject = %subject, "template rendered");

        Ok(RenderedEmail { subject, html, text })
    }

    fn with_identity(&self, context: &serde_json::Value) -> serde_json::Value {
        let mut context = match context {
            serde_json::Value::Object(_) => context.clone(),
            serde_json::Value::Null => serde_json::json!({}),
            other => serde_json::json!({ "data": other }),
        };

        if let serde_json::Value::Object(map) = &mut context {
            if !map.contains_key("business") {
                map.insert(
                    "business".to_string(),
                    serde_json::to_value(&self.identity).unwrap_or_default(),
                );
            }
        }

        context
    }

    fn fallback_subject(&self, name: &str, context: &serde_json::Value) -> String {
        let quote_id = lookup(context, "quote_id").unwrap_or_default();

        match name {
            Self::CUSTOMER_CONFIRMATION => {
                format!("Your Moving Quote #{quote_id} - {}", self.identity.name)
            }
            Self::BUSINESS_NOTIFICATION => format!(
                "New Quote Request #{quote_id} from {}",
                lookup(context, "customer.name").unwrap_or_else(|| "a customer".to_string())
            ),
            _ => format!("Message from {}", self.identity.name),
        }
    }
}

/// Resolves a dotted path (`customer.name`) to a display string
pub fn lookup(context: &serde_json::Value, path: &str) -> Option<String> {
    let value = path
        .split('.')
        .try_fold(context, |value, key| value.get(key))?;

    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    fn identity() -> BusinessIdentity {
        BusinessIdentity {
            name: "Smooth Moves".to_string(),
            email: "hello@smoothmoves.test".to_string(),
            phone: "555-0100".to_string(),
            website: "https://smoothmoves.test".to_string(),
            notification_email: "leads@smoothmoves.test".to_string(),
        }
    }

    fn context() -> serde_json::Value {
        json!({
            "quote_id": "Q-1001",
            "customer": {
                "name": "Ada Lovelace",
                "email": "ada@example.com",
                "moving_from": "Boston",
                "moving_to": "Denver",
                "moving_date": null,
                "additional_services": ["Packing", "Storage"],
            }
        })
    }

    #[test]
    fn test_customer_confirmation_renders_subject_and_lists() -> TestResult {
        let renderer = TemplateRenderer::new(identity())?;

        let rendered = renderer.render(TemplateRenderer::CUSTOMER_CONFIRMATION, &context())?;

        assert_eq!(rendered.subject, "Your Moving Quote #Q-1001 - Smooth Moves");
        assert!(rendered.html.contains("Hi Ada Lovelace,"));
        assert!(rendered.html.contains("<li>Packing</li>"));
        assert!(!rendered.html.contains("Date:"));
        assert!(rendered.text.contains("- From: Boston"));
        assert!(!rendered.text.contains('<'));

        Ok(())
    }

    #[test]
    fn test_rendering_is_deterministic() -> TestResult {
        let renderer = TemplateRenderer::new(identity())?;

        let first = renderer.render(TemplateRenderer::BUSINESS_NOTIFICATION, &context())?;
        let second = renderer.render(TemplateRenderer::BUSINESS_NOTIFICATION, &context())?;

        assert_eq!(first, second);
        assert_eq!(first.subject, "New Quote Request #Q-1001 from Ada Lovelace");

        Ok(())
    }

    #[test]
    fn test_missing_template_uses_fallback() -> TestResult {
        let renderer = TemplateRenderer::new(identity())?;

        let rendered = renderer.render("moving_day_reminder", &context())?;

        assert_eq!(rendered.subject, "Moving Day Reminder - Smooth Moves");
        assert!(rendered.text.contains("customer.name Ada Lovelace"));
        assert!(rendered.text.contains("Smooth Moves"));

        Ok(())
    }

    #[test]
    fn test_subject_rule_applies_without_title() -> TestResult {
        let mut renderer = TemplateRenderer::new(identity())?;

        renderer.register(
            TemplateRenderer::CUSTOMER_CONFIRMATION,
            "<p>Thanks {{customer.name}}</p>",
        )?;
        renderer.register("plain", "<p>Hello</p>")?;

        let rendered = renderer.render(TemplateRenderer::CUSTOMER_CONFIRMATION, &context())?;
        assert_eq!(rendered.subject, "Your Moving Quote #Q-1001 - Smooth Moves");

        let rendered = renderer.render("plain", &context())?;
        assert_eq!(rendered.subject, "Message from Smooth Moves");

        Ok(())
    }

    #[test]
    fn test_invalid_template_is_rejected() -> TestResult {
        let mut renderer = TemplateRenderer::new(identity())?;

        let result = renderer.register("broken", "{{#if}}");

        assert!(matches!(result, Err(TemplateError::InvalidTemplate { .. })));

        Ok(())
    }

    #[test]
    fn test_lookup_nested_paths() {
        let context = context();

        assert_eq!(lookup(&context, "customer.moving_to"), Some("Denver".to_string()));
        assert_eq!(lookup(&context, "customer.moving_date"), None);
        assert_eq!(lookup(&context, "customer.missing.deeper"), None);
    }
}
