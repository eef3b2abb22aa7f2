//! Template errors

use thiserror::Error;
use tracing::debug;

/// Errors that can occur while rendering an email
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A template source failed to parse
    #[error("invalid template \"{name}\": {message}")]
    InvalidTemplate {
        /// Template name
        name: String,
        /// Parser message
        message: String,
    },

    /// Rendering failed
    #[error("could not render template: {0}")]
    RenderError(String),

    /// CSS inlining failed
    #[error("could not inline css: {0}")]
    InlineError(String),
}

impl From<handlebars::RenderError> for TemplateError {
    fn from(err: handlebars::RenderError) -> Self {
        debug!("RenderError -> TemplateError");

        TemplateError::RenderError(err.to_string())
    }
}

impl From<askama::Error> for TemplateError {
    fn from(err: askama::Error) -> Self {
        debug!("askama::Error -> TemplateError");

        TemplateError::RenderError(err.to_string())
    }
}

impl From<css_inline::InlineError> for TemplateError {
    fn from(err: css_inline::InlineError) -> Self {
        debug!("InlineError -> TemplateError");

        TemplateError::InlineError(err.to_string())
    }
}
