//! Template loading and placeholder substitution for HTML pages

use crate::error::AppError;
use rust_embed::RustEmbed;
use std::borrow::Cow;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Built-in pages: the default listing template written out on first start,
/// and the error page.
#[derive(RustEmbed)]
#[folder = "assets"]
struct Assets;

pub const DEFAULT_TEMPLATE_NAME: &str = "index.html";
const ERROR_TEMPLATE_NAME: &str = "error.html";

/// A template document with `{{ name }}` placeholders.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Load a template from the file system. A missing or unreadable file is
    /// reported as `TemplateMissing`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        fs::read_to_string(path)
            .map(Self::new)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidData => AppError::InternalServerError(format!(
                    "Template {} is not valid UTF-8",
                    path.display()
                )),
                _ => AppError::TemplateMissing(path.display().to_string()),
            })
    }

    /// Load one of the embedded templates.
    pub fn embedded(name: &str) -> Result<Self, AppError> {
        let file = Assets::get(name)
            .ok_or_else(|| AppError::TemplateMissing(format!("embedded:{name}")))?;
        Ok(Self::new(String::from_utf8_lossy(&file.data).into_owned()))
    }

    /// Render into a fresh copy; the template itself is never modified.
    /// Variables are substituted in the order given. Placeholders without a
    /// variable are left untouched.
    pub fn render(&self, variables: &[(&str, String)]) -> String {
        let mut rendered = self.source.clone();
        for (key, value) in variables {
            let placeholder = format!("{{{{ {key} }}}}");
            rendered = rendered.replace(&placeholder, value);
        }
        rendered
    }
}

/// Raw bytes of the default directory listing template.
pub fn default_listing_template() -> Option<Cow<'static, [u8]>> {
    Assets::get(DEFAULT_TEMPLATE_NAME).map(|file| file.data)
}

/// Generate error page HTML using the embedded template
pub fn render_error_page(
    status_code: u16,
    status_text: &str,
    description: &str,
) -> Result<String, AppError> {
    let template = Template::embedded(ERROR_TEMPLATE_NAME)?;
    Ok(template.render(&[
        ("status_code", status_code.to_string()),
        ("status_text", status_text.to_string()),
        ("description", description.to_string()),
    ]))
}

/// Get human-friendly error descriptions
pub fn get_error_description(status_code: u16) -> &'static str {
    match status_code {
        400 => "The request could not be understood due to malformed syntax.",
        403 => "Access to this resource is forbidden.",
        404 => "The requested file or directory could not be found.",
        405 => "The request method is not allowed for this resource.",
        413 => "The uploaded file is larger than this server accepts.",
        416 => "The requested byte range lies outside the file.",
        500 => "An internal server error occurred while processing your request.",
        _ => "An unexpected error occurred while processing your request.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let template = Template::new("<title>{{ path }}</title><h1>{{ path }}</h1>{{ other }}");
        let html = template.render(&[("path", "/docs/".to_string())]);
        assert_eq!(html, "<title>/docs/</title><h1>/docs/</h1>{{ other }}");
    }

    #[test]
    fn test_render_order_is_fixed() {
        let template = Template::new("<p>{{ path }}</p><ul>{{ files }}</ul>");
        let variables = [
            ("path", "/{{ files }}/".to_string()),
            ("files", "<li>x</li>".to_string()),
            ("hosted_directory", "Files".to_string()),
        ];
        let expected = "<p>/<li>x</li>/</p><ul><li>x</li></ul>";
        for _ in 0..8 {
            assert_eq!(template.render(&variables), expected);
        }

        let reversed = [
            ("files", "<li>x</li>".to_string()),
            ("path", "/{{ files }}/".to_string()),
        ];
        assert_eq!(
            template.render(&reversed),
            "<p>/{{ files }}/</p><ul><li>x</li></ul>"
        );
    }

    #[test]
    fn test_missing_template_file() {
        let err = Template::load(Path::new("/definitely/not/here.html")).unwrap_err();
        assert!(matches!(err, AppError::TemplateMissing(_)));
        assert_eq!(err.status().0, 500);
    }

    #[test]
    fn test_embedded_templates_have_placeholders() {
        let listing = default_listing_template().unwrap();
        let listing = String::from_utf8_lossy(&listing);
        assert!(listing.contains("{{ path }}"));
        assert!(listing.contains("{{ files }}"));
        assert!(listing.contains("{{ hosted_directory }}"));

        let page = render_error_page(404, "Not Found", get_error_description(404)).unwrap();
        assert!(page.contains("404"));
        assert!(page.contains("could not be found"));
    }
}
