//! Static pages and HTML templates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Entry document of the single-page app.
pub const INDEX_DOCUMENT: &str = "index.html";

/// Legal and informational pages served as fixed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticPage {
    Statement,
    Privacy,
    Terms,
    Fediverse,
    FediDeleteRequest,
}

impl StaticPage {
    pub const ALL: [StaticPage; 5] = [
        StaticPage::Statement,
        StaticPage::Privacy,
        StaticPage::Terms,
        StaticPage::Fediverse,
        StaticPage::FediDeleteRequest,
    ];

    pub fn route(self) -> &'static str {
        match self {
            StaticPage::Statement => "/statement",
            StaticPage::Privacy => "/privacy",
            StaticPage::Terms => "/terms",
            StaticPage::Fediverse => "/fediverse",
            StaticPage::FediDeleteRequest => "/fedi-delete-request",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            StaticPage::Statement => "statement.html",
            StaticPage::Privacy => "privacy-policy.html",
            StaticPage::Terms => "terms-and-conditions.html",
            StaticPage::Fediverse => "data-transfer.html",
            StaticPage::FediDeleteRequest => "fedi-delete-request.html",
        }
    }
}

/// Locations of static files and templates.
#[derive(Clone)]
pub struct Pages {
    static_dir: Arc<PathBuf>,
    template_dir: Arc<PathBuf>,
}

impl Pages {
    pub fn new(static_dir: impl Into<PathBuf>, template_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: Arc::new(static_dir.into()),
            template_dir: Arc::new(template_dir.into()),
        }
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.static_dir.join(INDEX_DOCUMENT)
    }

    pub fn page_path(&self, page: StaticPage) -> PathBuf {
        self.static_dir.join(page.file_name())
    }

    /// Load `template` from the template directory and fill in `vars`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the template cannot be read.
    pub async fn render(&self, template: &str, vars: &[(&str, &str)]) -> AppResult<String> {
        let path = self.template_dir.join(template);
        let source = fs::read_to_string(&path).await.map_err(|e| {
            AppError::Internal(format!("Cannot read template {}: {e}", path.display()))
        })?;
        debug!(template, "Rendering template");
        Ok(render_template(&source, vars))
    }
}

/// Replace `{{ name }}` placeholders.
///
/// Both `{{ name }}` and `{{name}}` are accepted. Unknown placeholders are
/// left as they are; values are inserted verbatim.
pub fn render_template(source: &str, vars: &[(&str, &str)]) -> String {
    let mut out = source.to_string();
    for (name, value) in vars {
        out = out
            .replace(&format!("{{{{ {name} }}}}"), value)
            .replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

/// Serialize `value` for embedding inside an inline `<script>` element.
///
/// `<`, `>` and `&` are written as `\u003c`, `\u003e` and `\u0026`, so a
/// string holding `</script>` or `<!--` cannot end the element. The output
/// is still valid JSON and evaluates to the same value.
pub fn script_json(value: &serde_json::Value) -> String {
    let json = value.to_string();
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template_both_spacings() {
        let out = render_template(
            "<a href=\"{{ api_server_endpoint }}\">{{api_server_endpoint}}</a>",
            &[("api_server_endpoint", "https://api.example")],
        );
        assert_eq!(
            out,
            "<a href=\"https://api.example\">https://api.example</a>"
        );
    }

    #[test]
    fn test_render_template_leaves_unknown() {
        let out = render_template("{{ other }}", &[("data", "1")]);
        assert_eq!(out, "{{ other }}");
    }

    #[test]
    fn test_script_json_cannot_close_script_element() {
        let value = serde_json::json!({"note": "</script><script>alert(1)</script>"});
        let out = script_json(&value);

        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
        assert_eq!(
            out,
            r#"{"note":"\u003c/script\u003e\u003cscript\u003ealert(1)\u003c/script\u003e"}"#
        );
        let back: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_script_json_escapes_ampersand() {
        let value = serde_json::json!({"q": "a&b", "n": 1});
        assert_eq!(script_json(&value), r#"{"n":1,"q":"a\u0026b"}"#);
    }

    #[test]
    fn test_static_page_files() {
        assert_eq!(StaticPage::Privacy.file_name(), "privacy-policy.html");
        assert_eq!(StaticPage::Fediverse.file_name(), "data-transfer.html");
        assert_eq!(StaticPage::ALL.len(), 5);
    }

    #[tokio::test]
    async fn test_render_reads_template_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "<p>{{ data }}</p>").unwrap();
        let pages = Pages::new("static", dir.path());

        let html = pages.render("page.html", &[("data", "null")]).await.unwrap();
        assert_eq!(html, "<p>null</p>");
    }

    #[tokio::test]
    async fn test_render_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let pages = Pages::new("static", dir.path());

        assert!(matches!(
            pages.render("missing.html", &[]).await,
            Err(AppError::Internal(_))
        ));
    }
}
