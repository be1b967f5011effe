use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;

use crate::clients::errors::TemplateNotFoundError;

/// Escapes `&`, `<`, `>` and both quote characters, safe for text and
/// quoted attribute values.
pub use htmlescape::encode_minimal as escape_html;

/// Loads HTML templates from a directory, caching them by name for the
/// lifetime of the process.
pub struct TemplateLoader {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl TemplateLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        TemplateLoader {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load(&self, name: &str) -> Result<Arc<str>, TemplateNotFoundError> {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let not_found = || TemplateNotFoundError {
            name: name.to_string(),
        };
        // only plain file names inside the template directory
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(not_found());
        }

        let path = self.dir.join(name);
        let contents: Arc<str> = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents.into(),
            Err(e) => {
                debug!("Failed to read template {path:?}: {e}");
                return Err(not_found());
            }
        };

        debug!("Loaded template {name}");
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&contents));
        Ok(contents)
    }
}

/// Fill `{{key}}` placeholders with HTML-escaped values and `{{{key}}}`
/// placeholders with raw values. Unknown keys render as nothing.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (open, close, raw) = if tail.starts_with("{{{") {
            (3, "}}}", true)
        } else {
            (2, "}}", false)
        };

        let Some(end) = tail[open..].find(close) else {
            out.push_str(tail);
            return out;
        };
        let key = tail[open..open + end].trim();
        let value = vars
            .iter()
            .find(|(k, _)| *k == key)
            .map_or("", |(_, v)| *v);
        if raw {
            out.push_str(value);
        } else {
            out.push_str(&escape_html(value));
        }
        rest = &tail[open + end + close.len()..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_template_does_not_poison_cache() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("page.html"), "<p>{{x}}</p>")
            .await
            .unwrap();
        let loader = TemplateLoader::new(dir.path());

        let err = loader.load("missing_template").await.unwrap_err();
        assert_eq!(err.name, "missing_template");
        assert_eq!(&*loader.load("page.html").await.unwrap(), "<p>{{x}}</p>");
    }

    #[tokio::test]
    async fn loaded_templates_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        tokio::fs::write(&path, "first").await.unwrap();
        let loader = TemplateLoader::new(dir.path());

        assert_eq!(&*loader.load("page.html").await.unwrap(), "first");
        tokio::fs::write(&path, "second").await.unwrap();
        assert_eq!(&*loader.load("page.html").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn path_traversal_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TemplateLoader::new(dir.path().join("templates"));
        tokio::fs::write(dir.path().join("secret.txt"), "x").await.unwrap();
        assert!(loader.load("../secret.txt").await.is_err());
        assert!(loader.load("").await.is_err());
    }

    #[test]
    fn render_escapes_and_substitutes() {
        let html = render(
            "<h1>{{ title }}</h1>{{{body}}}{{missing}}",
            &[("title", "Rock & <Roll>"), ("body", "<ul></ul>")],
        );
        assert_eq!(html, "<h1>Rock &amp; &lt;Roll&gt;</h1><ul></ul>");
    }

    #[test]
    fn render_escapes_quotes_for_attributes() {
        let html = render("<a title=\"{{t}}\">", &[("t", "say \"hi\" & 'bye'")]);
        assert_eq!(html, "<a title=\"say &quot;hi&quot; &amp; &#x27;bye&#x27;\">");
    }

    #[test]
    fn render_keeps_unterminated_placeholder() {
        assert_eq!(render("a {{b", &[("b", "x")]), "a {{b");
    }
}
