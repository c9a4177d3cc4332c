//! Themed error pages looked up by status code.

use crate::error::{FaultlineError, Result};
use crate::render::{builtin, escape_html};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// One place an error page may live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRoot {
    Directory(PathBuf),
    /// The pages shipped with this crate.
    Builtin,
}

/// Ordered roots consulted for an error page; the first hit wins.
///
/// Built fresh for every render from the view engine's paths, so concurrent
/// requests never share or mutate a lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPageSearchPath {
    roots: Vec<ViewRoot>,
}

impl ErrorPageSearchPath {
    /// `<path>/errors` for each view path, in order, then the built-in pages.
    pub fn build(view_paths: &[PathBuf]) -> Self {
        let roots = view_paths
            .iter()
            .map(|path| ViewRoot::Directory(path.join("errors")))
            .chain(std::iter::once(ViewRoot::Builtin))
            .collect();
        Self { roots }
    }

    pub fn roots(&self) -> &[ViewRoot] {
        &self.roots
    }
}

/// The view layer as seen by the HTML renderer.
pub trait ViewEngine: Send + Sync + 'static {
    /// The engine's configured view directories.
    fn paths(&self) -> Vec<PathBuf>;

    fn exists(&self, search_path: &ErrorPageSearchPath, name: &str) -> bool;

    fn render(&self, search_path: &ErrorPageSearchPath, name: &str, context: &Value)
    -> Result<String>;
}

/// Reads `<root>/<name>.html` files and fills `{{ key.path }}` placeholders
/// from the context. `{{ key | fallback }}` uses `fallback` when the value is
/// missing or empty. Every substituted value is HTML-escaped.
#[derive(Debug, Clone, Default)]
pub struct FileViewEngine {
    paths: Vec<PathBuf>,
}

impl FileViewEngine {
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// An engine that only knows the built-in pages.
    pub fn builtin() -> Self {
        Self::default()
    }

    fn find(&self, search_path: &ErrorPageSearchPath, name: &str) -> Option<Source> {
        search_path.roots().iter().find_map(|root| match root {
            ViewRoot::Directory(dir) => {
                let file = dir.join(format!("{}.html", name));
                file.is_file().then_some(Source::File(file))
            }
            ViewRoot::Builtin => builtin::page(name).map(Source::Builtin),
        })
    }
}

enum Source {
    File(PathBuf),
    Builtin(String),
}

impl ViewEngine for FileViewEngine {
    fn paths(&self) -> Vec<PathBuf> {
        self.paths.clone()
    }

    fn exists(&self, search_path: &ErrorPageSearchPath, name: &str) -> bool {
        self.find(search_path, name).is_some()
    }

    fn render(
        &self,
        search_path: &ErrorPageSearchPath,
        name: &str,
        context: &Value,
    ) -> Result<String> {
        let template = match self.find(search_path, name) {
            Some(Source::File(file)) => read_template(&file, name)?,
            Some(Source::Builtin(template)) => template,
            None => return Err(FaultlineError::view(name, "not found in any error path")),
        };
        interpolate(&template, context).map_err(|message| FaultlineError::view(name, message))
    }
}

fn read_template(file: &Path, name: &str) -> Result<String> {
    fs::read_to_string(file)
        .map_err(|e| FaultlineError::view(name, format!("{}: {}", file.display(), e)))
}

pub(crate) fn interpolate(template: &str, context: &Value) -> std::result::Result<String, String> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| "unterminated placeholder".to_string())?;

        let expression = &after[..end];
        let (path, fallback) = match expression.split_once('|') {
            Some((path, fallback)) => (path.trim(), Some(fallback.trim())),
            None => (expression.trim(), None),
        };

        let value = lookup(context, path).filter(|value| !value.is_empty());
        output.push_str(&escape_html(
            value.as_deref().or(fallback).unwrap_or_default(),
        ));
        rest = &after[end + 2..];
    }

    output.push_str(rest);
    Ok(output)
}

fn lookup(context: &Value, path: &str) -> Option<String> {
    let value = path
        .split('.')
        .try_fold(context, |value, key| value.get(key))?;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("faultline-{}-{}", label, nanos));
        fs::create_dir_all(dir.join("errors")).unwrap();
        dir
    }

    #[test]
    fn test_search_path_order() {
        let path = ErrorPageSearchPath::build(&[PathBuf::from("/theme"), PathBuf::from("/app")]);
        assert_eq!(
            path.roots(),
            &[
                ViewRoot::Directory(PathBuf::from("/theme/errors")),
                ViewRoot::Directory(PathBuf::from("/app/errors")),
                ViewRoot::Builtin,
            ]
        );
    }

    #[test]
    fn test_interpolate_escapes_and_falls_back() {
        let context = json!({ "exception": { "message": "<b>nope</b>" }, "status": 403 });
        let rendered = interpolate(
            "{{ status }}: {{ exception.message }} / {{ missing | Forbidden }}",
            &context,
        )
        .unwrap();
        assert_eq!(rendered, "403: &lt;b&gt;nope&lt;/b&gt; / Forbidden");
    }

    #[test]
    fn test_unterminated_placeholder_is_an_error() {
        assert!(interpolate("{{ status", &json!({})).is_err());
    }

    #[test]
    fn test_theme_directory_wins_over_builtin() {
        let dir = temp_dir("theme");
        fs::write(dir.join("errors/404.html"), "themed {{ status }}").unwrap();

        let engine = FileViewEngine::new([dir.clone()]);
        let path = ErrorPageSearchPath::build(&engine.paths());

        assert!(engine.exists(&path, "404"));
        let rendered = engine.render(&path, "404", &json!({ "status": 404 })).unwrap();
        assert_eq!(rendered, "themed 404");

        // 500 is not themed, so the built-in page answers.
        let rendered = engine.render(&path, "500", &json!({ "status": 500 })).unwrap();
        assert!(rendered.contains("Server Error"));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_unknown_page_does_not_exist() {
        let engine = FileViewEngine::builtin();
        let path = ErrorPageSearchPath::build(&engine.paths());
        assert!(!engine.exists(&path, "418"));
        assert!(matches!(
            engine.render(&path, "418", &json!({})),
            Err(FaultlineError::View { .. })
        ));
    }
}
