//! On-disk template loading with a compiled-program cache.

use crate::error::{AkibareError, Result};
use crate::{RenderSettings, Template};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Loads template files and caches the compiled result per path.
///
/// The cache lock is held across compilation, so each file is read and
/// compiled at most once even under concurrent first access. Cached
/// programs are shared via `Arc` and never invalidated; restart to pick
/// up edited files.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: Mutex<HashMap<PathBuf, Arc<Template>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the compiled template for `path`, loading and compiling it on
    /// first access.
    pub fn get_or_compile(&self, path: impl AsRef<Path>) -> Result<Arc<Template>> {
        let path = path.as_ref();
        let mut templates = self
            .templates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(template) = templates.get(path) {
            return Ok(Arc::clone(template));
        }

        let source = std::fs::read_to_string(path).map_err(|source| AkibareError::Load {
            path: path.display().to_string(),
            source,
        })?;
        let template = Arc::new(Template::compile(&source)?);
        templates.insert(path.to_path_buf(), Arc::clone(&template));
        Ok(template)
    }

    /// Load, compile (or reuse) and render `path` in one call.
    pub fn render_file(
        &self,
        path: impl AsRef<Path>,
        context: serde_json::Value,
        settings: &RenderSettings,
    ) -> Result<String> {
        self.get_or_compile(path)?.render_with(context, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;

    fn write_template(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_render_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(&dir, "greet.hbs", "Hello {{name}}!");
        let cache = TemplateCache::new();
        let result = cache
            .render_file(&path, json!({"name": "world"}), &RenderSettings::new())
            .unwrap();
        assert_eq!(result, "Hello world!");
    }

    #[test]
    fn test_compiled_template_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(&dir, "t.hbs", "{{n}}");
        let cache = TemplateCache::new();
        let first = cache.get_or_compile(&path).unwrap();
        // edits after first load are not observed
        write_template(&dir, "t.hbs", "changed");
        let second = cache.get_or_compile(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.render(json!({"n": 7})).unwrap(), "7");
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let cache = TemplateCache::new();
        let err = cache.get_or_compile("/no/such/template.hbs").unwrap_err();
        assert!(matches!(err, AkibareError::Load { .. }));
    }

    #[test]
    fn test_bad_template_is_a_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(&dir, "bad.hbs", "{{#list}}x{{/other}}");
        let cache = TemplateCache::new();
        let err = cache.get_or_compile(&path).unwrap_err();
        assert!(matches!(err, AkibareError::Compile { .. }));
    }
}
