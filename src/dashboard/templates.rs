// src/dashboard/templates.rs — Namespaced template loading on minijinja
//
// Template names are `namespace/relative/path.html`. Each namespace maps to
// either a directory on disk or a set of templates compiled into the binary.
// The first registration of a namespace wins.

use minijinja::{Environment, ErrorKind};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::infra::errors::BotError;

/// Dashboard shell templates shipped with the binary.
const ADMIN_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/admin/base.html")),
    ("index.html", include_str!("../../templates/admin/index.html")),
    ("login.html", include_str!("../../templates/admin/login.html")),
    ("overview.html", include_str!("../../templates/admin/overview.html")),
];

#[derive(Debug, Clone)]
enum TemplateSource {
    Dir(PathBuf),
    Embedded(HashMap<&'static str, &'static str>),
}

type SourceMap = Arc<RwLock<HashMap<String, TemplateSource>>>;

pub struct TemplateRenderer {
    env: Environment<'static>,
    sources: SourceMap,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let sources: SourceMap = Arc::default();
        let loader_sources = sources.clone();

        let mut env = Environment::new();
        env.set_loader(move |name| load(&loader_sources, name));

        let renderer = Self { env, sources };
        renderer.add_embedded("admin", ADMIN_TEMPLATES);
        renderer
    }

    /// Serve `namespace/*` from `path`. Errors if the directory is missing;
    /// a namespace that is already registered is left untouched.
    pub fn add_template_dir(&self, namespace: &str, path: &Path) -> Result<(), BotError> {
        let path = path.canonicalize().map_err(|_| BotError::TemplateDirMissing {
            path: path.display().to_string(),
        })?;
        if !path.is_dir() {
            return Err(BotError::TemplateDirMissing {
                path: path.display().to_string(),
            });
        }

        let mut sources = self.sources.write().unwrap_or_else(|p| p.into_inner());
        if sources.contains_key(namespace) {
            tracing::debug!(namespace, "Template namespace already registered");
            return Ok(());
        }
        tracing::debug!(namespace, path = %path.display(), "Registered template directory");
        sources.insert(namespace.to_string(), TemplateSource::Dir(path));
        Ok(())
    }

    /// Serve `namespace/*` from templates compiled into the binary.
    pub fn add_embedded(&self, namespace: &str, templates: &[(&'static str, &'static str)]) {
        let mut sources = self.sources.write().unwrap_or_else(|p| p.into_inner());
        if sources.contains_key(namespace) {
            tracing::debug!(namespace, "Template namespace already registered");
            return;
        }
        sources.insert(
            namespace.to_string(),
            TemplateSource::Embedded(templates.iter().copied().collect()),
        );
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.sources
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(namespace)
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, BotError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn load(sources: &SourceMap, name: &str) -> Result<Option<String>, minijinja::Error> {
    let Some((namespace, rest)) = split_name(name) else {
        return Ok(None);
    };

    let source = {
        let sources = sources.read().unwrap_or_else(|p| p.into_inner());
        match sources.get(namespace) {
            Some(source) => source.clone(),
            None => return Ok(None),
        }
    };

    match source {
        TemplateSource::Embedded(templates) => Ok(templates.get(rest).map(|s| s.to_string())),
        TemplateSource::Dir(dir) => match std::fs::read_to_string(dir.join(rest)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template {name}"),
            )
            .with_source(e)),
        },
    }
}

/// `ns/path` → (`ns`, `path`). Rejects traversal and absolute paths.
fn split_name(name: &str) -> Option<(&str, &str)> {
    if name.contains("..") || name.contains('\\') || name.starts_with('/') {
        return None;
    }
    let (namespace, rest) = name.split_once('/')?;
    if namespace.is_empty() || rest.is_empty() {
        return None;
    }
    Some((namespace, rest))
}
