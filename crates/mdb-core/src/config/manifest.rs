//! `package.json` access.
//!
//! [`BuildManifest`] is the typed, read-only view used for recipe selection.
//! [`PackageJson`] keeps the raw document so individual fields can be
//! rewritten without disturbing the rest of the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

pub const MANIFEST_FILE: &str = "package.json";

/// Declared dependencies and scripts of the local project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Value>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, Value>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

impl BuildManifest {
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("Failed to parse package.json")
    }

    /// True when `name` is declared in `dependencies` or `devDependencies`.
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }

    pub fn build_script(&self) -> Option<&str> {
        self.scripts
            .get("build")
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Editable `package.json` document.
#[derive(Debug, Clone)]
pub struct PackageJson {
    path: PathBuf,
    raw: Value,
}

impl PackageJson {
    /// Load `package.json` from the project root; `None` when absent.
    pub fn load(project_root: &Path) -> anyhow::Result<Option<Self>> {
        let path = project_root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if !raw.is_object() {
            anyhow::bail!("{} must contain a JSON object", path.display());
        }
        Ok(Some(Self { path, raw }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> anyhow::Result<BuildManifest> {
        serde_json::from_value(self.raw.clone())
            .with_context(|| format!("Invalid manifest: {}", self.path.display()))
    }

    pub fn name(&self) -> Option<&str> {
        self.raw
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        if let Some(map) = self.raw.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let mut content =
            serde_json::to_string_pretty(&self.raw).context("Failed to serialize package.json")?;
        content.push('\n');
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}
