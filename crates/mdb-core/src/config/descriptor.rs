//! The `.mdb` project descriptor.
//!
//! A JSON key-value store shared by every command that touches a project.
//! Values are addressed with dotted paths such as `meta.name`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

/// File name of the descriptor in the project root.
pub const DESCRIPTOR_FILE: &str = ".mdb";

pub const KEY_NAME: &str = "meta.name";
pub const KEY_STARTER: &str = "meta.starter";
pub const KEY_DOMAIN: &str = "meta.domain";
pub const KEY_TYPE: &str = "meta.type";
pub const KEY_BACKEND_PLATFORM: &str = "backend.platform";
pub const KEY_WORDPRESS_PAGE: &str = "wordpress.page";
pub const KEY_PUBLISH_METHOD: &str = "publishMethod";
pub const KEY_PACKAGE_MANAGER: &str = "packageManager";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDescriptor {
    path: PathBuf,
    data: Value,
}

impl ProjectDescriptor {
    /// Load `.mdb` from the project root. A missing file yields an empty descriptor.
    pub fn load(project_root: &Path) -> anyhow::Result<Self> {
        let path = project_root.join(DESCRIPTOR_FILE);
        if !path.exists() {
            return Ok(Self {
                path,
                data: Value::Object(Map::new()),
            });
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let data: Value = if content.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        };
        if !data.is_object() {
            anyhow::bail!("{} must contain a JSON object", path.display());
        }

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.data, |node, segment| node.get(segment))
    }

    /// String value at `key`; empty strings count as unset.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get_value(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Set `key`, creating intermediate objects. Non-object intermediates are replaced.
    pub fn set_value(&mut self, key: &str, value: impl Into<Value>) {
        let segments: Vec<&str> = key.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return,
        };

        let mut node = &mut self.data;
        for segment in parents {
            if !node.get(*segment).is_some_and(Value::is_object) {
                if let Some(map) = node.as_object_mut() {
                    map.insert((*segment).to_string(), Value::Object(Map::new()));
                }
            }
            node = match node.get_mut(*segment) {
                Some(next) => next,
                None => return,
            };
        }

        if let Some(map) = node.as_object_mut() {
            map.insert((*last).to_string(), value.into());
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let mut content =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize .mdb")?;
        content.push('\n');
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}
