//! Template enumeration and metadata parsing.
//!
//! Templates are enumerated per plugin from `<templates_root>/<plugin>/<template>.yaml`.
//! The registry's only contract is lookup and metadata parsing — rendering is
//! delegated to plugins (`crate::plugins`); the registry never executes
//! template logic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;
use crate::Result;

use super::schema::FieldSpec;

#[derive(Debug, Clone, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    custom_fields: BTreeMap<String, FieldSpec>,
}

#[derive(Debug, Clone)]
pub struct TemplateDef {
    pub plugin: String,
    pub name: String,
    pub extension: String,
    pub schema: BTreeMap<String, FieldSpec>,
}

pub struct TemplateRegistry {
    templates: BTreeMap<(String, String), TemplateDef>,
}

impl TemplateRegistry {
    /// Walk `<templates_root>/<plugin>/<template>.yaml` and parse every
    /// template declaration found.
    pub fn discover(templates_root: &Path) -> Result<Self> {
        let mut templates = BTreeMap::new();
        if !templates_root.is_dir() {
            return Ok(Self { templates });
        }
        for plugin_entry in std::fs::read_dir(templates_root)
            .map_err(|e| Error::io_path("listing templates root", templates_root, e))?
        {
            let plugin_entry = plugin_entry.map_err(|e| Error::io_path("reading templates root entry", templates_root, e))?;
            if !plugin_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let plugin_name = plugin_entry.file_name().to_string_lossy().to_string();
            let plugin_dir = plugin_entry.path();
            for template_entry in std::fs::read_dir(&plugin_dir)
                .map_err(|e| Error::io_path("listing plugin directory", &plugin_dir, e))?
            {
                let template_entry = template_entry.map_err(|e| Error::io_path("reading plugin directory entry", &plugin_dir, e))?;
                let path = template_entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                    continue;
                }
                let template_name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .ok_or_else(|| Error::config(format!("unreadable template filename: {}", path.display())))?;
                let def = parse_template_file(&path, &plugin_name, &template_name)?;
                templates.insert((plugin_name.clone(), template_name), def);
            }
        }
        Ok(Self { templates })
    }

    pub fn get(&self, plugin: &str, template: &str) -> Result<&TemplateDef> {
        self.templates
            .get(&(plugin.to_string(), template.to_string()))
            .ok_or_else(|| Error::validation(format!("unknown template '{template}' for plugin '{plugin}'")))
    }

    pub fn all(&self) -> impl Iterator<Item = &TemplateDef> {
        self.templates.values()
    }
}

fn parse_template_file(path: &PathBuf, plugin: &str, name: &str) -> Result<TemplateDef> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io_path("reading template file", path, e))?;
    let parsed: TemplateFile = serde_yaml::from_str(&raw)
        .map_err(|e| Error::config(format!("invalid template metadata in {}: {e}", path.display())))?;
    Ok(TemplateDef {
        plugin: plugin.to_string(),
        name: name.to_string(),
        extension: parsed.extension.unwrap_or_else(|| "txt".to_string()),
        schema: parsed.custom_fields,
    })
}
