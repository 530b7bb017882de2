//! INI rendering of Ansible inventories.
//!
//! Per host `h`:
//!
//! ```ini
//! [h]
//! h
//!
//! [h:vars]
//! ansible_host=10.0.0.1
//! ansible_user=cloud-user
//! ```
//!
//! Group membership goes into `[<group>:children]` sections and the target
//! hosts of a file are listed under `[hosts:children]`.
use std::path::Path;

use serde_json::Value;

use crate::inventory::error::{InventoryError, InventoryResult};
use crate::kernel::constants::ASSETS_DIR_NAME;
use crate::resources::{Asset, Resource};

/// Group listing the target hosts of an inventory file
pub const HOSTS_GROUP: &str = "hosts";

const CHILDREN_SUFFIX: &str = ":children";
const VARS_SUFFIX: &str = ":vars";

/// One `[name]` block and its lines, blank lines dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub lines: Vec<String>,
}

impl Section {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self { name: name.into(), lines }
    }
}

/// An inventory file as an ordered list of sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<Section>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let mut document = Self::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
                document.sections.push(Section::new(name.trim(), Vec::new()));
            } else if let Some(section) = document.sections.last_mut() {
                section.lines.push(line.to_string());
            }
        }
        document
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, section) in self.sections.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section.name));
            for line in &section.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Replace a section in place, or append it
    pub fn upsert(&mut self, section: Section) {
        match self.sections.iter_mut().find(|existing| existing.name == section.name) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
    }

    /// Add a member line to a `[group:children]` section, creating it when missing
    pub fn add_child(&mut self, group: &str, member: &str) {
        let name = format!("{}{}", group, CHILDREN_SUFFIX);
        match self.sections.iter_mut().find(|section| section.name == name) {
            Some(section) => {
                if !section.lines.iter().any(|line| line == member) {
                    section.lines.push(member.to_string());
                }
            }
            None => self.sections.push(Section::new(name, vec![member.to_string()])),
        }
    }

    /// The `ansible_host` recorded for a host, if present
    pub fn host_address(&self, host: &str) -> Option<&str> {
        self.section(&format!("{}{}", host, VARS_SUFFIX))?
            .lines
            .iter()
            .find_map(|line| line.strip_prefix("ansible_host="))
    }

    /// Host names, i.e. the sections that have a `:vars` companion
    pub fn hosts(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|section| !section.name.contains(':'))
            .filter(|section| self.section(&format!("{}{}", section.name, VARS_SUFFIX)).is_some())
            .map(|section| section.name.as_str())
            .collect()
    }

    /// Drop a host's sections and every group membership line naming it.
    /// Children groups left empty are dropped too.
    pub fn remove_host(&mut self, host: &str) {
        let vars = format!("{}{}", host, VARS_SUFFIX);
        self.sections.retain(|section| section.name != host && section.name != vars);
        for section in &mut self.sections {
            if section.name.ends_with(CHILDREN_SUFFIX) {
                section.lines.retain(|line| line != host);
            }
        }
        self.sections
            .retain(|section| !(section.name.ends_with(CHILDREN_SUFFIX) && section.lines.is_empty()));
    }

    /// Add or refresh the sections of one concrete host
    pub fn insert_host(&mut self, asset: &Asset, data_folder: &Path) -> InventoryResult<()> {
        let [alias, vars] = host_sections(asset, data_folder)?;
        self.upsert(alias);
        self.upsert(vars);
        for group in asset.group_names() {
            self.add_child(group, asset.name());
        }
        Ok(())
    }
}

/// Render an inventory holding `hosts`, all listed under `[hosts:children]`
pub fn render_hosts(hosts: &[&Asset], data_folder: &Path) -> InventoryResult<IniDocument> {
    let mut document = IniDocument::new();
    for asset in hosts {
        document.insert_host(asset, data_folder)?;
    }
    for asset in hosts {
        document.add_child(HOSTS_GROUP, asset.name());
    }
    Ok(document)
}

/// The `[name]` alias section and the `[name:vars]` section of a host
pub fn host_sections(asset: &Asset, data_folder: &Path) -> InventoryResult<[Section; 2]> {
    let ip = asset
        .ip_address()
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| InventoryError::MissingAddress {
            host: asset.name().to_string(),
        })?;

    let mut vars = vec![format!("ansible_host={}", ip)];
    for (key, value) in asset.ansible_params() {
        if key == "ansible_host" {
            continue;
        }
        vars.push(format!("{}={}", key, render_var(key, value, data_folder)));
    }

    Ok([
        Section::new(asset.name(), vec![asset.name().to_string()]),
        Section::new(format!("{}{}", asset.name(), VARS_SUFFIX), vars),
    ])
}

/// Scalars as-is, structures as JSON. Relative `*_file` values point into the assets folder.
fn render_var(key: &str, value: &Value, data_folder: &Path) -> String {
    match value {
        Value::String(s) if key.ends_with("_file") && Path::new(s).is_relative() => data_folder
            .join(ASSETS_DIR_NAME)
            .join(s)
            .display()
            .to_string(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
