// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `worker-agent config get|set|unset` — an idempotent editor for a fixed
//! set of config-file keys, using `toml_edit` so comments and formatting
//! in an operator-maintained file survive the edit.

use std::path::Path;

use anyhow::{bail, Context, Result};
use toml_edit::{value, DocumentMut};

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::{default_config_path, EDITABLE_KEYS};
use crate::exit_error::ExitError;

pub fn execute(args: ConfigArgs) -> Result<()> {
    let path = args.config_file.unwrap_or_else(default_config_path);
    match args.action {
        ConfigAction::Get { key } => get(&path, &key),
        ConfigAction::Set { key, value } => set(&path, &key, &value),
        ConfigAction::Unset { key } => unset(&path, &key),
    }
}

fn require_editable(key: &str) -> Result<()> {
    if EDITABLE_KEYS.contains(&key) {
        Ok(())
    } else {
        bail!(ExitError::new(
            1,
            format!("unrecognized config key {key:?}; must be one of {}", EDITABLE_KEYS.join(", "))
        ))
    }
}

fn load_document(path: &Path) -> Result<DocumentMut> {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.parse::<DocumentMut>().with_context(|| format!("parsing {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DocumentMut::new()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

fn save_document(path: &Path, doc: &DocumentMut) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, doc.to_string()).with_context(|| format!("writing {}", path.display()))
}

fn get(path: &Path, key: &str) -> Result<()> {
    require_editable(key)?;
    let doc = load_document(path)?;
    match doc.get(key) {
        Some(item) => {
            println!("{}", item.to_string().trim());
            Ok(())
        }
        None => bail!(ExitError::new(1, format!("{key} is not set"))),
    }
}

fn set(path: &Path, key: &str, raw_value: &str) -> Result<()> {
    require_editable(key)?;
    let mut doc = load_document(path)?;
    doc[key] = parse_value(key, raw_value)?;
    save_document(path, &doc)
}

fn unset(path: &Path, key: &str) -> Result<()> {
    require_editable(key)?;
    let mut doc = load_document(path)?;
    doc.remove(key);
    save_document(path, &doc)
}

/// `shutdown_on_stop` and `allow_ec2_instance_profile` are booleans; the
/// rest are plain strings.
fn parse_value(key: &str, raw: &str) -> Result<toml_edit::Item> {
    match key {
        "shutdown_on_stop" | "allow_ec2_instance_profile" => match raw {
            "true" | "false" => Ok(value(raw == "true")),
            _ => bail!(ExitError::new(1, format!("{key} must be \"true\" or \"false\", got {raw:?}"))),
        },
        _ => Ok(value(raw)),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
