// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker capability declaration (spec §6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilitiesError {
    #[error("invalid capability name {0:?}: must match (<vendor>:)?(amount|attr).<name>")]
    InvalidName(String),
    #[error("capability amount {name:?} must be non-negative, got {value}")]
    NegativeAmount { name: String, value: String },
}

/// Validate a capability name against `(<vendor>:)?<segment>.<name>` with
/// `segment ∈ {amount, attr}`.
pub fn validate_capability_name(name: &str) -> Result<(), CapabilitiesError> {
    let rest = match name.split_once(':') {
        Some((vendor, rest)) => {
            if vendor.is_empty() {
                return Err(CapabilitiesError::InvalidName(name.to_string()));
            }
            rest
        }
        None => name,
    };
    let Some((segment, label)) = rest.split_once('.') else {
        return Err(CapabilitiesError::InvalidName(name.to_string()));
    };
    if label.is_empty() || !matches!(segment, "amount" | "attr") {
        return Err(CapabilitiesError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Capabilities sent on register/update (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Capabilities {
    pub amounts: HashMap<String, f64>,
    pub attributes: HashMap<String, Vec<String>>,
}

impl Capabilities {
    pub fn validate(&self) -> Result<(), CapabilitiesError> {
        for name in self.attributes.keys() {
            validate_capability_name(name)?;
        }
        for (name, amount) in &self.amounts {
            validate_capability_name(name)?;
            if *amount < 0.0 {
                return Err(CapabilitiesError::NegativeAmount {
                    name: name.clone(),
                    value: amount.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "capabilities_tests.rs"]
mod tests;
