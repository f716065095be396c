//! Logic Module - vendor API clients and data models
//!
//! One submodule per vendor, each laid out the same way:
//! - `mod.rs`: error type and endpoint → response interpreter table
//! - `client.rs`: the API client (one method per vendor endpoint)
//! - `types.rs`: typed views over the vendor's JSON records
//!
//! Views are parsed once at the boundary through [`RawModel::from_raw`]:
//! optional fields fall back to defaults, a missing required field is a
//! [`ModelError`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

pub mod arcanna;
pub mod infoblox;
pub mod recorded_future;
pub mod telegram;
pub mod vectra_qux;

// ============================================================================
// MODEL ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("{entity} record is missing required field \"{field}\"")]
    MissingField { entity: &'static str, field: String },

    #[error("Failed to parse {entity} record: {reason}")]
    Parse { entity: &'static str, reason: String },
}

static MISSING_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"missing field `([^`]+)`").expect("valid missing field pattern"));

impl ModelError {
    fn from_serde(entity: &'static str, err: serde_json::Error) -> Self {
        let reason = err.to_string();
        match MISSING_FIELD.captures(&reason) {
            Some(captures) => ModelError::MissingField { entity, field: captures[1].to_string() },
            None => ModelError::Parse { entity, reason },
        }
    }
}

// ============================================================================
// RAW MODEL
// ============================================================================

/// A typed, read-only view over one raw vendor record
pub trait RawModel: DeserializeOwned {
    /// Entity name used in parse errors
    const ENTITY: &'static str;

    fn raw(&self) -> &Value;
    fn set_raw(&mut self, raw: Value);

    fn from_raw(raw: Value) -> Result<Self, ModelError> {
        let mut model: Self = serde_json::from_value(raw.clone())
            .map_err(|e| ModelError::from_serde(Self::ENTITY, e))?;
        model.set_raw(raw);
        Ok(model)
    }

    /// The record exactly as the vendor returned it
    fn to_json(&self) -> Value {
        self.raw().clone()
    }
}

/// Implements [`RawModel`] for a struct with a `#[serde(skip)] raw: Value` field
#[macro_export]
macro_rules! raw_model {
    ($ty:ty, $entity:expr) => {
        impl $crate::logic::RawModel for $ty {
            const ENTITY: &'static str = $entity;

            fn raw(&self) -> &serde_json::Value {
                &self.raw
            }

            fn set_raw(&mut self, raw: serde_json::Value) {
                self.raw = raw;
            }
        }
    };
}

/// `#[serde(default)]` that also covers an explicit `null`
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn parse_list<T: RawModel>(items: Vec<Value>) -> Result<Vec<T>, ModelError> {
    items.into_iter().map(T::from_raw).collect()
}

/// Like [`parse_list`], but a malformed record is logged and skipped
pub fn parse_valid<T: RawModel>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match T::from_raw(item) {
            Ok(model) => Some(model),
            Err(e) => {
                log::warn!("Skipping {} record: {}", T::ENTITY, e);
                None
            }
        })
        .collect()
}

/// Raw JSON of a list of views, for the JSON result
pub fn to_json_list<T: RawModel>(items: &[T]) -> Value {
    Value::Array(items.iter().map(RawModel::to_json).collect())
}

/// Array at `key`, empty when missing
pub fn items_at(body: &Value, key: &str) -> Vec<Value> {
    body.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
