//! Shaping-policy compiler for canwarden.
//!
//! Compiles an untrusted YAML rules document into a validated, internally
//! consistent [`Policy`]: per-identifier rate limits, an unconditional drop
//! set, and an identifier remap table, ready for enforcement on a hot path.
//!
//! # Rules schema
//!
//! ```yaml
//! limits:
//!   "0x18FF50E5": { rate: 50, burst: 25 }   # frames/s, tokens
//!   "0x7DF":      { rate: 10 }              # burst defaults to ceil(rate)
//!
//! actions:
//!   drop:  [ "0x123", 0x321, 200 ]
//!   remap: [ { from: "0x456", to: "0x457" } ]
//! ```
//!
//! Identifiers anywhere in the document may be integers, decimal strings,
//! or hex strings (`0x`/`0X`, underscores permitted); all of them pass
//! through [`canwarden_types::parse_can_id`] so equivalent encodings
//! collide to one canonical value.
//!
//! # Validation semantics
//!
//! Fail-fast: the first violation aborts compilation with a field-located
//! [`RuleError`]. There is no multi-error collection, and a failed compile
//! never leaves a partial policy observable. Missing top-level sections are
//! empty, not errors; a section that is present with the wrong container
//! type is rejected before any element-level validation runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::{debug, info};
use serde_yaml::Value;

use canwarden_types::{format_id, parse_can_id, IdError, IdValue};

/// One rate-limit entry: sustained rate plus burst allowance.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RateLimit {
    /// Sustained admission rate in frames per second. Always positive.
    pub rate: f64,
    /// Token-bucket capacity. At least 1. Defaulted to `ceil(rate)` when
    /// the document omits it; an explicit burst is an operator override
    /// and may legitimately be smaller than the rate.
    pub burst: u32,
}

/// A validated shaping policy.
///
/// Immutable once compiled: a configuration reload produces a brand-new
/// `Policy` rather than mutating this one, so concurrent readers never
/// observe a half-updated table. Every identifier in all three structures
/// has passed codec range validation.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Policy {
    /// Rate-limited identifiers. Identifiers absent here are never
    /// rate-limited.
    pub limits: BTreeMap<u32, RateLimit>,
    /// Identifiers dropped unconditionally.
    pub drop: BTreeSet<u32>,
    /// Identifier rewrites, source → target. No identity entries, no
    /// duplicate sources.
    pub remap: BTreeMap<u32, u32>,
}

impl Policy {
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.drop.is_empty() && self.remap.is_empty()
    }
}

/// Rule compilation failures, each located by field path.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error(transparent)]
    Id(#[from] IdError),

    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{field}: must be a {expected}")]
    InvalidStructure { field: String, expected: &'static str },

    #[error("{field}: missing '{name}' field")]
    MissingField { field: String, name: &'static str },

    #[error("{field}: rate must be > 0, got {value}")]
    InvalidRate { field: String, value: String },

    #[error("{field}: burst must be a positive integer, got {value}")]
    InvalidBurst { field: String, value: String },

    #[error("{field}: 'from' and 'to' are identical ({})", format_id(*.id))]
    IdentityRemap { field: String, id: u32 },

    #[error("{field}: duplicate 'from' ID {}", format_id(*.id))]
    DuplicateRemapSource { field: String, id: u32 },
}

/// Load and compile a rules file.
///
/// An empty file compiles to an empty policy. I/O and YAML syntax errors
/// carry the path; everything downstream carries the offending field.
pub fn load_rules(path: &Path) -> Result<Policy, RuleError> {
    let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let doc: Value = serde_yaml::from_str(&text).map_err(|source| RuleError::Yaml {
        path: path.display().to_string(),
        source,
    })?;
    let policy = compile(&doc)?;
    info!(
        "loaded rules from {}: {} limit(s), {} drop(s), {} remap(s)",
        path.display(),
        policy.limits.len(),
        policy.drop.len(),
        policy.remap.len()
    );
    Ok(policy)
}

/// Compile a parsed rules document into a [`Policy`].
pub fn compile(doc: &Value) -> Result<Policy, RuleError> {
    let root = match doc {
        // An empty document parses as null; that is a valid empty policy.
        Value::Null => return Ok(Policy::default()),
        Value::Mapping(m) => m,
        _ => {
            return Err(RuleError::InvalidStructure {
                field: "rules".to_string(),
                expected: "mapping",
            })
        }
    };

    let mut policy = Policy::default();

    if let Some(limits) = root.get("limits") {
        compile_limits(limits, &mut policy)?;
    }
    if let Some(actions) = root.get("actions") {
        compile_actions(actions, &mut policy)?;
    }

    debug!(
        "compiled policy: {} limit(s), {} drop(s), {} remap(s)",
        policy.limits.len(),
        policy.drop.len(),
        policy.remap.len()
    );
    Ok(policy)
}

// ---------------------------------------------------------------------------
// Section compilers
// ---------------------------------------------------------------------------

fn compile_limits(limits: &Value, policy: &mut Policy) -> Result<(), RuleError> {
    let mapping = match limits {
        Value::Mapping(m) => m,
        _ => {
            return Err(RuleError::InvalidStructure {
                field: "limits".to_string(),
                expected: "mapping",
            })
        }
    };

    for (key, config) in mapping {
        let field = format!("limits[{}]", key_repr(key));

        let config = match config {
            Value::Mapping(m) => m,
            _ => {
                return Err(RuleError::InvalidStructure {
                    field,
                    expected: "mapping",
                })
            }
        };

        let id = parse_can_id(&IdValue::from_yaml(key, &field)?, &field)?;

        let rate = match config.get("rate") {
            None => {
                return Err(RuleError::MissingField {
                    field,
                    name: "rate",
                })
            }
            Some(v) => match v.as_f64() {
                Some(r) if r > 0.0 => r,
                _ => {
                    return Err(RuleError::InvalidRate {
                        field,
                        value: scalar_repr(v),
                    })
                }
            },
        };

        let burst = match config.get("burst") {
            None => rate.ceil() as u32,
            Some(v) => match v.as_i64() {
                Some(b) if b >= 1 && b <= i64::from(u32::MAX) => b as u32,
                _ => {
                    return Err(RuleError::InvalidBurst {
                        field,
                        value: scalar_repr(v),
                    })
                }
            },
        };

        policy.limits.insert(id, RateLimit { rate, burst });
    }
    Ok(())
}

fn compile_actions(actions: &Value, policy: &mut Policy) -> Result<(), RuleError> {
    let mapping = match actions {
        Value::Mapping(m) => m,
        _ => {
            return Err(RuleError::InvalidStructure {
                field: "actions".to_string(),
                expected: "mapping",
            })
        }
    };

    if let Some(drop) = mapping.get("drop") {
        let items = match drop {
            Value::Sequence(s) => s,
            _ => {
                return Err(RuleError::InvalidStructure {
                    field: "actions.drop".to_string(),
                    expected: "sequence",
                })
            }
        };
        for (i, item) in items.iter().enumerate() {
            let field = format!("actions.drop[{i}]");
            let id = parse_can_id(&IdValue::from_yaml(item, &field)?, &field)?;
            // Duplicates collapse silently: repetition carries no meaning
            // for a set of blocked identifiers.
            policy.drop.insert(id);
        }
    }

    if let Some(remap) = mapping.get("remap") {
        let items = match remap {
            Value::Sequence(s) => s,
            _ => {
                return Err(RuleError::InvalidStructure {
                    field: "actions.remap".to_string(),
                    expected: "sequence",
                })
            }
        };
        for (i, item) in items.iter().enumerate() {
            let field = format!("actions.remap[{i}]");
            let entry = match item {
                Value::Mapping(m) => m,
                _ => {
                    return Err(RuleError::InvalidStructure {
                        field,
                        expected: "mapping",
                    })
                }
            };

            let from = remap_side(entry, &field, "from")?;
            let to = remap_side(entry, &field, "to")?;

            // A from == to rule is always a configuration mistake: a no-op
            // that should simply be omitted.
            if from == to {
                return Err(RuleError::IdentityRemap { field, id: from });
            }
            // Silent last-one-wins precedence would hide operator error.
            if policy.remap.contains_key(&from) {
                return Err(RuleError::DuplicateRemapSource { field, id: from });
            }
            policy.remap.insert(from, to);
        }
    }

    Ok(())
}

fn remap_side(
    entry: &serde_yaml::Mapping,
    field: &str,
    name: &'static str,
) -> Result<u32, RuleError> {
    let value = entry.get(name).ok_or_else(|| RuleError::MissingField {
        field: field.to_string(),
        name,
    })?;
    let side = format!("{field}.{name}");
    Ok(parse_can_id(&IdValue::from_yaml(value, &side)?, &side)?)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Render a YAML scalar for a field path or error message.
fn scalar_repr(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(_) => "<sequence>".to_string(),
        Value::Mapping(_) => "<mapping>".to_string(),
        Value::Tagged(_) => "<tagged>".to_string(),
    }
}

fn key_repr(key: &Value) -> String {
    scalar_repr(key)
}
