//! Binding a CLI argument slice to typed option values

use std::collections::HashMap;

use crate::error::OptionsError;

use super::schema::{FieldKind, FieldSpec, OptionValue, Schema};

/// Parsed option values of one task invocation.
///
/// Every declared field is present, either at its default or at the value
/// bound from argv.
#[derive(Debug, Clone, Default)]
pub struct Values {
    values: HashMap<String, OptionValue>,
}

impl Values {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Boolean field value; `false` for unknown names.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OptionValue::Bool(true)))
    }

    /// String field value; empty for unknown names.
    pub fn str(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(OptionValue::Str(s)) => s,
            _ => "",
        }
    }

    /// Integer field value; zero for unknown names.
    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(OptionValue::Int(i)) => *i,
            _ => 0,
        }
    }
}

impl Schema {
    /// Parse an argument vector against this schema.
    ///
    /// Recognized shapes: `-flag=value`, `-flag value`, and bare boolean
    /// flags (implying `true`). A leading `--` is accepted as well.
    pub fn parse(&self, argv: &[String]) -> Result<Values, OptionsError> {
        let specs = self.inspect()?;
        let mut values: HashMap<String, OptionValue> = specs
            .iter()
            .map(|s| (s.name.clone(), s.default.clone()))
            .collect();

        let mut tokens = argv.iter().peekable();
        while let Some(token) = tokens.next() {
            let stripped = strip_dashes(token).ok_or_else(|| OptionsError::FlagUnknown {
                flag: token.clone(),
            })?;
            let (flag, inline) = match stripped.split_once('=') {
                Some((f, v)) => (f, Some(v.to_string())),
                None => (stripped, None),
            };
            let spec = specs
                .iter()
                .find(|s| s.flag == flag)
                .ok_or_else(|| OptionsError::FlagUnknown {
                    flag: flag.to_string(),
                })?;

            let next_is_value = tokens
                .peek()
                .map(|next| strip_dashes(next).is_none())
                .unwrap_or(false);
            let raw = match (inline, spec.kind) {
                (Some(v), _) => Some(v),
                // Bare boolean: do not consume the next token.
                (None, FieldKind::Bool) => None,
                (None, _) if next_is_value => {
                    Some(tokens.next().cloned().unwrap_or_default())
                }
                (None, _) => {
                    return Err(OptionsError::FlagValueBad {
                        flag: flag.to_string(),
                        reason: "missing value".to_string(),
                    })
                }
            };
            let value = coerce(spec, raw)?;
            values.insert(spec.name.clone(), value);
        }

        Ok(Values { values })
    }
}

fn strip_dashes(token: &str) -> Option<&str> {
    let rest = token.strip_prefix('-')?;
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }
    Some(rest)
}

fn coerce(spec: &FieldSpec, raw: Option<String>) -> Result<OptionValue, OptionsError> {
    match spec.kind {
        FieldKind::Bool => match raw.as_deref() {
            None => Ok(OptionValue::Bool(true)),
            Some(v) => v.parse().map(OptionValue::Bool).map_err(|_| {
                OptionsError::FlagValueBad {
                    flag: spec.flag.clone(),
                    reason: format!("expected true/false, got '{v}'"),
                }
            }),
        },
        FieldKind::Str => Ok(OptionValue::Str(raw.unwrap_or_default())),
        FieldKind::Int => {
            let v = raw.unwrap_or_default();
            v.parse()
                .map(OptionValue::Int)
                .map_err(|_| OptionsError::FlagValueBad {
                    flag: spec.flag.clone(),
                    reason: format!("expected integer, got '{v}'"),
                })
        }
    }
}
