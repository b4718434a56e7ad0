//! Options schema declaration and inspection

use crate::error::OptionsError;

/// Flags reserved for the global CLI surface; task schemas may not use them.
const RESERVED_FLAGS: &[&str] = &["h", "v"];

/// Parser shape of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Str,
    Int,
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
    Int(i64),
}

impl OptionValue {
    fn kind(&self) -> FieldKind {
        match self {
            OptionValue::Bool(_) => FieldKind::Bool,
            OptionValue::Str(_) => FieldKind::Str,
            OptionValue::Int(_) => FieldKind::Int,
        }
    }
}

/// One declared option of a task.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) flag: Option<String>,
    pub(crate) help: String,
    pub(crate) kind: FieldKind,
    pub(crate) default: OptionValue,
}

impl Field {
    /// Boolean field, defaulting to `false`.
    pub fn bool(name: impl Into<String>, help: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            flag: None,
            help: help.into(),
            kind: FieldKind::Bool,
            default: OptionValue::Bool(false),
        }
    }

    /// String field, defaulting to the empty string.
    pub fn string(name: impl Into<String>, help: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            flag: None,
            help: help.into(),
            kind: FieldKind::Str,
            default: OptionValue::Str(String::new()),
        }
    }

    /// Integer field, defaulting to zero.
    pub fn int(name: impl Into<String>, help: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            flag: None,
            help: help.into(),
            kind: FieldKind::Int,
            default: OptionValue::Int(0),
        }
    }

    /// Override the flag name (by default the lowercased-hyphenated field
    /// name).
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    /// Override the default value, given in flag syntax. Validated against
    /// the field kind at inspection time.
    pub fn with_default(mut self, value: &str) -> Self {
        self.default = match self.kind {
            FieldKind::Bool => value
                .parse()
                .map(OptionValue::Bool)
                .unwrap_or_else(|_| OptionValue::Str(value.to_string())),
            FieldKind::Str => OptionValue::Str(value.to_string()),
            FieldKind::Int => value
                .parse()
                .map(OptionValue::Int)
                .unwrap_or_else(|_| OptionValue::Str(value.to_string())),
        };
        self
    }

    /// The flag this field binds to on the CLI.
    pub fn flag_name(&self) -> String {
        match &self.flag {
            Some(f) => f.clone(),
            None => self.name.to_lowercase().replace('_', "-"),
        }
    }
}

/// The declared options of one task.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

/// Normalized description of a schema field, as produced by
/// [`Schema::inspect`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub flag: String,
    pub help: String,
    pub kind: FieldKind,
    pub default: OptionValue,
}

impl Schema {
    pub fn new(fields: impl Into<Vec<Field>>) -> Self {
        Schema {
            fields: fields.into(),
        }
    }

    /// Empty schema: the task accepts no flags.
    pub fn empty() -> Self {
        Schema::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Normalize and validate the schema. Rejects duplicate field or flag
    /// names, reserved flags, and defaults that do not parse under the
    /// declared kind.
    pub fn inspect(&self) -> Result<Vec<FieldSpec>, OptionsError> {
        let mut specs: Vec<FieldSpec> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(OptionsError::SchemaInvalid {
                    field: String::new(),
                    reason: "field name must not be empty".to_string(),
                });
            }
            let flag = field.flag_name();
            if RESERVED_FLAGS.contains(&flag.as_str()) {
                return Err(OptionsError::SchemaInvalid {
                    field: field.name.clone(),
                    reason: format!("flag -{flag} is reserved"),
                });
            }
            if specs.iter().any(|s| s.name == field.name || s.flag == flag) {
                return Err(OptionsError::SchemaInvalid {
                    field: field.name.clone(),
                    reason: "duplicate field or flag name".to_string(),
                });
            }
            if field.default.kind() != field.kind {
                return Err(OptionsError::SchemaInvalid {
                    field: field.name.clone(),
                    reason: "default value does not parse under the field kind".to_string(),
                });
            }
            specs.push(FieldSpec {
                name: field.name.clone(),
                flag,
                help: field.help.clone(),
                kind: field.kind,
                default: field.default.clone(),
            });
        }
        Ok(specs)
    }

    /// Whether the given flag consumes a following value token. `None` for
    /// flags this schema does not know.
    pub fn flag_takes_value(&self, flag: &str) -> Option<bool> {
        self.fields
            .iter()
            .find(|f| f.flag_name() == flag)
            .map(|f| f.kind != FieldKind::Bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_name_defaults_to_hyphenated_field_name() {
        let f = Field::bool("no_race", "disable the race detector");
        assert_eq!(f.flag_name(), "no-race");
    }

    #[test]
    fn explicit_flag_overrides_default_name() {
        let f = Field::string("config_file", "lint config").with_flag("cfg");
        assert_eq!(f.flag_name(), "cfg");
    }

    #[test]
    fn inspect_rejects_reserved_flags() {
        let schema = Schema::new(vec![Field::bool("verbose", "x").with_flag("v")]);
        assert!(matches!(
            schema.inspect(),
            Err(OptionsError::SchemaInvalid { .. })
        ));
    }

    #[test]
    fn inspect_rejects_duplicate_flags() {
        let schema = Schema::new(vec![
            Field::bool("short", "a"),
            Field::string("other", "b").with_flag("short"),
        ]);
        assert!(schema.inspect().is_err());
    }

    #[test]
    fn inspect_rejects_bad_default() {
        let schema = Schema::new(vec![Field::int("jobs", "parallel jobs").with_default("lots")]);
        assert!(schema.inspect().is_err());
    }

    #[test]
    fn inspect_normalizes_valid_schema() {
        let schema = Schema::new(vec![
            Field::bool("short", "short run"),
            Field::int("jobs", "parallel jobs").with_default("4"),
        ]);
        let specs = schema.inspect().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].default, OptionValue::Int(4));
    }

    #[test]
    fn flag_arity_depends_on_kind() {
        let schema = Schema::new(vec![
            Field::bool("short", "x"),
            Field::string("env", "environment"),
        ]);
        assert_eq!(schema.flag_takes_value("short"), Some(false));
        assert_eq!(schema.flag_takes_value("env"), Some(true));
        assert_eq!(schema.flag_takes_value("nope"), None);
    }
}
