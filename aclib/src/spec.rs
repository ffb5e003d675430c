//! Declarative option model.
//!
//! Options are registered under dotted names ("group1.op") either in code or
//! from a YAML mapping. The mapping comes in two shapes: a flat list of
//! options, or hierarchical groups whose nesting produces the dotted names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").expect("valid regex")
});

/// Default prefix for the negative spelling of a toggle ("--no_op").
const DEFAULT_NO_PREFIX: &str = "no_";

/// Specification of a single command-line option.
///
/// The flat optional fields mirror the YAML mapping; `value_type()` folds
/// them into a [`ValueType`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OptionSpec {
    /// Dotted option name, e.g. "group1.op".
    pub name: String,
    /// Help text shown in CLI.
    #[serde(default)]
    pub help: Option<String>,
    /// Short flag (single character).
    #[serde(default)]
    pub short: Option<String>,
    /// Whether the option is required.
    #[serde(default)]
    pub required: bool,
    /// Default value, given in its command-line string form.
    #[serde(default)]
    pub default: Option<String>,
    /// Value type name: str, bool, int, float, enum, list, json.
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    /// Allowed values for `type: enum`, in declaration order.
    #[serde(default)]
    pub choices: Vec<String>,
    /// Element type name for `type: list`.
    #[serde(default)]
    pub item: Option<String>,
    /// Structural schema for `type: json`.
    #[serde(default)]
    pub schema: Option<Value>,
    /// Whether the value may also be the `null` sentinel.
    #[serde(default)]
    pub optional: bool,
    /// Whether this option is a yes/no toggle flag pair.
    #[serde(default)]
    pub toggle: bool,
    /// Prefix for the positive toggle spelling (default: none).
    #[serde(default)]
    pub yes_prefix: Option<String>,
    /// Prefix for the negative toggle spelling (default: "no_").
    #[serde(default)]
    pub no_prefix: Option<String>,
    /// Whether a toggle additionally accepts an explicit `=value`.
    #[serde(default)]
    pub accepts_value: bool,
}

impl OptionSpec {
    /// A plain string-valued option.
    pub fn new<S: Into<String>>(name: S) -> Self {
        OptionSpec {
            name: name.into(),
            ..Default::default()
        }
    }

    /// An option with an explicit scalar type name ("int", "bool", ...).
    pub fn typed<S: Into<String>>(name: S, type_name: &str) -> Self {
        OptionSpec {
            name: name.into(),
            type_name: Some(type_name.to_string()),
            ..Default::default()
        }
    }

    /// An enum-typed option with the given choices, in declaration order.
    pub fn enumerated<S: Into<String>>(name: S, choices: &[&str]) -> Self {
        OptionSpec {
            name: name.into(),
            type_name: Some("enum".to_string()),
            choices: choices.iter().map(|c| (*c).to_string()).collect(),
            ..Default::default()
        }
    }

    /// A list-typed option with the given scalar element type.
    pub fn list_of<S: Into<String>>(name: S, item: &str) -> Self {
        OptionSpec {
            name: name.into(),
            type_name: Some("list".to_string()),
            item: Some(item.to_string()),
            ..Default::default()
        }
    }

    /// A JSON option validated against a structural schema.
    pub fn json_schema<S: Into<String>>(name: S, schema: Value) -> Self {
        OptionSpec {
            name: name.into(),
            type_name: Some("json".to_string()),
            schema: Some(schema),
            ..Default::default()
        }
    }

    /// A yes/no toggle with the default prefixes ("--op" / "--no_op").
    pub fn toggle<S: Into<String>>(name: S) -> Self {
        OptionSpec {
            name: name.into(),
            toggle: true,
            ..Default::default()
        }
    }

    /// A yes/no toggle with custom prefixes ("--with-op" / "--without-op").
    pub fn toggle_with_prefixes<S: Into<String>>(name: S, yes: &str, no: &str) -> Self {
        OptionSpec {
            name: name.into(),
            toggle: true,
            yes_prefix: Some(yes.to_string()),
            no_prefix: Some(no.to_string()),
            ..Default::default()
        }
    }

    /// Allow the `null` sentinel as a value.
    pub fn nullable(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Let a toggle accept an explicit `=value` in addition to its flags.
    pub fn with_optional_value(mut self) -> Self {
        self.accepts_value = true;
        self
    }

    /// Attach help text.
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// Attach a default value in command-line string form.
    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Resolve the flat type fields into a [`ValueType`].
    pub fn value_type(&self) -> Result<ValueType> {
        if self.toggle {
            return match self.type_name.as_deref() {
                None | Some("bool") => Ok(ValueType::Bool),
                Some(other) => Err(Error::Spec(format!(
                    "toggle option {} must be bool, not {}",
                    self.name, other
                ))),
            };
        }
        match self.type_name.as_deref() {
            None | Some("str") | Some("string") => Ok(ValueType::Str),
            Some("bool") => Ok(ValueType::Bool),
            Some("int") | Some("integer") => Ok(ValueType::Int),
            Some("float") | Some("number") => Ok(ValueType::Float),
            Some("enum") => {
                if self.choices.is_empty() {
                    Err(Error::Spec(format!(
                        "enum option {} has no choices",
                        self.name
                    )))
                } else {
                    Ok(ValueType::Enum(self.choices.clone()))
                }
            }
            Some("list") | Some("array") => {
                let item = scalar_type(self.item.as_deref().unwrap_or("str")).ok_or_else(|| {
                    Error::Spec(format!(
                        "list option {} has unsupported item type {:?}",
                        self.name, self.item
                    ))
                })?;
                Ok(ValueType::List(Box::new(item)))
            }
            Some("json") => Ok(ValueType::Json(self.schema.clone())),
            Some(other) => Err(Error::Spec(format!(
                "option {} has unknown type {}",
                self.name, other
            ))),
        }
    }

    /// The positive flag body, without leading dashes.
    pub fn yes_flag(&self) -> String {
        format!("{}{}", self.yes_prefix.as_deref().unwrap_or(""), self.name)
    }

    /// The negative flag body, without leading dashes.
    pub fn no_flag(&self) -> String {
        format!(
            "{}{}",
            self.no_prefix.as_deref().unwrap_or(DEFAULT_NO_PREFIX),
            self.name
        )
    }

    /// All long-flag spellings this option answers to, leading dashes
    /// included. Toggles contribute their positive and negative forms.
    pub fn flag_spellings(&self) -> Vec<String> {
        if self.toggle {
            vec![format!("--{}", self.yes_flag()), format!("--{}", self.no_flag())]
        } else {
            vec![format!("--{}", self.name)]
        }
    }

    /// Whether the option consumes a separate (space-delimited) value.
    pub fn takes_value(&self) -> bool {
        !self.toggle
    }

    /// Whether `--flag=value` is accepted for this option.
    pub fn equals_value(&self) -> bool {
        !self.toggle || self.accepts_value
    }

    /// Static completion candidates for the option's value position.
    ///
    /// Types without an enumerable value space return an empty list; the
    /// completion engine falls back to validating the partial value instead.
    pub fn value_candidates(&self) -> Vec<String> {
        let mut candidates: Vec<String> = if self.toggle {
            if self.accepts_value {
                ["true", "false", "yes", "no"]
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect()
            } else {
                Vec::new()
            }
        } else {
            match self.value_type() {
                Ok(ValueType::Bool) => vec!["true".to_string(), "false".to_string()],
                Ok(ValueType::Enum(choices)) => choices,
                _ => Vec::new(),
            }
        };
        if self.optional {
            let scalar = matches!(
                self.value_type(),
                Ok(ValueType::Str | ValueType::Int | ValueType::Float)
            );
            if !candidates.is_empty() || scalar {
                candidates.push("null".to_string());
            }
        }
        candidates
    }
}

fn scalar_type(name: &str) -> Option<ValueType> {
    match name {
        "str" | "string" => Some(ValueType::Str),
        "bool" => Some(ValueType::Bool),
        "int" | "integer" => Some(ValueType::Int),
        "float" | "number" => Some(ValueType::Float),
        _ => None,
    }
}

/// Resolved value type of an option.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// Arbitrary string.
    Str,
    /// Boolean (true/false).
    Bool,
    /// Integer.
    Int,
    /// Floating point number.
    Float,
    /// One of a fixed set of names, in declaration order.
    Enum(Vec<String>),
    /// Homogeneous list of a scalar element type.
    List(Box<ValueType>),
    /// JSON value, optionally constrained by a structural schema.
    Json(Option<Value>),
}

impl ValueType {
    /// Structural check of a parsed JSON value against this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ValueType::Str => value.is_string(),
            ValueType::Bool => value.is_boolean(),
            ValueType::Int => value.is_i64() || value.is_u64(),
            ValueType::Float => value.is_number(),
            ValueType::Enum(choices) => value
                .as_str()
                .is_some_and(|s| choices.iter().any(|c| c == s)),
            ValueType::List(item) => value
                .as_array()
                .is_some_and(|arr| arr.iter().all(|v| item.accepts(v))),
            ValueType::Json(None) => true,
            ValueType::Json(Some(schema)) => schema_accepts(schema, value),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Str => write!(f, "str"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Enum(choices) => write!(f, "enum[{}]", choices.join(",")),
            ValueType::List(item) => write!(f, "list[{}]", item),
            ValueType::Json(_) => write!(f, "json"),
        }
    }
}

/// Validate a JSON value against a structural subset of JSON Schema.
///
/// Supported keywords: `type` (string or array of strings), `enum`, `const`,
/// `properties`, `required`, `items`. Unknown keywords are ignored.
pub fn schema_accepts(schema: &Value, value: &Value) -> bool {
    let Some(obj) = schema.as_object() else {
        return true;
    };
    if let Some(type_key) = obj.get("type") {
        let matches_type = |name: &str| match name {
            "object" => value.is_object(),
            "array" => value.is_array(),
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "null" => value.is_null(),
            _ => true,
        };
        let type_ok = match type_key {
            Value::String(s) => matches_type(s),
            Value::Array(names) => names
                .iter()
                .any(|n| n.as_str().map_or(true, |s| matches_type(s))),
            _ => true,
        };
        if !type_ok {
            return false;
        }
    }
    if let Some(allowed) = obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return false;
        }
    }
    if let Some(constant) = obj.get("const") {
        if constant != value {
            return false;
        }
    }
    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        if let Some(map) = value.as_object() {
            for (key, sub_schema) in props {
                if let Some(sub_value) = map.get(key) {
                    if !schema_accepts(sub_schema, sub_value) {
                        return false;
                    }
                }
            }
        }
    }
    if let Some(required) = obj.get("required").and_then(Value::as_array) {
        if let Some(map) = value.as_object() {
            for key in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(key) {
                    return false;
                }
            }
        }
    }
    if let Some(item_schema) = obj.get("items") {
        if let Some(arr) = value.as_array() {
            for item in arr {
                if !schema_accepts(item_schema, item) {
                    return false;
                }
            }
        }
    }
    true
}

/// Ordered registry of options.
#[derive(Debug, Clone, Default)]
pub struct OptionSet {
    options: Vec<OptionSpec>,
}

impl OptionSet {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an iterator of specs.
    pub fn with<I: IntoIterator<Item = OptionSpec>>(specs: I) -> Result<Self> {
        let mut set = Self::new();
        for spec in specs {
            set.add(spec)?;
        }
        Ok(set)
    }

    /// Register an option. Names must be unique and well formed; the type
    /// fields must resolve to a valid [`ValueType`].
    pub fn add(&mut self, spec: OptionSpec) -> Result<()> {
        if !NAME_RE.is_match(&spec.name) {
            return Err(Error::Spec(format!("invalid option name: {:?}", spec.name)));
        }
        if self.get(&spec.name).is_some() {
            return Err(Error::Spec(format!("duplicate option name: {}", spec.name)));
        }
        // Surface type problems at registration time, not at completion time.
        spec.value_type()?;
        self.options.push(spec);
        Ok(())
    }

    /// Look up an option by its dotted name.
    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    /// All registered options, in registration order.
    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    /// All long-flag spellings, in registration order.
    pub fn flag_spellings(&self) -> Vec<String> {
        self.options
            .iter()
            .flat_map(|o| o.flag_spellings())
            .collect()
    }

    /// Find the option answering to a full flag spelling ("--no_op1").
    /// Returns the spec and whether the negative spelling matched.
    pub fn find_by_flag(&self, flag: &str) -> Option<(&OptionSpec, bool)> {
        for spec in &self.options {
            if spec.toggle {
                if flag == format!("--{}", spec.yes_flag()) {
                    return Some((spec, false));
                }
                if flag == format!("--{}", spec.no_flag()) {
                    return Some((spec, true));
                }
            } else if flag == format!("--{}", spec.name) {
                return Some((spec, false));
            }
        }
        None
    }
}

// =====================
// YAML option mappings
// =====================

/// Flat mapping shape: a plain list of options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatSpec {
    pub options: Vec<OptionSpec>,
}

/// Hierarchical mapping shape: groups whose nesting yields dotted names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierSpec {
    pub groups: Vec<OptionGroup>,
}

/// A named group of options, possibly containing nested groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionGroup {
    pub name: String,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    #[serde(default)]
    pub groups: Vec<OptionGroup>,
}

/// Parse either mapping shape from YAML into an [`OptionSet`].
pub fn parse_option_root(yaml: &str) -> Result<OptionSet> {
    // Inspect the document shape first: hierarchical mappings carry a
    // top-level `groups` key, flat mappings an `options` key.
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)
        .map_err(|e| Error::Spec(format!("invalid option mapping: {}", e)))?;
    let is_hier = value.get("groups").is_some();

    let mut set = OptionSet::new();
    if is_hier {
        let hier: HierSpec = serde_yaml::from_value(value)
            .map_err(|e| Error::Spec(format!("invalid option mapping: {}", e)))?;
        for group in &hier.groups {
            add_group(&mut set, "", group)?;
        }
    } else {
        let flat: FlatSpec = serde_yaml::from_value(value)
            .map_err(|e| Error::Spec(format!("invalid option mapping: {}", e)))?;
        for spec in flat.options {
            set.add(spec)?;
        }
    }
    Ok(set)
}

fn add_group(set: &mut OptionSet, prefix: &str, group: &OptionGroup) -> Result<()> {
    let path = if prefix.is_empty() {
        group.name.clone()
    } else {
        format!("{}.{}", prefix, group.name)
    };
    for spec in &group.options {
        let mut spec = spec.clone();
        spec.name = format!("{}.{}", path, spec.name);
        set.add(spec)?;
    }
    for nested in &group.groups {
        add_group(set, &path, nested)?;
    }
    Ok(())
}
