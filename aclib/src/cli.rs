//! clap integration: build a `clap::Command` from an [`OptionSet`] at
//! runtime and collect typed values back out of the matches.

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::spec::{OptionSet, OptionSpec, ValueType};

/// clap id of the negative spelling of a toggle. The positive spelling uses
/// the option name itself.
fn negative_id(name: &str) -> String {
    format!("{}__no", name)
}

/// Build a `clap::Command` from the registry.
///
/// Plain options become value arguments under their dotted name. Toggles
/// become a pair of flags that override each other; a toggle with
/// `accepts_value` additionally takes `--flag=value` with `true` as the
/// missing-value default.
pub fn build_command(name: &str, set: &OptionSet) -> Command {
    let mut cmd = Command::new(name.to_string());
    for spec in set.options() {
        if spec.toggle {
            let yes_id = spec.name.clone();
            let no_id = negative_id(&spec.name);

            let mut yes = Arg::new(yes_id.clone())
                .long(spec.yes_flag())
                .overrides_with(no_id.clone());
            if let Some(help) = &spec.help {
                yes = yes.help(help.clone());
            }
            yes = if spec.accepts_value {
                yes.action(ArgAction::Set)
                    .num_args(0..=1)
                    .default_missing_value("true")
                    .require_equals(true)
            } else {
                yes.action(ArgAction::SetTrue)
            };

            let no = Arg::new(no_id)
                .long(spec.no_flag())
                .action(ArgAction::SetTrue)
                .overrides_with(yes_id);

            cmd = cmd.arg(yes).arg(no);
        } else {
            let mut arg = Arg::new(spec.name.clone())
                .long(spec.name.clone())
                .num_args(1)
                .action(ArgAction::Set)
                .required(spec.required);
            if let Some(help) = &spec.help {
                arg = arg.help(help.clone());
            }
            if let Some(short) = spec.short.as_deref().and_then(|s| s.chars().next()) {
                arg = arg.short(short);
            }
            if let Some(default) = &spec.default {
                arg = arg.default_value(default.clone());
            }
            cmd = cmd.arg(arg);
        }
    }
    cmd
}

/// Collect typed values for every registered option from parsed matches.
///
/// Values are keyed by the dotted option name. Options that were not given
/// and have no default are absent from the map.
pub fn collect_values(set: &OptionSet, matches: &ArgMatches) -> Result<Map<String, Value>> {
    let mut values = Map::new();
    for spec in set.options() {
        if spec.toggle {
            if matches.get_flag(&negative_id(&spec.name)) {
                values.insert(spec.name.clone(), Value::Bool(false));
                continue;
            }
            if spec.accepts_value {
                if let Some(raw) = matches.get_one::<String>(&spec.name) {
                    values.insert(spec.name.clone(), toggle_value(spec, raw)?);
                    continue;
                }
            } else if matches.get_flag(&spec.name) {
                values.insert(spec.name.clone(), Value::Bool(true));
                continue;
            }
            if let Some(default) = &spec.default {
                values.insert(spec.name.clone(), toggle_value(spec, default)?);
            }
        } else if let Some(raw) = matches.get_one::<String>(&spec.name) {
            values.insert(spec.name.clone(), convert_value(spec, raw)?);
        }
    }
    Ok(values)
}

/// Fold a flat dotted-name value map into a nested JSON object.
pub fn values_to_tree(values: &Map<String, Value>) -> Value {
    let mut root = Map::new();
    for (key, value) in values {
        let mut node = &mut root;
        let mut parts = key.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                node.insert(part.to_string(), value.clone());
            } else {
                let slot = node
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                node = slot.as_object_mut().expect("slot was just made an object");
            }
        }
    }
    Value::Object(root)
}

/// Peek at a flag value before full parsing (supports `--key value` and
/// `--key=value` forms).
pub fn pre_scan_value(args: &[String], key: &str) -> Option<String> {
    for i in 0..args.len() {
        if args[i] == key && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(rest) = args[i].strip_prefix(&(key.to_string() + "=")) {
            return Some(rest.to_string());
        }
    }
    None
}

/// Recognized boolean spellings for toggle values.
pub fn parse_bool_word(word: &str) -> Option<bool> {
    match word {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

fn validation(spec: &OptionSpec, expected: &ValueType, message: &str) -> Error {
    Error::Validation {
        option: spec.name.clone(),
        expected: expected.to_string(),
        message: message.to_string(),
    }
}

fn toggle_value(spec: &OptionSpec, raw: &str) -> Result<Value> {
    if spec.optional && raw == "null" {
        return Ok(Value::Null);
    }
    match parse_bool_word(raw) {
        Some(b) => Ok(Value::Bool(b)),
        None => Err(validation(spec, &ValueType::Bool, "not a boolean")),
    }
}

fn convert_value(spec: &OptionSpec, raw: &str) -> Result<Value> {
    let value_type = spec.value_type()?;
    if spec.optional && raw == "null" {
        return Ok(Value::Null);
    }
    let value = match &value_type {
        ValueType::Str => Value::String(raw.to_string()),
        ValueType::Bool => match parse_bool_word(raw) {
            Some(b) => Value::Bool(b),
            None => return Err(validation(spec, &value_type, "not a boolean")),
        },
        ValueType::Int => match raw.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => return Err(validation(spec, &value_type, "not an integer")),
        },
        ValueType::Float => match raw.parse::<f64>() {
            Ok(n) => Value::from(n),
            Err(_) => return Err(validation(spec, &value_type, "not a number")),
        },
        ValueType::Enum(choices) => {
            if choices.iter().any(|c| c == raw) {
                Value::String(raw.to_string())
            } else {
                let message = format!("must be one of {}", choices.join(", "));
                return Err(validation(spec, &value_type, &message));
            }
        }
        ValueType::List(_) | ValueType::Json(_) => {
            let parsed: Value = serde_json::from_str(raw)
                .map_err(|e| validation(spec, &value_type, &format!("not valid JSON: {}", e)))?;
            if !value_type.accepts(&parsed) {
                return Err(validation(spec, &value_type, "does not match the declared type"));
            }
            parsed
        }
    };
    Ok(value)
}
