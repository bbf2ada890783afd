//! Template macro expansion.
//!
//! A `template` action names a reusable list of action shapes and supplies the
//! arguments for their `{placeholder}` tokens. Expansion is a pure pass over
//! the action list, run before anything is dispatched:
//!
//! - a string that is exactly `{name}` becomes the argument value, keeping its
//!   JSON type (so `"{index}"` may become the number `4`);
//! - tokens embedded in a longer string are replaced textually;
//! - nested objects and arrays are walked;
//! - the substituted shape is parsed into a [`CustomAction`] and expanded
//!   again, so templates may invoke templates.
//!
//! A missing argument, an unknown template or a template that reaches itself
//! is a configuration error; nothing is dispatched for a scene whose actions
//! do not expand.

use std::collections::HashMap;

use log::debug;
use serde_json::{Map, Value};

use crate::config_file::ActionTemplate;
use crate::error::{AutomationError, Result};
use crate::types::{CustomAction, host_string};

/// Flatten `actions` into concrete actions, expanding every `template` action.
pub fn expand_actions(
    actions: &[CustomAction],
    templates: &HashMap<String, ActionTemplate>,
) -> Result<Vec<CustomAction>> {
    let mut out = Vec::with_capacity(actions.len());
    let mut chain = Vec::new();
    for action in actions {
        expand_into(action, templates, &mut chain, &mut out)?;
    }
    Ok(out)
}

fn expand_into(
    action: &CustomAction,
    templates: &HashMap<String, ActionTemplate>,
    chain: &mut Vec<String>,
    out: &mut Vec<CustomAction>,
) -> Result<()> {
    let CustomAction::Template {
        template_name,
        template_values,
    } = action
    else {
        out.push(action.clone());
        return Ok(());
    };

    if chain.iter().any(|name| name == template_name) {
        let mut cycle = chain.clone();
        cycle.push(template_name.clone());
        return Err(AutomationError::config(
            "templates",
            format!("template cycle: {}", cycle.join(" -> ")),
        ));
    }

    let shapes = templates.get(template_name).ok_or_else(|| {
        AutomationError::config("template_name", format!("unknown template '{}'", template_name))
    })?;
    debug!(
        "Expanding template {} ({} actions)",
        template_name,
        shapes.len()
    );

    chain.push(template_name.clone());
    for shape in shapes {
        let concrete = substitute_value(shape, template_values, template_name)?;
        let action = serde_json::from_value(concrete).map_err(|e| {
            AutomationError::config(
                "templates",
                format!("template '{}' produced an invalid action: {}", template_name, e),
            )
        })?;
        expand_into(&action, templates, chain, out)?;
    }
    chain.pop();
    Ok(())
}

/// Substitute `{placeholder}` tokens throughout `value`.
pub fn substitute_value(value: &Value, args: &Map<String, Value>, template: &str) -> Result<Value> {
    match value {
        Value::String(text) => substitute_string(text, args, template),
        Value::Array(items) => items
            .iter()
            .map(|item| substitute_value(item, args, template))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for (key, field) in fields {
                out.insert(key.clone(), substitute_value(field, args, template)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(text: &str, args: &Map<String, Value>, template: &str) -> Result<Value> {
    if let Some(name) = whole_placeholder(text) {
        return lookup(name, args, template).cloned();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder_name(&after[..close]) => {
                let value = lookup(&after[..close], args, template)?;
                out.push_str(&host_string(value));
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

fn lookup<'a>(name: &str, args: &'a Map<String, Value>, template: &str) -> Result<&'a Value> {
    args.get(name).ok_or_else(|| {
        AutomationError::config(
            "template_values",
            format!("template '{}' needs a value for '{{{}}}'", template, name),
        )
    })
}

/// `Some(name)` when `text` is exactly one `{name}` token.
fn whole_placeholder(text: &str) -> Option<&str> {
    let name = text.strip_prefix('{')?.strip_suffix('}')?;
    is_placeholder_name(name).then_some(name)
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
