//! Type-safe host script contracts.
//!
//! This module provides the `ScriptArgs` trait for ensuring compile-time correctness
//! of host script placeholders. Instead of ad-hoc `(key, value)` lists, Rust structs
//! implement this trait to produce exactly the substitutions a script body expects.
//!
//! # Design Goals
//!
//! 1. **Compile-Time Safety**: Placeholder mismatches (e.g., `{layer}` vs `{layer_name}`)
//!    are confined to one `impl`, not scattered across call sites.
//! 2. **Single Source of Truth**: The struct definition IS the contract.
//! 3. **Host Formatting**: Numbers and booleans are rendered the way the host
//!    scripts parse them (`parseFloat`, `== "true"`).

/// Trait for typed host script arguments.
///
/// # Contract
///
/// - `script_name()`: Returns the logical script name (e.g., "add_marker.jsx").
/// - `replacements()`: Returns `(placeholder, value)` pairs without braces.
///
/// # Invariants
///
/// - Every placeholder in the script body MUST have a replacement.
/// - Scripts are identified by name only (the body is resolved by the library).
///
/// # Example
///
/// ```ignore
/// use hostbridge::script_traits::ScriptArgs;
/// use hostbridge::scripts::layer::AddMarkerArgs;
///
/// let args = AddMarkerArgs {
///     comp_name: "Intro".into(),
///     layer_name: "Title".into(),
///     marker_name: "beat".into(),
///     marker_time: 2.5,
/// };
///
/// assert_eq!(args.script_name(), "add_marker.jsx");
/// ```
pub trait ScriptArgs {
    /// Placeholder substitutions for the script body.
    fn replacements(&self) -> Vec<(String, String)>;

    /// Logical script name.
    fn script_name(&self) -> &'static str;
}

/// Build a replacement list from borrowed pairs.
pub fn pairs<const N: usize>(items: [(&str, String); N]) -> Vec<(String, String)> {
    items
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Render a number the way the host's `parseFloat` reads it.
pub fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Render a boolean for a `"{flag}" == "true"` test.
pub fn flag(value: bool) -> String {
    value.to_string()
}

/// Escape a value placed inside a double-quoted host string literal.
pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_rendering() {
        assert_eq!(number(5.0), "5");
        assert_eq!(number(2.5), "2.5");
        assert_eq!(number(-3.0), "-3");
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(quoted(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(quoted(r"C:\media"), r"C:\\media");
        assert_eq!(quoted("line\rbreak"), r"line\rbreak");
    }

    #[test]
    fn test_flag() {
        assert_eq!(flag(true), "true");
        assert_eq!(flag(false), "false");
    }
}
