//! Script template compilation.
//!
//! Every script the host runs is assembled the same way:
//!
//! ```text
//! framework preamble          (loaded once, cache folder baked in)
//! var _error = '';
//! try {
//!     <body with {key} placeholders replaced>
//! } catch (e) { _error = e.line + ' ' + e.toString(); }
//! if (_error !== '') { outputLogs(_error); ... }
//! ```
//!
//! and finally `{LOGS_NAME}` / `{FILE_NAME}` receive a fresh run-id and the
//! script's logical name so host-side logs can be correlated with the run.
//! Substitution is plain text replacement; there is no templating logic.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{AutomationError, Result};

/// Placeholder receiving the per-run id.
pub const RUN_ID_PLACEHOLDER: &str = "{LOGS_NAME}";
/// Placeholder receiving the script's logical name.
pub const SCRIPT_NAME_PLACEHOLDER: &str = "{FILE_NAME}";
/// Placeholder in the framework receiving the cache folder.
pub const CACHE_FOLDER_PLACEHOLDER: &str = "{CACHE_FOLDER}";

/// Name of the listener script installed in the host's startup folder.
pub const LISTENER_SCRIPT: &str = "hostbridge_command_runner.jsx";

const JSON_POLYFILL: &str = include_str!("../scripts/host/json.js");
const FRAMEWORK: &str = include_str!("../scripts/host/framework.js");
/// Source of the queue listener script.
pub const LISTENER_SOURCE: &str = include_str!("../scripts/host/command_runner.jsx");

/// Script bodies shipped with the crate, keyed by logical name.
const BUILTIN_SCRIPTS: &[(&str, &str)] = &[
    ("add_comp.jsx", include_str!("../scripts/host/add_comp.jsx")),
    ("add_marker.jsx", include_str!("../scripts/host/add_marker.jsx")),
    ("add_resource.jsx", include_str!("../scripts/host/add_resource.jsx")),
    ("add_transition.jsx", include_str!("../scripts/host/add_transition.jsx")),
    ("close_home_screen.jsx", include_str!("../scripts/host/close_home_screen.jsx")),
    ("create_folder.jsx", include_str!("../scripts/host/create_folder.jsx")),
    ("delete_folder.jsx", include_str!("../scripts/host/delete_folder.jsx")),
    ("duplicate_comp.jsx", include_str!("../scripts/host/duplicate_comp.jsx")),
    ("file_map.jsx", include_str!("../scripts/host/file_map.jsx")),
    ("import_file.jsx", include_str!("../scripts/host/import_file.jsx")),
    ("open_item_by_name.jsx", include_str!("../scripts/host/open_item_by_name.jsx")),
    ("ping.jsx", include_str!("../scripts/host/ping.jsx")),
    ("save_project.jsx", include_str!("../scripts/host/save_project.jsx")),
    ("select_item_by_name.jsx", include_str!("../scripts/host/select_item_by_name.jsx")),
    ("select_layer_by_index.jsx", include_str!("../scripts/host/select_layer_by_index.jsx")),
    ("update_properties.jsx", include_str!("../scripts/host/update_properties.jsx")),
    ("update_properties_frame.jsx", include_str!("../scripts/host/update_properties_frame.jsx")),
    ("update_resource.jsx", include_str!("../scripts/host/update_resource.jsx")),
];

/// A script ready to be queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    /// Logical script name (e.g. `add_marker.jsx`)
    pub name: String,
    /// Unique id injected into `{LOGS_NAME}`
    pub run_id: String,
    /// Full script text: framework + wrapped body
    pub text: String,
}

/// Shared preamble prepended to every generated script.
#[derive(Debug, Clone)]
pub struct Framework {
    source: String,
}

impl Framework {
    /// Build the preamble for a cache folder.
    ///
    /// The host concatenates file names onto the folder, so it is passed with
    /// forward slashes and a trailing slash.
    pub fn new(cache_dir: &Path) -> Self {
        let mut cache = cache_dir.to_string_lossy().replace('\\', "/");
        if !cache.ends_with('/') {
            cache.push('/');
        }
        let framework = FRAMEWORK.replace(CACHE_FOLDER_PLACEHOLDER, &cache);
        Self {
            source: format!("{}\n{}", JSON_POLYFILL, framework),
        }
    }

    /// Preamble text
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Resolves script bodies by logical name.
///
/// Built-in bodies are embedded in the binary; a `scripts_dir` override lets
/// users patch individual scripts without rebuilding. Bodies read from disk
/// are cached for the lifetime of the library.
#[derive(Debug, Default)]
pub struct ScriptLibrary {
    override_dir: Option<PathBuf>,
    loaded: HashMap<String, String>,
}

impl ScriptLibrary {
    /// Library using only the built-in bodies
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Library preferring bodies found in `dir`
    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
            loaded: HashMap::new(),
        }
    }

    /// Names of all built-in scripts
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN_SCRIPTS.iter().map(|(name, _)| *name)
    }

    /// Load the raw body for `name`.
    pub fn body(&mut self, name: &str) -> Result<&str> {
        if !self.loaded.contains_key(name) {
            let body = self.resolve(name)?;
            self.loaded.insert(name.to_string(), body);
        }
        Ok(self.loaded[name].as_str())
    }

    fn resolve(&self, name: &str) -> Result<String> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(name);
            if path.is_file() {
                debug!("Loading script {} from {:?}", name, path);
                return Ok(fs::read_to_string(&path)?);
            }
        }
        BUILTIN_SCRIPTS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, body)| (*body).to_string())
            .ok_or_else(|| AutomationError::config("script", format!("unknown host script: {}", name)))
    }
}

/// Assembles executable scripts from framework, body and substitutions.
#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    framework: Framework,
}

impl ScriptCompiler {
    pub fn new(framework: Framework) -> Self {
        Self { framework }
    }

    /// Compile `body` for the script called `name`.
    ///
    /// `substitutions` are `(key, value)` pairs; every literal `{key}` in the
    /// body is replaced with `value`. Output is identical for identical
    /// inputs except for the generated run-id.
    pub fn compile(&self, name: &str, body: &str, substitutions: &[(String, String)]) -> CompiledScript {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.compile_with_run_id(name, body, substitutions, run_id)
    }

    /// Same as [`compile`](Self::compile) with a caller-chosen run-id.
    pub fn compile_with_run_id(
        &self,
        name: &str,
        body: &str,
        substitutions: &[(String, String)],
        run_id: String,
    ) -> CompiledScript {
        // Reserved tokens are filled before user values go in, so a value that
        // happens to contain one reaches the host verbatim
        let framework = self
            .framework
            .source()
            .replace(RUN_ID_PLACEHOLDER, &run_id)
            .replace(SCRIPT_NAME_PLACEHOLDER, name);
        let body = substitute(body, substitutions);
        let text = format!(
            "{framework}\nvar _error = '';\ntry {{\n{body}\n}} catch (e) {{\n    _error = e.line + ' ' + e.toString();\n}}\nif (_error !== '') {{\n    outputLogs(_error);\n    $.global.__hostbridgeError = _error;\n}}\n",
        );

        CompiledScript {
            name: name.to_string(),
            run_id,
            text,
        }
    }
}

/// Replace every `{key}` in `text` with its value.
///
/// Single pass: substituted values are never scanned again, and unknown
/// tokens are left as they are.
pub fn substitute(text: &str, substitutions: &[(String, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let found = after.find('}').and_then(|close| {
            let key = &after[..close];
            substitutions
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, value)| (value, close))
        });
        match found {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Text conversions applied before values reach the host.
pub mod text {
    /// Convert HTML line breaks to the host's carriage-return newline.
    pub fn sanitize_for_host(text: &str) -> String {
        ["<br />", "<BR />", "<br/>", "<BR/>", "<br>", "<BR>"]
            .iter()
            .fold(text.to_string(), |acc, tag| acc.replace(tag, "\r"))
    }

    /// Convert `#rgb` / `#rrggbb` to the host's `"r,g,b,1"` unit-float form.
    pub fn hex_to_rgba(hex: &str) -> Option<String> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
        let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);
        let unit = |c: u8| f64::from(c) / 255.0;
        Some(format!("{:?},{:?},{:?},1", unit(r), unit(g), unit(b)))
    }

    /// Lowercase, ASCII, dash-separated name safe for host item names.
    pub fn slug(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut pending_dash = false;
        for c in input.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else if c.is_whitespace() || c == '-' || c == '_' {
                pending_dash = true;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::text::*;
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_substitute_replaces_every_occurrence() {
        let out = substitute("{a} and {a} but {b}", &pairs(&[("a", "1"), ("b", "2")]));
        assert_eq!(out, "1 and 1 but 2");
    }

    #[test]
    fn test_substitute_leaves_unknown_tokens() {
        let out = substitute("{known} {unknown}", &pairs(&[("known", "x")]));
        assert_eq!(out, "x {unknown}");
    }

    #[test]
    fn test_compile_wraps_and_injects() {
        let compiler = ScriptCompiler::new(Framework::new(Path::new("/tmp/cache")));
        let script = compiler.compile_with_run_id(
            "add_marker.jsx",
            "var t = {marker_time};",
            &pairs(&[("marker_time", "2.5")]),
            "run-1".to_string(),
        );
        assert!(script.text.contains("var t = 2.5;"));
        assert!(script.text.contains("try {"));
        assert!(script.text.contains("catch (e)"));
        assert!(script.text.contains("/tmp/cache/"));
        assert!(!script.text.contains(RUN_ID_PLACEHOLDER));
        assert!(!script.text.contains(SCRIPT_NAME_PLACEHOLDER));
        assert!(script.text.contains("run-1"));
        assert!(script.text.contains("add_marker.jsx"));
    }

    #[test]
    fn test_values_with_reserved_tokens_reach_host_verbatim() {
        let compiler = ScriptCompiler::new(Framework::new(Path::new("/tmp/cache")));
        let script = compiler.compile_with_run_id(
            "update_property.jsx",
            "layer.text = \"{value}\"; var c = \"{comp_name}\";",
            &pairs(&[("value", "{LOGS_NAME} and {FILE_NAME} and {comp_name}"), ("comp_name", "Main")]),
            "run-7".to_string(),
        );
        assert!(script
            .text
            .contains("layer.text = \"{LOGS_NAME} and {FILE_NAME} and {comp_name}\";"));
        assert!(script.text.contains("var c = \"Main\";"));
        assert!(script.text.contains("logs/run-7.txt"));
    }

    #[test]
    fn test_substitute_is_single_pass() {
        let out = substitute("{a}-{b}", &pairs(&[("a", "{b}"), ("b", "x")]));
        assert_eq!(out, "{b}-x");
        assert_eq!(substitute("if (x) { y(); } {a", &pairs(&[("a", "1")])), "if (x) { y(); } {a");
    }

    #[test]
    fn test_compile_deterministic_except_run_id() {
        let compiler = ScriptCompiler::new(Framework::new(Path::new("/tmp/cache")));
        let subs = pairs(&[("name", "Title")]);
        let a = compiler.compile("x.jsx", "var n = '{name}';", &subs);
        let b = compiler.compile("x.jsx", "var n = '{name}';", &subs);
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.text.replace(&a.run_id, ""), b.text.replace(&b.run_id, ""));
    }

    #[test]
    fn test_framework_cache_path_normalized() {
        let framework = Framework::new(Path::new(r"C:\work\cache"));
        assert!(framework.source().contains("C:/work/cache/"));
        assert!(!framework.source().contains(CACHE_FOLDER_PLACEHOLDER));
    }

    #[test]
    fn test_library_builtin_and_unknown() {
        let mut library = ScriptLibrary::builtin();
        assert!(library.body("ping.jsx").is_ok());
        let err = library.body("nope.jsx").unwrap_err();
        assert!(matches!(err, AutomationError::Config { .. }));
    }

    #[test]
    fn test_library_override_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ping.jsx"), "// patched").unwrap();
        let mut library = ScriptLibrary::with_override_dir(dir.path());
        assert_eq!(library.body("ping.jsx").unwrap(), "// patched");
        // Non-overridden names fall back to the built-in body
        assert!(library.body("add_marker.jsx").unwrap().contains("{marker_time}"));
    }

    #[test]
    fn test_sanitize_line_breaks() {
        assert_eq!(sanitize_for_host("a<br>b<BR />c"), "a\rb\rc");
    }

    #[test]
    fn test_hex_to_rgba() {
        assert_eq!(hex_to_rgba("#FF0000").as_deref(), Some("1.0,0.0,0.0,1"));
        assert_eq!(hex_to_rgba("#fff").as_deref(), Some("1.0,1.0,1.0,1"));
        assert_eq!(hex_to_rgba("#000000").as_deref(), Some("0.0,0.0,0.0,1"));
        assert!(hex_to_rgba("#12").is_none());
        assert!(hex_to_rgba("#GG0000").is_none());
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Hello World"), "hello-world");
        assert_eq!(slug("Scene 1"), "scene-1");
        assert_eq!(slug("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slug("Special@#$Characters"), "specialcharacters");
        assert_eq!(slug("scene-1 Intro_Comp"), "scene-1-intro-comp");
        assert_eq!(slug("  trailing  "), "trailing");
    }
}
