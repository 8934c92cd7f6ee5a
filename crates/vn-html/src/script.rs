/// Hook applied to the complete source of inline scripts.
pub trait ScriptProcessor {
    fn process_script(&self, source: &str) -> String;
}

/// Leaves scripts untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScriptProcessor;

impl ScriptProcessor for IdentityScriptProcessor {
    fn process_script(&self, source: &str) -> String {
        source.to_owned()
    }
}

/// Whether a `<script type>` value denotes something the browser executes.
pub fn is_executable_script_type(script_type: Option<&str>) -> bool {
    let Some(script_type) = script_type.map(str::trim) else {
        return true;
    };

    let essence = script_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.is_empty()
        || essence == "module"
        || essence.ends_with("/javascript")
        || essence.ends_with("/ecmascript")
        || essence.ends_with("/jscript")
}
