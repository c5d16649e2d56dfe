//! `{{ expr }}` substitution inside manifest strings.

use crate::expr::{self, Environment, ExprErrorExt, Result};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replaces every `{{ expr }}` in `input` with the rendered value of `expr`.
///
/// An opening `{{` without a closing `}}` is left as is.
///
/// # Errors
/// Returns the first compile or evaluation error, with the expression as context.
pub fn expand(input: &str, env: &impl Environment) -> Result<String> {
    if !input.contains(OPEN) {
        return Ok(input.to_owned());
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else { break };

        let source = after_open[..end].trim();
        if source.is_empty() {
            // `{{}}` is not an expression
            out.push_str(&rest[..start + OPEN.len() + end + CLOSE.len()]);
        } else {
            let value = expr::run(source, env).context(format!("in template {{{{ {source} }}}}"))?;
            out.push_str(&rest[..start]);
            out.push_str(&value.to_string());
        }
        rest = &after_open[end + CLOSE.len()..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Expands templates in every string of a TOML value, recursively.
///
/// # Errors
/// See [`expand`].
pub fn expand_value(value: &mut toml::Value, env: &impl Environment) -> Result<()> {
    match value {
        toml::Value::String(s) => {
            if s.contains(OPEN) {
                *s = expand(s, env)?;
            }
        },
        toml::Value::Array(items) => {
            for item in items {
                expand_value(item, env)?;
            }
        },
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                expand_value(item, env)?;
            }
        },
        _ => {},
    }
    Ok(())
}
