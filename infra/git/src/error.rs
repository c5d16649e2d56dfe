use std::borrow::Cow;

#[qobs_derive::qobs_error]
pub enum GitError {
    #[error("Failed to run git{}: {source}", format_context(.context))]
    Spawn { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("`{command}` failed with exit code {}{}", render_code(.code), format_context(.context))]
    CommandFailed { command: Cow<'static, str>, code: Option<i32>, context: Option<Cow<'static, str>> },
}

fn render_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_owned(), |c| c.to_string())
}
