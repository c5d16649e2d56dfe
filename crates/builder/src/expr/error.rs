use std::borrow::Cow;

/// Errors raised while compiling or evaluating an expression.
#[qobs_derive::qobs_error]
pub enum ExprError {
    #[error("Syntax error at offset {position}{}: {message}", format_context(.context))]
    Syntax { message: Cow<'static, str>, position: usize, context: Option<Cow<'static, str>> },

    #[error("Unknown name{}: {name}", format_context(.context))]
    UnknownName { name: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Type mismatch{}: {message}", format_context(.context))]
    Type { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Division by zero{}", format_context(.context))]
    DivisionByZero { context: Option<Cow<'static, str>> },

    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Patch failed{}: {message}", format_context(.context))]
    Patch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Path `{path}` is outside of the package directory{}", format_context(.context))]
    PathEscape { path: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal expression error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ExprError {
    pub(crate) fn type_mismatch(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Type { message: message.into(), context: None }
    }
}
