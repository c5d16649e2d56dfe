use std::borrow::Cow;

/// A specialized [`IndexError`] enum of this crate.
#[qobs_derive::qobs_error]
pub enum IndexError {
    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Malformed index{}: {source}", format_context(.context))]
    Json { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Git error{}: {source}", format_context(.context))]
    Git { source: qobs_git::GitError, context: Option<Cow<'static, str>> },

    #[error("Directory walk failed{}: {source}", format_context(.context))]
    Walk { source: walkdir::Error, context: Option<Cow<'static, str>> },

    #[error("Dependency not found in index{}: {url}", format_context(.context))]
    NotFound { url: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid index entry{}: {message}", format_context(.context))]
    InvalidEntry { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal index error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
