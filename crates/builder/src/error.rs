use std::borrow::Cow;

/// A specialized [`BuilderError`] enum of this crate.
#[qobs_derive::qobs_error]
pub enum BuilderError {
    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Failed to parse TOML{}:\n{source}", format_context(.context))]
    Toml { source: toml::de::Error, context: Option<Cow<'static, str>> },

    #[error("JSON error{}: {source}", format_context(.context))]
    Json { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Expression error{}: {source}", format_context(.context))]
    Expr { source: crate::expr::ExprError, context: Option<Cow<'static, str>> },

    #[error("Git error{}: {source}", format_context(.context))]
    Git { source: qobs_git::GitError, context: Option<Cow<'static, str>> },

    #[error("Index error{}: {source}", format_context(.context))]
    Index { source: qobs_index::IndexError, context: Option<Cow<'static, str>> },

    #[error("Download failed{}: {source}", format_context(.context))]
    Http { source: Box<ureq::Error>, context: Option<Cow<'static, str>> },

    #[error("Zip archive error{}: {source}", format_context(.context))]
    Zip { source: zip::result::ZipError, context: Option<Cow<'static, str>> },

    #[error("Invalid glob pattern{}: {source}", format_context(.context))]
    Glob { source: globset::Error, context: Option<Cow<'static, str>> },

    #[error("Directory walk failed{}: {source}", format_context(.context))]
    Walk { source: walkdir::Error, context: Option<Cow<'static, str>> },

    #[error("Invalid manifest{}: {message}", format_context(.context))]
    Manifest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Feature resolution failed{}: {message}", format_context(.context))]
    Feature { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Failed to fetch dependency{}: {message}", format_context(.context))]
    Fetch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid build graph{}: {message}", format_context(.context))]
    Graph { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Toolchain error{}: {message}", format_context(.context))]
    Toolchain { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("`{command}` failed with exit code {}{}", render_code(.code), format_context(.context))]
    CommandFailed { command: Cow<'static, str>, code: Option<i32>, context: Option<Cow<'static, str>> },

    #[error("Can't run a library target (target.lib is true){}", format_context(.context))]
    CantRunLibrary { context: Option<Cow<'static, str>> },

    #[error("Internal builder error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn render_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_owned(), |c| c.to_string())
}

impl BuilderError {
    pub(crate) fn manifest(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Manifest { message: message.into(), context: None }
    }

    pub(crate) fn feature(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Feature { message: message.into(), context: None }
    }

    pub(crate) fn fetch(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Fetch { message: message.into(), context: None }
    }

    pub(crate) fn graph(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Graph { message: message.into(), context: None }
    }

    pub(crate) fn toolchain(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Toolchain { message: message.into(), context: None }
    }

    /// Wraps the exit status of a child process that did not succeed.
    pub(crate) fn command_failed(command: impl Into<Cow<'static, str>>, code: Option<i32>) -> Self {
        Self::CommandFailed { command: command.into(), code, context: None }
    }
}
