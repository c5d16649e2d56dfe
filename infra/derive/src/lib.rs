#![allow(unreachable_pub)]

//! # Macros
//!
//! Procedural macros shared by the qobs crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! qobs-derive.workspace = true
//! thiserror.workspace = true
//! ```
//!
//! The generated code refers to `thiserror`, so consumers must depend on it directly.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Turns an enum into a crate error type.
///
/// The enum gains `#[derive(Debug, thiserror::Error)]` and the module gains:
///
/// * `Result<T>`, aliased to `Result<T, Enum>`.
/// * `EnumExt`, whose `.context(..)` attaches a message to any `Result` whose
///   error converts into the enum. Errors already of the enum type get their
///   context replaced.
/// * `From<Source>` for every variant shaped `{ source, context }`, so `?` lifts
///   upstream errors.
/// * `From<&'static str>` and `From<String>` when an `Internal { message, context }`
///   variant exists.
/// * `format_context`, rendering `Some(ctx)` as ` (ctx)` inside `#[error(..)]`.
///
/// Variants must have named fields including `context: Option<Cow<'static, str>>`.
/// Upstream errors live in a field named `source` or one marked `#[source]`.
/// The helpers are module level, so keep one such enum per module.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[qobs_derive::qobs_error]
/// pub enum FetchError {
///     #[error("I/O error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read_manifest(path: &std::path::Path) -> Result<String> {
///     std::fs::read_to_string(path).context("Reading Qobs.toml")
/// }
/// ```
#[proc_macro_attribute]
pub fn qobs_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
