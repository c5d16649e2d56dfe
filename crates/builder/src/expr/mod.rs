//! # Expressions
//!
//! The small expression language used by `Qobs.toml`. Expressions appear in
//! three places:
//!
//! * conditional section keys: `[target.'target_os == "windows"']`
//! * `{{ expr }}` templates inside string values
//! * the `package.build` script, which must evaluate to `true`
//!
//! Names are resolved through an [`Environment`]. [`compile`] rejects unknown
//! root identifiers and functions up front, which is how conditional keys are
//! told apart from plain table keys.

mod error;
mod eval;
mod lexer;
mod parser;
mod value;

pub use error::{ExprError, ExprErrorExt, Result};
pub use value::Value;

use parser::Expr;

/// Names and host functions visible to expressions.
pub trait Environment {
    /// Resolves a root identifier such as `target_os` or `features`.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Whether `name` is a host function this environment can [`call`](Environment::call).
    fn has_function(&self, name: &str) -> bool;

    /// Calls a host function.
    ///
    /// # Errors
    /// Returns whatever the host function fails with.
    fn call(&self, name: &str, args: &[Value]) -> Result<Value>;

    /// Whether `name` resolves. Override when building the value is expensive.
    fn has_variable(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// A parsed and name-checked expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    root: Expr,
}

impl Program {
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Parses `source` and checks every root identifier and function name against `env`.
///
/// # Errors
/// Returns [`ExprError::Syntax`] for malformed input and [`ExprError::UnknownName`]
/// for names `env` does not know.
pub fn compile(source: &str, env: &impl Environment) -> Result<Program> {
    let root = parser::parse(source)?;
    check_names(&root, env)?;
    Ok(Program { source: source.to_owned(), root })
}

/// Evaluates a compiled program.
///
/// # Errors
/// Returns an error on type mismatches, division by zero, or a failing host function.
pub fn eval(program: &Program, env: &impl Environment) -> Result<Value> {
    eval::Evaluator { env }.eval(&program.root)
}

/// Compiles and evaluates `source` in one step.
///
/// # Errors
/// See [`compile`] and [`eval`].
pub fn run(source: &str, env: &impl Environment) -> Result<Value> {
    eval(&compile(source, env)?, env)
}

fn check_names(expr: &Expr, env: &impl Environment) -> Result<()> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Ident(name) => {
            if env.has_variable(name) {
                Ok(())
            } else {
                Err(ExprError::UnknownName { name: name.clone().into(), context: None })
            }
        },
        Expr::Call(name, args) => {
            if !eval::is_builtin(name) && !env.has_function(name) {
                return Err(ExprError::UnknownName {
                    name: format!("{name}()").into(),
                    context: None,
                });
            }
            args.iter().try_for_each(|arg| check_names(arg, env))
        },
        Expr::Array(items) => items.iter().try_for_each(|item| check_names(item, env)),
        Expr::Member(base, _) | Expr::Unary(_, base) => check_names(base, env),
        Expr::Index(base, index) => {
            check_names(base, env)?;
            check_names(index, env)
        },
        Expr::Binary(_, lhs, rhs) => {
            check_names(lhs, env)?;
            check_names(rhs, env)
        },
        Expr::Ternary(cond, then, otherwise) => {
            check_names(cond, env)?;
            check_names(then, env)?;
            check_names(otherwise, env)
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Minimal environment for expression tests.
    #[derive(Debug, Default)]
    pub(crate) struct TestEnv {
        pub(crate) vars: BTreeMap<String, Value>,
    }

    impl TestEnv {
        pub(crate) fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
            self.vars.insert(name.to_owned(), value.into());
            self
        }
    }

    impl Environment for TestEnv {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }

        fn has_function(&self, name: &str) -> bool {
            name == "twice"
        }

        fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
            match (name, args) {
                ("twice", [Value::Int(i)]) => Ok(Value::Int(i * 2)),
                _ => Err(ExprError::type_mismatch(format!("bad call to {name}"))),
            }
        }
    }

    #[test]
    fn test_compile_rejects_unknown_names() {
        let env = TestEnv::default().with("target_os", "linux");
        assert!(compile(r#"target_os == "linux""#, &env).is_ok());
        assert!(matches!(compile("defines", &env), Err(ExprError::UnknownName { .. })));
        assert!(matches!(compile("frobnicate(1)", &env), Err(ExprError::UnknownName { .. })));
        // member names are not checked, only roots
        assert!(compile("target_os.anything", &env).is_ok());
    }

    #[test]
    fn test_run_uses_host_functions() {
        let env = TestEnv::default();
        assert_eq!(run("twice(21)", &env).unwrap(), Value::Int(42));
        assert_eq!(run("upper('abc') + lower('DEF')", &env).unwrap(), Value::from("ABCdef"));
    }

    #[test]
    fn test_program_keeps_source() {
        let program = compile("1 + 1", &TestEnv::default()).unwrap();
        assert_eq!(program.source(), "1 + 1");
    }
}
