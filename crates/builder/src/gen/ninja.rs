//! `build.ninja` generator.

use super::{BuildUnit, Generator, run_tool};
use crate::cc::Toolchain;
use crate::error::{BuilderError, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;

pub const BUILD_FILE: &str = "build.ninja";

#[derive(Debug, Default)]
pub struct NinjaGenerator {
    toolchain: Toolchain,
    targets: BTreeMap<String, BuildUnit>,
}

/// Escapes a path for use in a build edge.
#[must_use]
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '$' | ':' | ' ' => {
                out.push('$');
                out.push(c);
            },
            _ => out.push(c),
        }
    }
    out
}

/// Escapes a variable value.
fn escape_value(value: &str) -> String {
    value.replace('$', "$$")
}

/// Quotes one command argument for whatever splits ninja's command lines:
/// `/bin/sh` on unix, the C runtime's argument parser on Windows.
#[must_use]
pub fn quote_arg(arg: &str, windows: bool) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && arg.chars().all(|c| c.is_ascii_alphanumeric() || "-_=+/.,:@%".contains(c) || (windows && c == '\\'));
    if plain {
        return Cow::Borrowed(arg);
    }
    if !windows {
        return Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")));
    }

    // backslashes are literal unless a quote follows them
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                out.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            },
            _ => {
                out.extend(std::iter::repeat_n('\\', backslashes));
                out.push(c);
                backslashes = 0;
            },
        }
    }
    out.extend(std::iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    Cow::Owned(out)
}

fn join_values(values: &[String]) -> String {
    values.iter().map(|v| escape_value(&quote_arg(v, cfg!(windows)))).collect::<Vec<_>>().join(" ")
}

impl NinjaGenerator {
    /// Rule command with the driver replaced by a ninja variable.
    fn rule_command(mut parts: Vec<String>, driver: &str) -> String {
        if let Some(first) = parts.first_mut() {
            *first = driver.to_owned();
        }
        parts.join(" ")
    }

    /// Renders the build file.
    ///
    /// # Errors
    /// Returns an error if a target depends on a unit that was never added.
    pub fn render(&self) -> Result<String> {
        let tc = &self.toolchain;
        let flavor = tc.flavor;
        let mut out = String::new();

        let _ = writeln!(out, "ninja_required_version = 1.1");
        let _ = writeln!(out, "cc = {}", escape_value(&tc.cc));
        let _ = writeln!(out, "cxx = {}", escape_value(&tc.cxx));
        let _ = writeln!(out, "ar = {}", escape_value(&tc.ar));
        out.push('\n');

        let flags = ["$cflags".to_owned()];
        let ldflags = ["$ldflags".to_owned()];
        let inputs = ["$in".to_owned()];
        let rules = [
            ("cc", Self::rule_command(tc.compile_command(false, &flags, "$in", "$out"), "$cc"), "CC $in"),
            ("cxx", Self::rule_command(tc.compile_command(true, &flags, "$in", "$out"), "$cxx"), "CC $in"),
            ("link", Self::rule_command(tc.link_command(false, "$out", &inputs, &ldflags), "$cc"), "LINK $out"),
            ("linkxx", Self::rule_command(tc.link_command(true, "$out", &inputs, &ldflags), "$cxx"), "LINK $out"),
            ("ar", Self::rule_command(tc.archive_command("$out", &inputs), "$ar"), "AR $out"),
        ];
        for (name, command, description) in rules {
            let _ = writeln!(out, "rule {name}\n  command = {command}\n  description = {description}");
        }
        out.push('\n');

        for unit in self.targets.values() {
            let cflags = join_values(&flavor.translate_all(&unit.cflags));
            for source in &unit.sources {
                let rule = if source.is_cxx { "cxx" } else { "cc" };
                let _ = writeln!(
                    out,
                    "build {}: {rule} {}\n  cflags = {cflags}",
                    escape_path(&source.obj.to_string_lossy().replace('\\', "/")),
                    escape_path(&source.src.to_string_lossy()),
                );
            }
        }
        out.push('\n');

        for unit in self.targets.values() {
            let mut inputs: Vec<String> = unit
                .sources
                .iter()
                .map(|s| escape_path(&s.obj.to_string_lossy().replace('\\', "/")))
                .collect();

            let rule = if unit.is_lib {
                "ar"
            } else {
                for dep in &unit.dependencies {
                    let Some(dep_unit) = self.targets.get(dep) else {
                        return Err(BuilderError::graph(format!(
                            "target `{}` lists a non-existent dependency: `{dep}`",
                            unit.name
                        )));
                    };
                    inputs.push(escape_path(&dep_unit.output));
                }
                let cxx = unit.has_cxx()
                    || unit.dependencies.iter().any(|d| self.targets.get(d).is_some_and(BuildUnit::has_cxx));
                if cxx { "linkxx" } else { "link" }
            };

            let _ = write!(out, "build {}: {rule} {}", escape_path(&unit.output), inputs.join(" "));
            if !unit.is_lib {
                let _ = write!(out, "\n  ldflags = {}", join_values(&flavor.translate_all(&unit.ldflags)));
            }
            out.push('\n');
        }

        Ok(out)
    }
}

impl Generator for NinjaGenerator {
    fn set_toolchain(&mut self, toolchain: Toolchain) {
        self.toolchain = toolchain;
    }

    fn add_target(&mut self, unit: BuildUnit) {
        self.targets.insert(unit.name.clone(), unit);
    }

    fn build_file(&self) -> Option<String> {
        Some(BUILD_FILE.to_owned())
    }

    fn generate(&self, build_dir: &Path) -> Result<()> {
        fs::write(build_dir.join(BUILD_FILE), self.render()?)?;
        Ok(())
    }

    fn invoke(&mut self, build_dir: &Path) -> Result<()> {
        let mut cmd = Command::new("ninja");
        cmd.arg("-C").arg(build_dir);
        run_tool(cmd)
    }
}
