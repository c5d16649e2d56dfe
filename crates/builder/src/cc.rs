//! # Toolchain detection
//!
//! `CC`/`CXX` win when set. Otherwise the first well-known compiler on `PATH`
//! is used. `AR` overrides the archiver.

use crate::error::{BuilderError, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};
use tracing::debug;

pub const C_COMPILERS: [&str; 6] = ["clang", "gcc", "icx", "icc", "tcc", "cl"];
pub const CXX_COMPILERS: [&str; 9] = ["clang++", "g++", "clang", "gcc", "icpx", "icx", "icpc", "icc", "cl"];

const CXX_EXTENSIONS: [&str; 5] = ["cpp", "cc", "cxx", "c++", "C"];

/// Command line conventions of a compiler driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CompilerFlavor {
    /// gcc, clang and everything that speaks their flags.
    #[default]
    Gnu,
    /// `cl.exe` and `clang-cl`.
    Msvc,
}

impl CompilerFlavor {
    #[must_use]
    pub fn of(compiler: &str) -> Self {
        let stem = Path::new(compiler)
            .file_stem()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match stem.as_str() {
            "cl" | "clang-cl" => Self::Msvc,
            _ => Self::Gnu,
        }
    }

    /// Rewrites a GNU-style flag for this flavor.
    #[must_use]
    pub fn translate(self, flag: &str) -> String {
        if self == Self::Gnu {
            return flag.to_owned();
        }
        if let Some(dir) = flag.strip_prefix("-I") {
            return format!("/I{dir}");
        }
        if let Some(define) = flag.strip_prefix("-D") {
            return format!("/D{define}");
        }
        if let Some(lib) = flag.strip_prefix("-l") {
            return format!("{lib}.lib");
        }
        if let Some(level) = flag.strip_prefix("-O") {
            return match level {
                "0" => "/Od",
                "1" | "s" | "z" => "/O1",
                _ => "/O2",
            }
            .to_owned();
        }
        if flag == "-g" {
            return "/Zi".to_owned();
        }
        flag.to_owned()
    }

    #[must_use]
    pub fn translate_all(self, flags: &[String]) -> Vec<String> {
        flags.iter().map(|flag| self.translate(flag)).collect()
    }
}

/// Compilers and archiver for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub cc: String,
    pub cxx: String,
    pub ar: String,
    pub flavor: CompilerFlavor,
}

impl Default for Toolchain {
    /// `cc`, `c++` and `ar` from `PATH`.
    fn default() -> Self {
        Self { cc: "cc".to_owned(), cxx: "c++".to_owned(), ar: "ar".to_owned(), flavor: CompilerFlavor::Gnu }
    }
}

impl Toolchain {
    /// Detects the toolchain from the process environment.
    ///
    /// # Errors
    /// Returns an error if no C compiler can be found.
    pub fn detect() -> Result<Self> {
        Self::detect_with(|name| std::env::var(name).ok())
    }

    /// Detects the toolchain, reading variables (including `PATH`) through `lookup`.
    ///
    /// # Errors
    /// Returns an error if no C compiler can be found.
    pub fn detect_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cc = find_compiler(false, &lookup).ok_or_else(|| {
            BuilderError::toolchain(format!(
                "no C compiler found, set CC or install one of: {}",
                C_COMPILERS.join(", ")
            ))
        })?;
        let cxx = find_compiler(true, &lookup).unwrap_or_else(|| cc.clone());
        let flavor = CompilerFlavor::of(&cc);
        let ar = lookup("AR").filter(|ar| !ar.is_empty()).unwrap_or_else(|| match flavor {
            CompilerFlavor::Msvc => "lib".to_owned(),
            CompilerFlavor::Gnu => "ar".to_owned(),
        });

        debug!(%cc, %cxx, %ar, %flavor, "detected toolchain");
        Ok(Self { cc, cxx, ar, flavor })
    }

    /// The compiler driver for a source kind.
    #[must_use]
    pub fn compiler(&self, cxx: bool) -> &str {
        if cxx { &self.cxx } else { &self.cc }
    }

    /// `cc <cflags> -c <src> -o <obj>`
    #[must_use]
    pub fn compile_command(&self, cxx: bool, cflags: &[String], src: &str, obj: &str) -> Vec<String> {
        let mut cmd = vec![self.compiler(cxx).to_owned()];
        match self.flavor {
            CompilerFlavor::Gnu => {
                cmd.extend(cflags.iter().cloned());
                cmd.extend(["-c".to_owned(), src.to_owned(), "-o".to_owned(), obj.to_owned()]);
            },
            CompilerFlavor::Msvc => {
                cmd.push("/nologo".to_owned());
                cmd.extend(self.flavor.translate_all(cflags));
                cmd.extend(["/c".to_owned(), src.to_owned(), format!("/Fo{obj}")]);
            },
        }
        cmd
    }

    /// `ar rcs <out> <objs>`
    #[must_use]
    pub fn archive_command(&self, out: &str, objects: &[String]) -> Vec<String> {
        let mut cmd = vec![self.ar.clone()];
        match self.flavor {
            CompilerFlavor::Gnu => cmd.extend(["rcs".to_owned(), out.to_owned()]),
            CompilerFlavor::Msvc => cmd.extend(["/nologo".to_owned(), format!("/OUT:{out}")]),
        }
        cmd.extend(objects.iter().cloned());
        cmd
    }

    /// `cc -o <out> <inputs> <ldflags>`
    #[must_use]
    pub fn link_command(&self, cxx: bool, out: &str, inputs: &[String], ldflags: &[String]) -> Vec<String> {
        let mut cmd = vec![self.compiler(cxx).to_owned()];
        match self.flavor {
            CompilerFlavor::Gnu => cmd.extend(["-o".to_owned(), out.to_owned()]),
            CompilerFlavor::Msvc => cmd.extend(["/nologo".to_owned(), format!("/Fe{out}")]),
        }
        cmd.extend(inputs.iter().cloned());
        cmd.extend(self.flavor.translate_all(ldflags));
        cmd
    }
}

/// Finds a C (or C++) compiler.
///
/// The matching variable (`CC` or `CXX`) wins, then the other one, then the
/// first candidate found on `PATH`.
pub fn find_compiler(need_cxx: bool, lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let (own, other) = if need_cxx { ("CXX", "CC") } else { ("CC", "CXX") };
    if let Some(compiler) = var(own).or_else(|| var(other)) {
        return Some(compiler);
    }

    let path = lookup("PATH")?;
    let candidates: &[&str] = if need_cxx { &CXX_COMPILERS } else { &C_COMPILERS };
    candidates
        .iter()
        .find_map(|name| find_in_path(name, OsStr::new(&path)))
        .map(|found| found.to_string_lossy().into_owned())
}

/// Looks `program` up in a `PATH`-style list.
#[must_use]
pub fn find_in_path(program: &str, path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{program}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// Whether `path` is compiled as C++.
#[must_use]
pub fn is_cxx_source(path: &Path) -> bool {
    path.extension().and_then(OsStr::to_str).is_some_and(|ext| CXX_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let env = lookup(&[("CC", "my-cc"), ("CXX", "my-cxx")]);
        assert_eq!(find_compiler(false, &env).as_deref(), Some("my-cc"));
        assert_eq!(find_compiler(true, &env).as_deref(), Some("my-cxx"));

        let only_cc = lookup(&[("CC", "my-cc"), ("CXX", "")]);
        assert_eq!(find_compiler(true, &only_cc).as_deref(), Some("my-cc"));
    }

    #[test]
    fn test_path_search_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["tcc", "gcc", "g++"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let path = dir.path().to_string_lossy().into_owned();
        let env = lookup(&[("PATH", path.as_str())]);

        assert_eq!(find_compiler(false, &env), Some(dir.path().join("gcc").to_string_lossy().into_owned()));
        assert_eq!(find_compiler(true, &env), Some(dir.path().join("g++").to_string_lossy().into_owned()));
        assert_eq!(find_compiler(false, &lookup(&[("PATH", "")])), None);
    }

    #[test]
    fn test_detect() {
        let toolchain = Toolchain::detect_with(lookup(&[("CC", "cc"), ("CXX", "c++")])).unwrap();
        assert_eq!(toolchain.ar, "ar");
        assert_eq!(toolchain.flavor, CompilerFlavor::Gnu);

        let msvc = Toolchain::detect_with(lookup(&[("CC", "C:/VS/bin/cl.exe")])).unwrap();
        assert_eq!(msvc.flavor, CompilerFlavor::Msvc);
        assert_eq!(msvc.cxx, "C:/VS/bin/cl.exe");
        assert_eq!(msvc.ar, "lib");

        let custom_ar = Toolchain::detect_with(lookup(&[("CC", "cc"), ("AR", "llvm-ar")])).unwrap();
        assert_eq!(custom_ar.ar, "llvm-ar");

        let err = Toolchain::detect_with(lookup(&[])).unwrap_err();
        assert!(matches!(err, BuilderError::Toolchain { .. }));
    }

    #[test]
    fn test_msvc_translation() {
        let msvc = CompilerFlavor::Msvc;
        assert_eq!(msvc.translate("-Iinclude"), "/Iinclude");
        assert_eq!(msvc.translate("-DNAME=1"), "/DNAME=1");
        assert_eq!(msvc.translate("-lgdi32"), "gdi32.lib");
        assert_eq!(msvc.translate("-O3"), "/O2");
        assert_eq!(msvc.translate("-O0"), "/Od");
        assert_eq!(msvc.translate("-g"), "/Zi");
        assert_eq!(msvc.translate("/W4"), "/W4");
        assert_eq!(CompilerFlavor::Gnu.translate("-lm"), "-lm");
    }

    #[test]
    fn test_commands() {
        let gnu = Toolchain { cc: "gcc".into(), cxx: "g++".into(), ar: "ar".into(), flavor: CompilerFlavor::Gnu };
        assert_eq!(
            gnu.compile_command(false, &["-O3".into()], "a.c", "a.obj"),
            ["gcc", "-O3", "-c", "a.c", "-o", "a.obj"]
        );
        assert_eq!(gnu.archive_command("liba.a", &["a.obj".into()]), ["ar", "rcs", "liba.a", "a.obj"]);
        assert_eq!(
            gnu.link_command(true, "app", &["main.obj".into(), "liba.a".into()], &["-lm".into()]),
            ["g++", "-o", "app", "main.obj", "liba.a", "-lm"]
        );
    }

    #[test]
    fn test_cxx_sources() {
        assert!(is_cxx_source(Path::new("a/b.cpp")));
        assert!(is_cxx_source(Path::new("b.C")));
        assert!(!is_cxx_source(Path::new("b.c")));
        assert!(!is_cxx_source(Path::new("Makefile")));
    }
}
