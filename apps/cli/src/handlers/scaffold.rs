//! `qobs init` and `qobs new`.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const SOURCES: &str = r#"sources = ["src/**.cpp", "src/**.cc", "src/**.c"]"#;

const MAIN_C: &str = r#"// You may change this to a .cpp (.cc) file if you'd like
#include <stdio.h>

int main(void) {
    puts("Hello, World!");
    return 0;
}
"#;

const HELLO_WORLD_C: &str = r#"#include <stdio.h>
#include "hello_world.h"

void hello_world() {
    puts("Hello, World!");
}
"#;

const HELLO_WORLD_H: &str = r#"#ifndef HELLOWORLD_H
#define HELLOWORLD_H

#ifdef __cplusplus
extern "C" {
#endif

void hello_world();

#ifdef __cplusplus
} // extern "C"
#endif

#endif
"#;

fn manifest(name: &str, lib: bool) -> String {
    let target = if lib {
        format!("lib = true\n{SOURCES}\nheaders = [\"src/**.hpp\", \"src/**.h\"]\n")
    } else {
        format!("{SOURCES}\n")
    };
    let name = toml::Value::String(name.to_owned());
    format!(
        "[package]\nname = {name}\ndescription = \"This is where I make a project.\"\nauthors = []\n\n[target]\n{target}\n[dependencies]\n"
    )
}

/// Writes `content` to `dir/rel` unless the file exists. Returns whether it was written.
fn write_new(dir: &Path, rel: &str, content: &str) -> Result<bool> {
    let path = dir.join(rel);
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, content).with_context(|| format!("Failed to create file {}", path.display()))?;
    println!("Created file: {}", path.display().to_string().replace('\\', "/"));
    Ok(true)
}

/// Scaffolds a package named `name` in the existing directory `dir`.
///
/// # Errors
/// Returns an error if a file cannot be written.
pub fn init_in(dir: &Path, name: &str, lib: bool) -> Result<()> {
    write_new(dir, "Qobs.toml", &manifest(name, lib))?;
    if lib {
        write_new(dir, "src/hello_world.c", HELLO_WORLD_C)?;
        write_new(dir, "src/hello_world.h", HELLO_WORLD_H)?;
    } else {
        write_new(dir, "src/main.c", MAIN_C)?;
    }
    write_new(dir, ".gitignore", "build/\n")?;

    let shown = dir.display();
    println!("You can now do `qobs {shown}` to build, or `qobs run {shown}` to build and run.");
    Ok(())
}

/// `qobs init <name>`: scaffolds in the current directory.
///
/// # Errors
/// Returns an error if a file cannot be written.
pub fn init(name: &str, lib: bool) -> Result<()> {
    init_in(Path::new("."), name, lib)
}

/// `qobs new <path>`: creates `path` and scaffolds a package named after it.
///
/// # Errors
/// Returns an error if the directory or a file cannot be created.
pub fn new(path: &Path, lib: bool) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .with_context(|| format!("Cannot name a package after `{}`", path.display()))?;
    fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))?;
    init_in(path, &name, lib)
}
