use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn qobs() -> Command {
    let mut cmd = Command::cargo_bin("qobs").unwrap();
    cmd.env_remove("QOBS_LOG_DIR");
    cmd
}

/// Copies `demos/<name>` under `root`.
fn copy_demo(name: &str, root: &Path) -> PathBuf {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos").join(name);
    let dest = root.join(name);
    for entry in walkdir::WalkDir::new(&src) {
        let entry = entry.unwrap();
        let target = dest.join(entry.path().strip_prefix(&src).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
    dest
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

#[test]
fn help_lists_subcommands() {
    qobs()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("index"));
}

#[test]
fn new_scaffolds_an_executable() {
    let tmp = TempDir::new().unwrap();
    qobs()
        .current_dir(tmp.path())
        .args(["new", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created file: hello/Qobs.toml"))
        .stdout(predicate::str::contains("You can now do `qobs hello` to build"));

    let manifest = fs::read_to_string(tmp.path().join("hello/Qobs.toml")).unwrap();
    assert!(manifest.contains("name = \"hello\""));
    assert!(!manifest.contains("lib = true"));
    assert!(tmp.path().join("hello/src/main.c").is_file());
    assert_eq!(fs::read_to_string(tmp.path().join("hello/.gitignore")).unwrap(), "build/\n");
}

#[test]
fn init_lib_keeps_existing_files() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/hello_world.c", "// mine\n");

    qobs()
        .current_dir(tmp.path())
        .args(["init", "greet", "--lib"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created file: ./Qobs.toml"))
        .stdout(predicate::str::contains("hello_world.c").not());

    assert_eq!(fs::read_to_string(tmp.path().join("src/hello_world.c")).unwrap(), "// mine\n");
    assert!(tmp.path().join("src/hello_world.h").is_file());
    assert!(fs::read_to_string(tmp.path().join("Qobs.toml")).unwrap().contains("lib = true"));
}

#[test]
fn index_add_needs_an_index_checkout() {
    let tmp = TempDir::new().unwrap();
    qobs()
        .current_dir(tmp.path())
        .args(["index", "add", "https://github.com/a/b", "b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: no qobs_index.json found in current directory"));
}

#[test]
fn index_add_and_remove() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "qobs_index.json", r#"{"https://github.com/x/y": "y"}"#);

    qobs()
        .current_dir(tmp.path())
        .args(["index", "add", "https://github.com/a/b", "b"])
        .assert()
        .success()
        .stderr(predicate::str::contains("added dependency https://github.com/a/b -> b"));
    qobs()
        .current_dir(tmp.path())
        .args(["index", "remove", "https://github.com/x/y"])
        .assert()
        .success()
        .stderr(predicate::str::contains("removed dependency https://github.com/x/y"));
    qobs()
        .current_dir(tmp.path())
        .args(["index", "remove", "https://github.com/x/y"])
        .assert()
        .success()
        .stderr(predicate::str::contains("not found"));

    let text = fs::read_to_string(tmp.path().join("qobs_index.json")).unwrap();
    let deps: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps["https://github.com/a/b"], "b");
}

#[test]
fn index_search_uses_the_global_index() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "qobs_index.json",
        r#"{"https://github.com/glfw/glfw": "glfw", "https://github.com/nothings/stb": "stb"}"#,
    );

    qobs()
        .env("QOBS_INDEX_DIR", tmp.path())
        .args(["index", "search", "GLFW"])
        .assert()
        .success()
        .stdout("1. https://github.com/glfw/glfw -> glfw\n")
        .stderr(predicate::str::contains("found 1 matches"));
    qobs()
        .env("QOBS_INDEX_DIR", tmp.path())
        .args(["-q", "index", "search", "sdl"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn build_without_manifest_fails() {
    let tmp = TempDir::new().unwrap();
    qobs().arg(tmp.path()).assert().failure().stderr(predicate::str::starts_with("error:"));
}

#[test]
fn unknown_profile_is_reported() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "Qobs.toml", "[package]\nname = \"app\"\n[target]\nsources = [\"src/**.c\"]\n");
    write(tmp.path(), "src/main.c", "int main(void) { return 0; }\n");

    qobs()
        .args(["build", "-p", "fast"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown profile `fast`"));
}

#[test]
fn running_a_library_fails() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "Qobs.toml", "[package]\nname = \"greet\"\n[target]\nlib = true\nsources = [\"src/**.c\"]\n");
    write(tmp.path(), "src/greet.c", "void greet(void) {}\n");

    qobs().arg("run").arg(tmp.path()).assert().failure().stderr(predicate::str::contains("error:"));
}

#[test]
fn unknown_generator_is_rejected() {
    qobs().args(["-g", "make"]).assert().failure().stderr(predicate::str::contains("must be one of"));
}

#[test]
fn runs_the_features_demo() {
    if qobs_builder::Toolchain::detect().is_err() {
        eprintln!("skipping, no C compiler");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let app = copy_demo("features", tmp.path());

    let output = qobs().args(["run", "-F", "cats,dogs"]).arg(&app).assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&output).replace("\r\n", "\n");
    assert!(
        stdout.ends_with("feature 'cats' is enabled\nfeature 'dogs' is enabled\n"),
        "unexpected output:\n{stdout}"
    );
    assert!(!stdout.contains("whales"));

    qobs()
        .arg(&app)
        .assert()
        .success()
        .stdout(predicate::str::contains("CC ").and(predicate::str::contains("LINK ")));
}

#[cfg(unix)]
#[test]
fn builds_with_a_fake_compiler() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let tool = tmp.path().join("tool.sh");
    fs::write(
        &tool,
        "#!/bin/sh\nout=\"\"\nwhile [ $# -gt 0 ]; do\n  case \"$1\" in\n    -o|rcs) out=\"$2\" ;;\n  esac\n  shift\ndone\necho built > \"$out\"\n",
    )
    .unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    let app = tmp.path().join("app");
    write(&app, "Qobs.toml", "[package]\nname = \"app\"\n[target]\nsources = [\"src/**.c\"]\n");
    write(&app, "src/main.c", "int main(void) { return 0; }\n");

    let build = |app: &Path| {
        let mut cmd = qobs();
        cmd.env("CC", &tool).env("CXX", &tool).env("AR", &tool).arg(app);
        cmd
    };

    build(&app)
        .assert()
        .success()
        .stdout(predicate::str::contains("CC "))
        .stdout(predicate::str::contains("LINK "));
    assert!(app.join("build/app").is_file());

    build(&app).assert().success().stdout(predicate::str::contains("qobs: no work to do."));
}
