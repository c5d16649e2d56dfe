//! Visual Studio 2022 solution generator.
//!
//! Writes `build/<solution>.sln` plus `build/<name>/<name>.vcxproj` and
//! `.vcxproj.filters` per unit, then runs MSBuild on the solution.

use super::{BuildUnit, Generator, run_tool};
use crate::cc::{self, CompilerFlavor, Toolchain};
use crate::error::{BuilderError, BuilderErrorExt, Result};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;
use uuid::Uuid;

const MSBUILD_NS: &str = "http://schemas.microsoft.com/developer/msbuild/2003";
/// Visual C++ project type.
const VCXPROJ_TYPE: &str = "8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942";
const CONFIGURATIONS: [&str; 2] = ["Debug", "Release"];
const DEFAULT_WINDOWS_LIBS: [&str; 10] = [
    "kernel32.lib",
    "user32.lib",
    "gdi32.lib",
    "winspool.lib",
    "comdlg32.lib",
    "advapi32.lib",
    "shell32.lib",
    "ole32.lib",
    "oleaut32.lib",
    "uuid.lib",
];
const SOURCE_EXTENSIONS: &str = "cpp;c;cc;cxx;c++;cppm;ixx;def;odl;idl;hpj;bat;asm;asmx";

#[derive(Debug)]
pub struct Vs2022Generator {
    configuration: &'static str,
    targets: BTreeMap<String, BuildUnit>,
}

impl Vs2022Generator {
    /// `release` builds the Release configuration, every other profile Debug.
    #[must_use]
    pub fn new(profile: &str) -> Self {
        let configuration = if profile == "release" { "Release" } else { "Debug" };
        Self { configuration, targets: BTreeMap::new() }
    }

    #[must_use]
    pub const fn configuration(&self) -> &'static str {
        self.configuration
    }

    /// Solution name: the first executable, else the first target.
    fn solution_name(&self) -> Option<&str> {
        self.targets
            .values()
            .find(|unit| !unit.is_lib)
            .or_else(|| self.targets.values().next())
            .map(|unit| unit.name.as_str())
    }

    /// Renders the `.sln` file.
    #[must_use]
    pub fn render_solution(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Microsoft Visual Studio Solution File, Format Version 12.00");
        let _ = writeln!(out, "# Visual Studio Version 17");
        for name in self.targets.keys() {
            let _ = writeln!(
                out,
                "Project(\"{{{VCXPROJ_TYPE}}}\") = \"{name}\", \"{name}\\{name}.vcxproj\", \"{{{}}}\"",
                project_guid(name)
            );
            let _ = writeln!(out, "EndProject");
        }
        let _ = writeln!(out, "Global");
        let _ = writeln!(out, "\tGlobalSection(SolutionConfigurationPlatforms) = preSolution");
        for config in CONFIGURATIONS {
            let _ = writeln!(out, "\t\t{config}|x64 = {config}|x64");
        }
        let _ = writeln!(out, "\tEndGlobalSection");
        let _ = writeln!(out, "\tGlobalSection(ProjectConfigurationPlatforms) = postSolution");
        for name in self.targets.keys() {
            let guid = project_guid(name);
            for config in CONFIGURATIONS {
                let _ = writeln!(out, "\t\t{{{guid}}}.{config}|x64.ActiveCfg = {config}|x64");
                let _ = writeln!(out, "\t\t{{{guid}}}.{config}|x64.Build.0 = {config}|x64");
            }
        }
        let _ = writeln!(out, "\tEndGlobalSection");
        let _ = writeln!(out, "\tGlobalSection(SolutionProperties) = preSolution");
        let _ = writeln!(out, "\t\tHideSolutionNode = FALSE");
        let _ = writeln!(out, "\tEndGlobalSection");
        let _ = writeln!(out, "\tGlobalSection(ExtensibilityGlobals) = postSolution");
        let _ = writeln!(
            out,
            "\t\tSolutionGuid = {{{}}}",
            guid_for(&format!("solution:{}", self.solution_name().unwrap_or_default()))
        );
        let _ = writeln!(out, "\tEndGlobalSection");
        let _ = writeln!(out, "EndGlobal");
        out
    }

    /// Renders the `.vcxproj` of `unit`.
    ///
    /// # Errors
    /// Returns an error if the XML cannot be written.
    pub fn render_project(&self, unit: &BuildUnit, build_dir: &Path) -> Result<String> {
        let mut xml = Xml::new()?;
        xml.open("Project", &[("DefaultTargets", "Build"), ("ToolsVersion", "17.0"), ("xmlns", MSBUILD_NS)])?;

        xml.open("PropertyGroup", &[])?;
        xml.leaf("PreferredToolArchitecture", "x64")?;
        xml.close("PropertyGroup")?;

        xml.open("ItemGroup", &[("Label", "ProjectConfigurations")])?;
        for config in CONFIGURATIONS {
            xml.open("ProjectConfiguration", &[("Include", &format!("{config}|x64"))])?;
            xml.leaf("Configuration", config)?;
            xml.leaf("Platform", "x64")?;
            xml.close("ProjectConfiguration")?;
        }
        xml.close("ItemGroup")?;

        xml.open("PropertyGroup", &[("Label", "Globals")])?;
        xml.leaf("ProjectGuid", &format!("{{{}}}", project_guid(&unit.name)))?;
        xml.leaf("Keyword", "Win32Proj")?;
        xml.leaf("WindowsTargetPlatformVersion", "10.0")?;
        xml.leaf("ProjectName", &unit.name)?;
        xml.close("PropertyGroup")?;

        xml.empty("Import", &[("Project", r"$(VCTargetsPath)\Microsoft.Cpp.Default.props")])?;

        let configuration_type = if unit.is_lib { "StaticLibrary" } else { "Application" };
        for config in CONFIGURATIONS {
            let debug = config == "Debug";
            xml.open("PropertyGroup", &[("Condition", &condition(config)), ("Label", "Configuration")])?;
            xml.leaf("ConfigurationType", configuration_type)?;
            xml.leaf("UseDebugLibraries", bool_text(debug))?;
            xml.leaf("PlatformToolset", "v143")?;
            if !debug {
                xml.leaf("WholeProgramOptimization", "true")?;
            }
            xml.leaf("CharacterSet", "Unicode")?;
            xml.close("PropertyGroup")?;
        }

        xml.empty("Import", &[("Project", r"$(VCTargetsPath)\Microsoft.Cpp.props")])?;
        xml.empty(
            "Import",
            &[
                ("Project", r"$(UserRootDir)\Microsoft.Cpp.$(Platform).user.props"),
                ("Condition", r"exists('$(UserRootDir)\Microsoft.Cpp.$(Platform).user.props')"),
                ("Label", "LocalAppDataPlatform"),
            ],
        )?;

        let stem = Path::new(&unit.output).file_stem().map_or_else(|| unit.name.clone(), |s| s.to_string_lossy().into_owned());
        let extension = if unit.is_lib { ".lib" } else { ".exe" };
        for config in CONFIGURATIONS {
            xml.open("PropertyGroup", &[("Condition", &condition(config))])?;
            xml.leaf("OutDir", &dir_text(&build_dir.join(config)))?;
            xml.leaf("IntDir", &dir_text(&build_dir.join(&unit.name).join("int").join(config)))?;
            xml.leaf("TargetName", &stem)?;
            xml.leaf("TargetExt", extension)?;
            xml.leaf("LinkIncremental", bool_text(config == "Debug"))?;
            xml.leaf("GenerateManifest", "true")?;
            xml.close("PropertyGroup")?;
        }

        let flags = split_cflags(&unit.cflags);
        for config in CONFIGURATIONS {
            let debug = config == "Debug";
            xml.open("ItemDefinitionGroup", &[("Condition", &condition(config))])?;
            xml.open("ClCompile", &[])?;
            xml.leaf("WarningLevel", "Level3")?;
            xml.leaf("SDLCheck", "true")?;
            xml.leaf("AdditionalIncludeDirectories", &flags.includes())?;
            xml.leaf("PreprocessorDefinitions", &flags.defines(debug))?;
            xml.leaf("ConformanceMode", "true")?;
            if debug {
                xml.leaf("Optimization", "Disabled")?;
                xml.leaf("BasicRuntimeChecks", "EnableFastChecks")?;
                xml.leaf("DebugInformationFormat", "ProgramDatabase")?;
                xml.leaf("RuntimeLibrary", "MultiThreadedDebugDLL")?;
            } else {
                xml.leaf("Optimization", "MaxSpeed")?;
                xml.leaf("RuntimeLibrary", "MultiThreadedDLL")?;
                xml.leaf("FunctionLevelLinking", "true")?;
                xml.leaf("IntrinsicFunctions", "true")?;
            }
            if !flags.other.is_empty() {
                xml.leaf("AdditionalOptions", &format!("{} %(AdditionalOptions)", flags.other.join(" ")))?;
            }
            xml.close("ClCompile")?;

            xml.open("Link", &[])?;
            xml.leaf("SubSystem", "Windows")?;
            xml.leaf("GenerateDebugInformation", bool_text(debug))?;
            xml.leaf("AdditionalDependencies", &libraries(&unit.ldflags, !unit.is_lib))?;
            xml.leaf("ProgramDataBaseFile", "$(OutDir)$(TargetName).pdb")?;
            if !debug {
                xml.leaf("EnableCOMDATFolding", "true")?;
                xml.leaf("OptimizeReferences", "true")?;
            }
            xml.leaf("AdditionalOptions", "%(AdditionalOptions) /machine:x64")?;
            xml.close("Link")?;
            xml.close("ItemDefinitionGroup")?;
        }

        xml.open("ItemGroup", &[])?;
        for source in &unit.sources {
            xml.empty("ClCompile", &[("Include", &source.src.to_string_lossy())])?;
        }
        xml.close("ItemGroup")?;

        if !unit.dependencies.is_empty() {
            xml.open("ItemGroup", &[])?;
            for dep in &unit.dependencies {
                xml.open("ProjectReference", &[("Include", &format!(r"..\{dep}\{dep}.vcxproj"))])?;
                xml.leaf("Project", &format!("{{{}}}", project_guid(dep)))?;
                xml.leaf("Name", dep)?;
                xml.leaf("LinkLibraryDependencies", "true")?;
                xml.close("ProjectReference")?;
            }
            xml.close("ItemGroup")?;
        }

        xml.empty("Import", &[("Project", r"$(VCTargetsPath)\Microsoft.Cpp.targets")])?;
        xml.empty("ImportGroup", &[("Label", "ExtensionTargets")])?;
        xml.close("Project")?;
        xml.finish()
    }

    /// Renders the `.vcxproj.filters` of `unit`.
    ///
    /// # Errors
    /// Returns an error if the XML cannot be written.
    pub fn render_filters(unit: &BuildUnit) -> Result<String> {
        let mut xml = Xml::new()?;
        xml.open("Project", &[("ToolsVersion", "17.0"), ("xmlns", MSBUILD_NS)])?;
        xml.open("ItemGroup", &[])?;
        for source in &unit.sources {
            xml.open("ClCompile", &[("Include", &source.src.to_string_lossy())])?;
            xml.leaf("Filter", "Source Files")?;
            xml.close("ClCompile")?;
        }
        xml.close("ItemGroup")?;
        xml.open("ItemGroup", &[])?;
        xml.open("Filter", &[("Include", "Source Files")])?;
        xml.leaf("UniqueIdentifier", &format!("{{{}}}", guid_for(&format!("filter:{}", unit.name))))?;
        xml.leaf("Extensions", SOURCE_EXTENSIONS)?;
        xml.close("Filter")?;
        xml.close("ItemGroup")?;
        xml.close("Project")?;
        xml.finish()
    }
}

impl Generator for Vs2022Generator {
    fn set_toolchain(&mut self, toolchain: Toolchain) {
        debug!(cc = %toolchain.cc, "MSBuild picks its own compiler");
    }

    fn add_target(&mut self, unit: BuildUnit) {
        self.targets.insert(unit.name.clone(), unit);
    }

    fn build_file(&self) -> Option<String> {
        self.solution_name().map(|name| format!("{name}.sln"))
    }

    fn generate(&self, build_dir: &Path) -> Result<()> {
        let Some(solution) = self.build_file() else {
            return Err(BuilderError::graph("no targets to put in a solution"));
        };

        for unit in self.targets.values() {
            let project_dir = build_dir.join(&unit.name);
            fs::create_dir_all(&project_dir).context(format!("Creating {}", project_dir.display()))?;
            fs::write(project_dir.join(format!("{}.vcxproj", unit.name)), self.render_project(unit, build_dir)?)?;
            fs::write(project_dir.join(format!("{}.vcxproj.filters", unit.name)), Self::render_filters(unit)?)?;
        }
        fs::write(build_dir.join(solution), self.render_solution())?;
        Ok(())
    }

    fn invoke(&mut self, build_dir: &Path) -> Result<()> {
        let solution = self.build_file().ok_or_else(|| BuilderError::graph("no targets to build"))?;
        let msbuild = find_msbuild(|name| std::env::var(name).ok())?;

        let mut cmd = Command::new(msbuild);
        cmd.arg(solution)
            .arg(format!("/p:Configuration={}", self.configuration))
            .arg("/p:Platform=x64")
            .arg("/m")
            .current_dir(build_dir);
        run_tool(cmd)
    }

    fn output_dir(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(self.configuration)
    }
}

/// Finds `MSBuild.exe`: `MSBUILD`, then `vswhere`, then `PATH`.
///
/// # Errors
/// Returns an error if MSBuild cannot be found.
pub fn find_msbuild(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(path) = lookup("MSBUILD").filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    if let Some(program_files) = lookup("ProgramFiles(x86)") {
        let vswhere = Path::new(&program_files).join(r"Microsoft Visual Studio\Installer\vswhere.exe");
        if vswhere.is_file() {
            let output = Command::new(&vswhere)
                .args(["-latest", "-prerelease", "-products", "*", "-requires", "Microsoft.Component.MSBuild"])
                .args(["-find", r"MSBuild\**\Bin\MSBuild.exe"])
                .output()
                .context("Running vswhere")?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(found) = stdout.lines().map(str::trim).find(|line| !line.is_empty()) {
                return Ok(PathBuf::from(found));
            }
        }
    }

    if let Some(path) = lookup("PATH") {
        for name in ["MSBuild.exe", "msbuild"] {
            if let Some(found) = cc::find_in_path(name, OsStr::new(&path)) {
                return Ok(found);
            }
        }
    }

    Err(BuilderError::toolchain("MSBuild not found, set MSBUILD or install Visual Studio 2022"))
}

/// Stable, name-derived GUID, uppercase.
fn guid_for(key: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("qobs:{key}").as_bytes()).to_string().to_uppercase()
}

fn project_guid(name: &str) -> String {
    guid_for(&format!("project:{name}"))
}

fn condition(config: &str) -> String {
    format!("'$(Configuration)|$(Platform)'=='{config}|x64'")
}

const fn bool_text(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// MSBuild directories end in a backslash.
fn dir_text(dir: &Path) -> String {
    let mut text = dir.to_string_lossy().into_owned();
    if !text.ends_with(['\\', '/']) {
        text.push('\\');
    }
    text
}

/// Unit cflags sorted into what MSBuild has dedicated settings for.
#[derive(Debug, Default)]
struct SplitFlags {
    includes: Vec<String>,
    defines: Vec<String>,
    other: Vec<String>,
}

fn split_cflags(cflags: &[String]) -> SplitFlags {
    let mut split = SplitFlags::default();
    for flag in cflags {
        if let Some(dir) = flag.strip_prefix("-I") {
            split.includes.push(dir.to_owned());
        } else if let Some(define) = flag.strip_prefix("-D") {
            split.defines.push(define.to_owned());
        } else if flag.starts_with("-O") || flag == "-g" {
            // covered by the configuration
        } else {
            split.other.push(CompilerFlavor::Msvc.translate(flag));
        }
    }
    split
}

impl SplitFlags {
    fn includes(&self) -> String {
        let mut items = self.includes.clone();
        items.push("%(AdditionalIncludeDirectories)".to_owned());
        items.join(";")
    }

    fn defines(&self, debug: bool) -> String {
        let mut items = vec!["WIN32".to_owned(), "_WINDOWS".to_owned()];
        items.push(if debug { "_DEBUG" } else { "NDEBUG" }.to_owned());
        items.extend(self.defines.iter().cloned());
        items.push("%(PreprocessorDefinitions)".to_owned());
        items.join(";")
    }
}

fn libraries(ldflags: &[String], is_exe: bool) -> String {
    let mut libs: Vec<String> = Vec::new();
    if is_exe {
        libs.extend(DEFAULT_WINDOWS_LIBS.iter().map(|l| (*l).to_owned()));
    }
    for flag in ldflags {
        if let Some(lib) = flag.strip_prefix("-l") {
            let lib = if lib.ends_with(".lib") { lib.to_owned() } else { format!("{lib}.lib") };
            if !libs.contains(&lib) {
                libs.push(lib);
            }
        }
    }
    libs.push("%(AdditionalDependencies)".to_owned());
    libs.join(";")
}

/// Indented MSBuild XML. `quick_xml` escapes text and attribute values.
struct Xml {
    writer: Writer<Vec<u8>>,
}

impl Xml {
    fn new() -> io::Result<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(Self { writer })
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> io::Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(tag).with_attributes(attrs.iter().copied())))
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> io::Result<()> {
        self.writer.write_event(Event::Empty(BytesStart::new(tag).with_attributes(attrs.iter().copied())))
    }

    fn leaf(&mut self, tag: &str, text: &str) -> io::Result<()> {
        self.writer.create_element(tag).write_text_content(BytesText::new(text))?;
        Ok(())
    }

    fn close(&mut self, tag: &str) -> io::Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(tag)))
    }

    fn finish(self) -> Result<String> {
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| BuilderError::from(format!("project XML is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(profile: &str) -> Vs2022Generator {
        let mut generator = Vs2022Generator::new(profile);
        generator.add_target(
            BuildUnit::new("world", "world.lib", r"C:\p\world", true)
                .with_sources([PathBuf::from(r"C:\p\world\src\world.c")])
                .with_flags(vec![r"-IC:\p\world\include".into()], vec!["-lshlwapi".into()]),
        );
        generator.add_target(
            BuildUnit::new("app", "app.exe", r"C:\p\app", false)
                .with_sources([PathBuf::from(r"C:\p\app\src\main.c")])
                .with_dependencies(vec!["world".into()])
                .with_flags(
                    vec!["-O3".into(), "-DCATS".into(), "-DLEVEL=2".into(), "-Wall".into()],
                    vec!["-lgdi32".into(), "-luser32".into(), "-ld3d12.lib".into()],
                ),
        );
        generator
    }

    #[test]
    fn test_configuration_from_profile() {
        assert_eq!(Vs2022Generator::new("release").configuration(), "Release");
        assert_eq!(Vs2022Generator::new("debug").configuration(), "Debug");
        assert_eq!(Vs2022Generator::new("small").configuration(), "Debug");
        assert_eq!(
            Vs2022Generator::new("release").output_dir(Path::new("build")),
            Path::new("build").join("Release")
        );
    }

    #[test]
    fn test_solution() {
        let generator = generator("debug");
        assert_eq!(generator.build_file().as_deref(), Some("app.sln"));

        let sln = generator.render_solution();
        let app_guid = project_guid("app");
        assert!(sln.starts_with("Microsoft Visual Studio Solution File, Format Version 12.00\n"));
        assert!(sln.contains(&format!(
            "Project(\"{{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}}\") = \"app\", \"app\\app.vcxproj\", \"{{{app_guid}}}\""
        )));
        assert!(sln.contains(&format!("\t\t{{{app_guid}}}.Release|x64.Build.0 = Release|x64\n")));
        assert_eq!(sln, generator.render_solution());
    }

    #[test]
    fn test_guids_are_stable_and_uppercase() {
        assert_eq!(project_guid("app"), project_guid("app"));
        assert_ne!(project_guid("app"), project_guid("world"));
        assert_eq!(project_guid("app"), project_guid("app").to_uppercase());
        assert_eq!(project_guid("app").len(), 36);
    }

    #[test]
    fn test_project() {
        let generator = generator("debug");
        let app = &generator.targets["app"];
        let project = generator.render_project(app, Path::new(r"C:\p\app\build")).unwrap();

        assert!(project.contains("<ConfigurationType>Application</ConfigurationType>"));
        assert!(project.contains("<PlatformToolset>v143</PlatformToolset>"));
        assert!(project.contains(
            "<PreprocessorDefinitions>WIN32;_WINDOWS;_DEBUG;CATS;LEVEL=2;%(PreprocessorDefinitions)</PreprocessorDefinitions>"
        ));
        assert!(project.contains("<PreprocessorDefinitions>WIN32;_WINDOWS;NDEBUG;CATS;LEVEL=2;"));
        assert!(project.contains("<AdditionalOptions>-Wall %(AdditionalOptions)</AdditionalOptions>"));
        assert!(project.contains(
            "kernel32.lib;user32.lib;gdi32.lib;winspool.lib;comdlg32.lib;advapi32.lib;shell32.lib;ole32.lib;oleaut32.lib;uuid.lib;d3d12.lib;%(AdditionalDependencies)"
        ));
        assert!(project.contains(r#"<ClCompile Include="C:\p\app\src\main.c"/>"#));
        assert!(project.contains(r#"<ProjectReference Include="..\world\world.vcxproj">"#));
        assert!(project.contains("<TargetName>app</TargetName>"));
        assert!(project.contains("<TargetExt>.exe</TargetExt>"));
        assert!(project.contains(
            "Condition=\"&apos;$(Configuration)|$(Platform)&apos;==&apos;Debug|x64&apos;\""
        ));
        assert!(project.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Project DefaultTargets=\"Build\""));
    }

    #[test]
    fn test_library_project() {
        let generator = generator("release");
        let world = &generator.targets["world"];
        let project = generator.render_project(world, Path::new("build")).unwrap();
        assert!(project.contains("<ConfigurationType>StaticLibrary</ConfigurationType>"));
        assert!(project.contains("<AdditionalDependencies>shlwapi.lib;%(AdditionalDependencies)</AdditionalDependencies>"));
        assert!(project.contains(r"<AdditionalIncludeDirectories>C:\p\world\include;%(AdditionalIncludeDirectories)"));
        assert!(!project.contains("ProjectReference"));
    }

    #[test]
    fn test_markup_in_values_is_escaped() {
        let mut generator = Vs2022Generator::new("debug");
        generator.add_target(
            BuildUnit::new("r&d", "r&d.exe", r"C:\p\r&d", false)
                .with_sources([PathBuf::from(r"C:\p\r&d\src\<main>.c")])
                .with_flags(vec!["-DLIMIT=a<b&&c".into()], Vec::new()),
        );
        let unit = &generator.targets["r&d"];
        let project = generator.render_project(unit, Path::new("build")).unwrap();

        assert!(project.contains(r#"<ClCompile Include="C:\p\r&amp;d\src\&lt;main&gt;.c"/>"#));
        assert!(project.contains("LIMIT=a&lt;b&amp;&amp;c;"));
        assert!(project.contains("<ProjectName>r&amp;d</ProjectName>"));
        assert!(!project.contains("a<b"));

        let filters = Vs2022Generator::render_filters(unit).unwrap();
        assert!(filters.contains("&lt;main&gt;.c"));
    }

    #[test]
    fn test_filters() {
        let generator = generator("debug");
        let filters = Vs2022Generator::render_filters(&generator.targets["world"]).unwrap();
        assert!(filters.contains("<Filter>Source Files</Filter>"));
        assert!(filters.contains(SOURCE_EXTENSIONS));
    }

    #[test]
    fn test_generate_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        generator("debug").generate(dir.path()).unwrap();
        assert!(dir.path().join("app.sln").is_file());
        assert!(dir.path().join("app/app.vcxproj").is_file());
        assert!(dir.path().join("world/world.vcxproj.filters").is_file());
    }

    #[test]
    fn test_find_msbuild_prefers_env() {
        let found = find_msbuild(|name| (name == "MSBUILD").then(|| r"D:\tools\MSBuild.exe".to_owned())).unwrap();
        assert_eq!(found, PathBuf::from(r"D:\tools\MSBuild.exe"));
        assert!(find_msbuild(|_| None).is_err());
    }
}
