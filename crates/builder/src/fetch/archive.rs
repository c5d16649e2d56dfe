use super::progress::ProgressBar;
use crate::error::{BuilderError, BuilderErrorExt, Result};
use flate2::read::GzDecoder;
use md5::{Digest, Md5};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use strum_macros::Display;
use tracing::debug;

const TEMP_FILE: &str = ".qobs-download.tmp";
const MD5_MARKER: &str = "#MD5=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ArchiveFormat {
    #[strum(serialize = "zip")]
    Zip,
    #[strum(serialize = "tar.gz")]
    TarGz,
}

/// Picks the archive format from the file magic, then the `Content-Type`,
/// then the URL suffix.
#[must_use]
pub fn detect_format(magic: &[u8], content_type: Option<&str>, url: &str) -> Option<ArchiveFormat> {
    if magic.starts_with(b"PK\x03\x04") {
        return Some(ArchiveFormat::Zip);
    }
    if magic.starts_with(&[0x1f, 0x8b]) {
        return Some(ArchiveFormat::TarGz);
    }

    let mime = content_type.and_then(|ct| ct.split(';').next()).map(str::trim);
    match mime {
        Some("application/zip" | "application/x-zip-compressed") => return Some(ArchiveFormat::Zip),
        Some("application/gzip" | "application/x-gzip" | "application/x-tar") => {
            return Some(ArchiveFormat::TarGz);
        },
        _ => {},
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else if path.ends_with(".tgz") || path.ends_with(".tar.gz") {
        Some(ArchiveFormat::TarGz)
    } else {
        None
    }
}

/// Splits an optional `#MD5=<hex>` suffix off a download URL.
#[must_use]
pub fn split_checksum(url: &str) -> (&str, Option<&str>) {
    match url.split_once(MD5_MARKER) {
        Some((clean, md5)) => (clean, Some(md5)),
        None => (url, None),
    }
}

/// Downloads the archive at `url` and extracts it into `dest`.
///
/// # Errors
/// Fails on HTTP errors, a checksum mismatch, an unknown format, or an
/// archive entry that would land outside `dest`.
pub fn download_and_extract(url: &str, dest: &Path) -> Result<()> {
    let (clean_url, expected_md5) = split_checksum(url);
    println!("  Fetching {clean_url}");

    let response = ureq::get(clean_url)
        .call()
        .map_err(Box::new)
        .context(format!("Downloading {clean_url}"))?;
    let content_type = response.header("Content-Type").map(str::to_owned);
    let total = response.header("Content-Length").and_then(|len| len.parse().ok());

    fs::create_dir_all(dest)?;
    let archive_path = dest.join(TEMP_FILE);
    let download = Download { url: clean_url, expected_md5, content_type: content_type.as_deref(), total };
    let result = download.save_and_extract(response.into_reader(), &archive_path, dest);
    let _ = fs::remove_file(&archive_path);
    result
}

struct Download<'a> {
    url: &'a str,
    expected_md5: Option<&'a str>,
    content_type: Option<&'a str>,
    total: Option<u64>,
}

impl Download<'_> {
    fn save_and_extract(&self, mut body: impl Read, archive_path: &Path, dest: &Path) -> Result<()> {
        let url = self.url;
        let mut file = File::create(archive_path).context("Creating temporary archive file")?;
        let mut hasher = Md5::new();
        let mut progress = ProgressBar::new(self.total, 1, io::stdout());

        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = body.read(&mut buf).context(format!("Reading response from {url}"))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).context("Writing temporary archive file")?;
            hasher.update(&buf[..n]);
            progress.update(n);
        }
        file.flush()?;
        drop(file);
        progress.finish();

        if let Some(expected) = self.expected_md5 {
            let actual = hex::encode(hasher.finalize());
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(BuilderError::fetch(format!(
                    "MD5 checksum mismatch for {url}: expected {expected}, got {actual}"
                )));
            }
        }

        let mut magic = [0u8; 4];
        let read = File::open(archive_path)?.read(&mut magic)?;
        let format = detect_format(&magic[..read], self.content_type, url)
            .ok_or_else(|| BuilderError::fetch("unknown or unsupported archive format"))?;
        debug!(%format, url, "extracting archive");

        match format {
            ArchiveFormat::Zip => unzip(archive_path, dest),
            ArchiveFormat::TarGz => untar(archive_path, dest),
        }
        .context("Failed to extract archive")
    }
}

/// The directory every entry lives under, if there is exactly one.
fn single_root<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut root: Option<&str> = None;
    let mut nested = false;
    for name in names {
        let trimmed = name.trim_start_matches("./");
        let (first, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        if first.is_empty() {
            continue;
        }
        match root {
            None => root = Some(first),
            Some(r) if r != first => return None,
            Some(_) => {},
        }
        nested |= !rest.is_empty();
    }
    root.filter(|_| nested).map(|r| format!("{r}/"))
}

/// Joins an archive entry name onto `dest`, dropping `root` first.
///
/// Returns `Ok(None)` for the root directory itself.
fn entry_target(dest: &Path, name: &str, root: Option<&str>) -> Result<Option<PathBuf>> {
    let name = name.trim_start_matches("./");
    let name = root.and_then(|r| name.strip_prefix(r)).unwrap_or(name);
    if name.is_empty() || name == "/" {
        return Ok(None);
    }

    let relative = Path::new(name);
    if relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
        return Err(BuilderError::fetch(format!("illegal file path: {name}")));
    }
    Ok(Some(dest.join(relative)))
}

fn unzip(archive_path: &Path, dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
    let root = single_root(archive.file_names());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(target) = entry_target(dest, entry.name(), root.as_deref())? else {
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

fn untar(archive_path: &Path, dest: &Path) -> Result<()> {
    let names: Vec<String> = tar::Archive::new(GzDecoder::new(File::open(archive_path)?))
        .entries()?
        .map(|entry| -> io::Result<String> { Ok(entry?.path()?.to_string_lossy().into_owned()) })
        .collect::<io::Result<_>>()?;
    let root = single_root(names.iter().map(String::as_str));

    let mut archive = tar::Archive::new(GzDecoder::new(File::open(archive_path)?));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let Some(target) = entry_target(dest, &name, root.as_deref())? else {
            continue;
        };

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&target)?;
        } else if kind.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            entry.unpack(&target)?;
        } else {
            debug!(entry = %name, "skipping non-regular archive entry");
        }
    }
    Ok(())
}
