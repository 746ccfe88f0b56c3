//! Deterministic tar.gz packing for compiled packages and rendered templates.
//!
//! Entries are written in path order with zeroed timestamps and ownership so
//! identical inputs always produce identical bytes.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder, EntryType, Header};
use walkdir::WalkDir;

const FILE_MODE: u32 = 0o644;
const EXEC_MODE: u32 = 0o755;

/// Pack in-memory files (relative path -> content) into a tar.gz.
///
/// `mode_for` picks the file mode from the relative path.
pub fn pack_files(files: &BTreeMap<String, Vec<u8>>, mode_for: impl Fn(&str) -> u32) -> io::Result<Vec<u8>> {
  let encoder = GzEncoder::new(Vec::new(), Compression::default());
  let mut builder = Builder::new(encoder);

  for (path, content) in files {
    append_file(&mut builder, path, content, mode_for(path))?;
  }

  builder.into_inner()?.finish()
}

/// Pack every regular file under `dir` into a tar.gz, keyed by relative path.
pub fn pack_dir(dir: &Path) -> io::Result<Vec<u8>> {
  let encoder = GzEncoder::new(Vec::new(), Compression::default());
  let mut builder = Builder::new(encoder);

  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    if !entry.file_type().is_file() {
      continue;
    }

    let rel_path = entry
      .path()
      .strip_prefix(dir)
      .map_err(io::Error::other)?
      .to_string_lossy()
      .replace('\\', "/");
    let content = fs::read(entry.path())?;
    append_file(&mut builder, &rel_path, &content, file_mode(entry.path())?)?;
  }

  builder.into_inner()?.finish()
}

/// Unpack a tar.gz produced by this module into `dest`.
pub fn unpack(bytes: &[u8], dest: &Path) -> io::Result<()> {
  fs::create_dir_all(dest)?;
  let mut archive = Archive::new(GzDecoder::new(bytes));
  archive.unpack(dest)
}

/// Read a single file from the archive, `None` if it is not present.
pub fn read_file(bytes: &[u8], path: &str) -> io::Result<Option<Vec<u8>>> {
  let mut archive = Archive::new(GzDecoder::new(bytes));
  for entry in archive.entries()? {
    let mut entry = entry?;
    if entry.path()?.to_string_lossy().replace('\\', "/") == path {
      let mut content = Vec::new();
      entry.read_to_end(&mut content)?;
      return Ok(Some(content));
    }
  }
  Ok(None)
}

fn append_file<W: Write>(builder: &mut Builder<W>, path: &str, content: &[u8], mode: u32) -> io::Result<()> {
  let mut header = Header::new_gnu();
  header.set_entry_type(EntryType::Regular);
  header.set_size(content.len() as u64);
  header.set_mode(mode);
  header.set_mtime(0);
  header.set_uid(0);
  header.set_gid(0);
  builder.append_data(&mut header, path, content)
}

#[cfg(unix)]
fn file_mode(path: &Path) -> io::Result<u32> {
  use std::os::unix::fs::PermissionsExt;

  let mode = fs::metadata(path)?.permissions().mode();
  Ok(if mode & 0o111 != 0 { EXEC_MODE } else { FILE_MODE })
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> io::Result<u32> {
  Ok(FILE_MODE)
}

/// Executables live under `bin/`, everything else is plain data.
pub fn template_mode(path: &str) -> u32 {
  if path.starts_with("bin/") { EXEC_MODE } else { FILE_MODE }
}
