use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use microdeploy_lib::workspace::Workspace;

use super::{current_manifest, manifest_dir};
use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_gc(dry_run: bool, home: &Path, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let manifest_path = current_manifest(home)?;
  let workspace = Workspace::open(manifest_dir(&manifest_path), home).context("Failed to open deployment workspace")?;
  let _lock = workspace.lock("gc").context("Failed to acquire workspace lock")?;

  let result = workspace.collect_garbage(dry_run)?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    println!();
    if dry_run {
      print_info("Dry run - no changes made");
    } else {
      print_success("Garbage collection complete!");
    }
    print_stat("Blobs scanned", &result.stats.blobs_scanned.to_string());
    print_stat("Blobs removed", &result.stats.blobs_deleted.to_string());
    print_stat("Temp files removed", &result.stats.temp_files_deleted.to_string());
    print_stat("Space freed", &format_bytes(result.stats.bytes_freed));
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}
