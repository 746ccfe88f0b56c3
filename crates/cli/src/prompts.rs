use std::io::{self, IsTerminal, Write};

use anyhow::{Result, bail};

/// Ask `question` on stderr and read the answer from stdin.
///
/// `force` answers yes. Without a terminal on both ends there is nobody to
/// ask, so the caller has to pass `--force`.
pub fn confirm(question: &str, force: bool) -> Result<bool> {
  if force {
    return Ok(true);
  }
  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!("{question} Pass --force to confirm without a terminal.");
  }

  eprint!("{question} [y/N] ");
  io::stderr().flush()?;
  let answer = io::stdin().lines().next().transpose()?.unwrap_or_default();
  Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
  let answer = answer.trim();
  answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
