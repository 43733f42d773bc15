//! Inspect version ranges.
//!
//! ```bash
//! $ pkgsolve range '1.2+<2|3' 1.5 2.1 3
//! 1.2+<2|3
//! 1.5  yes
//! 2.1  no
//! 3    yes
//! ```

use crate::version::{Version, VersionRange};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Print the canonical form of a range, then whether each version is in it.
#[derive(Args, Debug)]
pub struct RangeCommand {
    /// Range to parse, such as `1.2+<2|3`
    range: String,

    /// Versions to test for containment
    versions: Vec<String>,
}

impl RangeCommand {
    /// Run the command.
    ///
    /// # Errors
    ///
    /// Returns an error if the range or any version is malformed.
    pub fn execute(self) -> Result<()> {
        for line in self.render()? {
            println!("{line}");
        }
        Ok(())
    }

    fn render(&self) -> Result<Vec<String>> {
        let range: VersionRange =
            self.range.parse().with_context(|| format!("Invalid version range '{}'", self.range))?;
        tracing::debug!("parsed '{}' as {}", self.range, range);

        let width = self.versions.iter().map(String::len).max().unwrap_or(0);
        let mut lines = vec![range.to_string()];
        for text in &self.versions {
            let version: Version = text.parse().with_context(|| format!("Invalid version '{text}'"))?;
            let verdict = if range.contains_version(&version) { "yes".green() } else { "no".red() };
            lines.push(format!("{text:<width$}  {verdict}"));
        }
        Ok(lines)
    }
}
