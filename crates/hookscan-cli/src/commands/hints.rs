//! Hint store inspection command.

use std::path::Path;

use anyhow::{Result, bail};
use hookscan::HintStore;

/// Run the hints command
pub fn run(file: &Path) -> Result<()> {
    let store = match HintStore::read_from_path(file) {
        Ok(store) => store,
        Err(e) if e.is_not_found() => bail!("No hint store at {}", file.display()),
        Err(e) => bail!("Failed to read hint store from {}: {}", file.display(), e),
    };

    println!("Hint store: {}", file.display());
    println!("  image:      {}", store.image);
    println!("  created at: {} (unix)", store.created_at);
    println!("  entries:    {}", store.entries.len());

    if !store.entries.is_empty() {
        println!();
        for entry in &store.entries {
            println!("  {:#018x} -> 0x{:X}", entry.hash, entry.addr);
        }
    }

    Ok(())
}
