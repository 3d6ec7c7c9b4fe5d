//! Scan command implementation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use hookscan::{HintCache, HintRecord, HintStore, ScanRange, Scanner, Signature};
use tracing::debug;

/// Run the scan command
pub fn run(
    file: &Path,
    pattern: &str,
    limit: Option<usize>,
    expect: Option<usize>,
    base: Option<&str>,
    context: usize,
    hints_file: Option<&Path>,
) -> Result<()> {
    let signature = Signature::parse(pattern)?;
    let base = base.map(parse_hex_address).transpose()?;

    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let image = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let range = ScanRange::from_slice(&data);
    let cache = HintCache::new();
    if let Some(path) = hints_file {
        seed_from_store(path, &image, &cache, &range);
    }

    println!(
        "Scanning {} ({} bytes) for {}",
        file.display(),
        data.len(),
        signature
    );

    let mut scanner = Scanner::with_hints(signature, range, &cache);
    if let Some(expected) = expect {
        scanner.expect_count(expected)?;
    } else if let Some(limit) = limit {
        scanner.count_hint(limit);
    } else {
        scanner.count();
    }

    let matches = scanner.found().to_vec();
    if matches.is_empty() {
        println!("No matches.");
    } else {
        for (index, m) in matches.iter().enumerate() {
            let offset = m.addr() - range.start();
            let shown = base.map_or(offset as u64, |b| b + offset as u64);
            println!("[{}] 0x{:X}", index, shown);
            if context > 0 {
                print_context(&data, offset, context, base.unwrap_or(0));
            }
        }
        if scanner.is_matched() {
            println!("{} match(es).", matches.len());
        } else {
            println!("Stopped after {} match(es), more may follow.", matches.len());
        }
    }

    if let Some(path) = hints_file {
        save_to_store(path, image, &cache, &range)?;
    }

    Ok(())
}

/// Seed `cache` from a store whose addresses are file offsets.
fn seed_from_store(path: &Path, image: &str, cache: &HintCache, range: &ScanRange<'_>) {
    let Some(store) = HintStore::load_from_path(path) else {
        return;
    };
    if !store.is_valid_for(image) {
        return;
    }

    debug!(
        "Seeding {} hints from {}",
        store.entries.len(),
        path.display()
    );
    cache.seed(store.entries.iter().filter_map(|entry| {
        let offset = usize::try_from(entry.addr).ok()?;
        let addr = range.start().checked_add(offset)?;
        Some((entry.hash, addr))
    }));
}

/// Save `cache` as a store of file offsets, dropping entries that fell
/// outside the scanned file.
fn save_to_store(
    path: &Path,
    image: String,
    cache: &HintCache,
    range: &ScanRange<'_>,
) -> Result<()> {
    let entries = cache
        .snapshot()
        .into_iter()
        .filter(|&(_, addr)| range.contains_span(addr, 1))
        .map(|(hash, addr)| HintRecord {
            hash,
            addr: (addr - range.start()) as u64,
        })
        .collect();
    HintStore::new(image, entries).save_to_path(path)?;
    Ok(())
}

/// Parse the `--base` address, with or without a `0x` prefix.
fn parse_hex_address(s: &str) -> Result<u64> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
        .map_err(|e| anyhow::anyhow!("Invalid hex address {:?}: {}", s, e))
}

/// Print 16-byte hexdump rows covering the match at `offset`.
fn print_context(data: &[u8], offset: usize, rows: usize, base: u64) {
    let first_row = offset & !0xF;
    for row in 0..rows {
        let line = first_row + row * 16;
        if line >= data.len() {
            break;
        }
        let chunk = &data[line..data.len().min(line + 16)];
        print!("    0x{:08X}: ", base + line as u64);

        // Hex bytes
        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                print!(" ");
            }
            print!("{:02X} ", byte);
        }

        // Padding for incomplete lines
        if chunk.len() < 16 {
            for j in chunk.len()..16 {
                if j == 8 {
                    print!(" ");
                }
                print!("   ");
            }
        }

        // ASCII representation
        print!(" |");
        for byte in chunk {
            if *byte >= 0x20 && *byte < 0x7F {
                print!("{}", *byte as char);
            } else {
                print!(".");
            }
        }
        for _ in chunk.len()..16 {
            print!(" ");
        }
        println!("|");
    }
}
