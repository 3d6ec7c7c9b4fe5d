//! # hookscan
//!
//! Byte-pattern signature scanning over raw process memory.
//!
//! This crate provides:
//! - Pattern compilation from the usual `"48 8D ? ? 01 E8"` syntax
//! - Lazy, memoized scanning of memory ranges and module images
//! - A process-wide hint cache that remembers where unique patterns
//!   resolved, verified against live memory before every reuse
//! - Optional hint persistence across runs of the same binary build
//!
//! The typical call site declares a signature unique and takes a typed
//! pointer at an offset from it:
//!
//! ```
//! # fn main() -> hookscan::Result<()> {
//! let data = [0x48u8, 0x8B, 0x05, 0x11, 0x22, 0x33, 0x44, 0xC3];
//! let range = hookscan::ScanRange::from_slice(&data);
//! let mut pattern = hookscan::Scanner::parse("48 8B 05 ? ? ? ?", range)?;
//! let target: *mut u8 = pattern.get_first(3)?;
//! # let _ = target;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hints;
pub mod pattern;
pub mod region;
pub mod scanner;

pub use error::{Error, Result};
pub use hints::{HintCache, HintRecord, HintStore, save_hints, try_seed_hints};
pub use pattern::{Signature, fnv1a_64};
pub use region::ScanRange;
pub use scanner::{MatchPoint, Scanner};

/// Scanner for `text` over the main executable's image, using the
/// process-wide hint cache.
#[cfg(target_os = "windows")]
pub fn process_pattern(text: &str) -> Result<Scanner<'static>> {
    Ok(Scanner::new(
        Signature::parse(text)?,
        ScanRange::main_module()?,
    ))
}

/// Scanner for `text` over a named module's image.
#[cfg(target_os = "windows")]
pub fn module_pattern(module: &str, text: &str) -> Result<Scanner<'static>> {
    Ok(Scanner::new(
        Signature::parse(text)?,
        ScanRange::module(module)?,
    ))
}
