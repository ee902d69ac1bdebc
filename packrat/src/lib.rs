//! # packrat
//!
//! A pure-Rust toolkit for the pack archives used by retro game engines.
//!
//! ## Supported Containers
//!
//! - **Directories** - a filesystem tree treated as an archive
//! - **PAK** - flat-table archives (directory table appended after the data)
//! - **GRP** - relocating-table archives (directory table before the data)
//! - **PK3/ZIP** - zip-family archives with per-entry compression
//!
//! ## Quick Start
//!
//! ### Working with Archives
//!
//! ```no_run
//! use packrat::pack::{open_pack, WarnSink};
//! use packrat::ops::list_entries;
//!
//! // List the contents of an archive; the backend is chosen by path.
//! let pack = open_pack("game0.pak", false, WarnSink::silent())?;
//! for entry in list_entries(&pack, None) {
//!     println!("{} ({} bytes)", entry.name, entry.len);
//! }
//! pack.close()?;
//! # Ok::<(), packrat::Error>(())
//! ```
//!
//! ### Merging Archives
//!
//! ```no_run
//! use packrat::pack::{create_pack, open_pack, WarnSink};
//! use packrat::ops::convert_packs;
//!
//! // Union two archives; entries in patch.pk3 override base.grp.
//! let warn = WarnSink::silent();
//! let mut sources = vec![
//!     open_pack("base.grp", false, warn.clone())?,
//!     open_pack("patch.pk3", false, warn.clone())?,
//! ];
//! let mut merged = create_pack("merged.pk3", warn.clone())?;
//! convert_packs(&mut sources, &mut merged, &warn)?;
//! merged.close()?;
//! # Ok::<(), packrat::Error>(())
//! ```
//!
//! ### Comparing Archives
//!
//! ```no_run
//! use packrat::pack::{open_pack, WarnSink};
//! use packrat::ops::diff_packs;
//!
//! let mut a = open_pack("v1.pk3", false, WarnSink::silent())?;
//! let mut b = open_pack("v2.pk3", false, WarnSink::silent())?;
//! for change in diff_packs(&mut a, &mut b)?.changes {
//!     println!("{change}");
//! }
//! # Ok::<(), packrat::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `packrat` command-line binary

pub mod error;
pub mod ops;
pub mod pack;

// Re-exports for convenience
pub use error::{Error, Result};
pub use pack::{FileTime, Pack, WarnSink, create_pack, open_pack};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
