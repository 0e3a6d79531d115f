//! Metadata snapshot assembly.
//!
//! Every snapshot is read fresh from the bound surface; nothing here is
//! cached. Fields the surface refuses stay absent rather than guessed, with
//! two exceptions: the title falls back through page heuristics so it is
//! never empty, and a missing duration may be recovered from the player's
//! own time display.

pub mod extractor;

pub use extractor::{parse_clock, MetadataExtractor, TITLE_SELECTORS};
