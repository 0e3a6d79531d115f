//! Candidate discovery: platform classification and media node scanning.

pub mod platform;
pub mod scan;

pub use platform::{classify, PlatformHints};
pub use scan::Scanner;
