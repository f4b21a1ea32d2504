//! Readers for the binary turn files and for embedded file names.

pub mod filename;
pub mod notes;
pub mod result;
pub mod util;
