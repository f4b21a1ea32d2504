//! Core data model types: attachments, their kinds, and turn timestamps.

pub mod attachment;
pub mod timestamp;
