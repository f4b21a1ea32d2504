//! In-memory storage of discovered attachments.

pub mod attachments;
