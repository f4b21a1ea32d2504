//! Writing attachments to disk and comparing them with existing files.

pub mod attachment;
