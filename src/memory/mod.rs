//! Cross-process memory reads
//!
//! A [`RemoteMemory`] is any readable foreign address space; the environment
//! block walker in [`peb`] is written against it so it runs the same over a
//! live process handle and over a fake in tests.

pub mod peb;
pub mod reader;

pub use peb::{read_command_line_from, walk_command_line, PebLayout};
pub use reader::{MemoryReader, RemoteMemory};

#[cfg(windows)]
pub use peb::read_command_line;
