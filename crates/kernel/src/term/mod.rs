//! VT100-compatible terminal emulator: cell buffer, cursor/SGR state, the
//! ANSI parser, and the pseudo-terminal pipe pair.

pub mod ansi;
pub mod cell;
pub mod pty;
pub mod screen;
pub mod terminal;

pub use ansi::AnsiParser;
pub use pty::{PtyMaster, PtySlave};
pub use terminal::Terminal;
