//! Pseudo-terminals and terminal modes

mod control;
mod mode;
mod pair;

pub use control::{EscapeControlChars, DEFAULT_EOF, DEFAULT_INTR};
pub use mode::{same_mode, ModeStack, RawModeGuard};
pub use pair::PtyPair;
