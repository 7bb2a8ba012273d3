//! Pre-execution screening of snippet text.
//!
//! The guard is a literal substring denylist over the raw code. It does not
//! parse, normalize or decode anything, so aliased imports and string
//! construction get past it; it only catches the obvious spellings.

pub mod guard;

pub use guard::{ExecutionGuard, SecurityViolation, DEFAULT_BLOCKED_PATTERNS};
