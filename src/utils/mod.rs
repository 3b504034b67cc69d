//! Shared utilities: errors, configuration and log helpers

pub mod config;
pub mod error;

pub use config::{LayoutConfig, Viewport, WireEncoding};
pub use error::{LayoutError, Result, WireError};

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

/// Log a warning the first time `token` is seen in this process.
///
/// Returns `true` when the warning was emitted.
pub fn warn_once(token: &str, message: impl FnOnce() -> String) -> bool {
    static SEEN: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    let seen = SEEN.get_or_init(|| Mutex::new(HashSet::new()));
    let first = match seen.lock() {
        Ok(mut set) => set.insert(token.to_string()),
        // A poisoned set only costs us de-duplication.
        Err(poisoned) => poisoned.into_inner().insert(token.to_string()),
    };
    if first {
        log::warn!("{}", message());
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_once_deduplicates() {
        assert!(warn_once("test-token-abc", || "first".to_string()));
        assert!(!warn_once("test-token-abc", || "second".to_string()));
        assert!(warn_once("test-token-def", || "other".to_string()));
    }
}
