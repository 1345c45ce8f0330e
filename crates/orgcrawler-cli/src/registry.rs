//! Payload-by-name resolution.
//!
//! The source resolves a dotted `module.function` path with
//! `importlib.import_module`, reaching anywhere on `$PYTHONPATH`. Rust has
//! no dynamic-import equivalent, so names are resolved against a static
//! table of this crate's built-in payloads instead; anything not in the
//! table is reported as an unknown payload, pointing the caller at
//! `--payload-file` for anything custom.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use orgcrawler_core::Payload;

static BUILTIN_PAYLOADS: LazyLock<HashMap<&'static str, Arc<dyn Payload>>> =
    LazyLock::new(|| orgcrawler_demo_payloads::builtin_payloads().into_iter().collect());

/// Resolve `name` against the built-in payload table.
pub fn resolve(name: &str) -> Option<Arc<dyn Payload>> {
    BUILTIN_PAYLOADS.get(name).cloned()
}

/// Every name the built-in table recognizes, for error messages.
pub fn known_names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_PAYLOADS.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_builtin_payload_name() {
        for name in orgcrawler_demo_payloads::builtin_payloads().into_iter().map(|(n, _)| n) {
            assert!(resolve(name).is_some(), "expected {name} to resolve");
        }
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        assert!(resolve("not_a_real_payload").is_none());
    }
}
