//! Bridge version metadata

/// Semver of this crate, taken from Cargo.toml
///
/// Never hand-write it; `env!("CARGO_PKG_VERSION")` keeps it in sync.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name as published, used in log prefixes
pub const SDK_NAME: &str = env!("CARGO_PKG_NAME");

/// `name/version` string for diagnostics
pub fn user_agent() -> String {
    format!("{}/{}", SDK_NAME, SDK_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_carries_version() {
        assert!(user_agent().starts_with("parley-sdk/"));
        assert!(user_agent().ends_with(SDK_VERSION));
    }
}
