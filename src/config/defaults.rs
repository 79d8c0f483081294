//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

/// Site config file looked up in the source directory.
pub const CONFIG_FILE: &str = "staticweb.toml";

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        3000
    }
}
