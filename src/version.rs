// Build-time version from Cargo.toml

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `VERSION` with a trailing NUL for C callers.
pub const VERSION_NUL: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
