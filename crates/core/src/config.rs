//! Process-wide defaults

/// Port the relay listens on when none is configured
pub const DEFAULT_PORT: u16 = 4043;

/// Maximum number of memoized tokens before the address cache is rebuilt empty
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 1024 * 1024;

/// Longest header line accepted in one read, terminator included
pub const DEFAULT_MAX_HEADER_LEN: usize = 4096;

/// Open-file ceiling requested at startup (clamped to the hard limit)
pub const DEFAULT_MAX_OPEN_FILES: u64 = 1024 * 1024 * 1024;

/// Environment variable holding the shared AES key
pub const SECRET_ENV: &str = "SECRET";

/// Environment variable holding the salt suffix
pub const SALT_ENV: &str = "SALT";
