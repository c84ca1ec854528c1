//! Database configuration.

/// Largest string a text column accepts, in UTF-8 bytes.
pub const DEFAULT_MAX_STRING_SIZE: usize = 0x00FF_FFF8 - 9;

/// Largest value a binary column accepts, in bytes.
pub const DEFAULT_MAX_BINARY_SIZE: usize = 0x00FF_FFF8 - 8;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database directory and history if missing.
    pub create_if_missing: bool,

    /// Whether to fail if the directory already holds history.
    pub error_if_exists: bool,

    /// Whether every commit syncs the history file before it is published.
    pub sync_on_commit: bool,

    /// Maximum length of a string value in UTF-8 bytes.
    pub max_string_size: usize,

    /// Maximum length of a binary value in bytes.
    pub max_binary_size: usize,

    /// History format version written into every record.
    pub format_version: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            max_string_size: DEFAULT_MAX_STRING_SIZE,
            max_binary_size: DEFAULT_MAX_BINARY_SIZE,
            format_version: 1,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the history file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fail if the history file exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether each commit syncs the history file.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the maximum string size.
    #[must_use]
    pub const fn max_string_size(mut self, size: usize) -> Self {
        self.max_string_size = size;
        self
    }

    /// Sets the maximum binary size.
    #[must_use]
    pub const fn max_binary_size(mut self, size: usize) -> Self {
        self.max_binary_size = size;
        self
    }

    pub(crate) const fn limits(&self) -> Limits {
        Limits {
            max_string_size: self.max_string_size,
            max_binary_size: self.max_binary_size,
        }
    }
}

/// Value size limits applied before any write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum string length in bytes.
    pub max_string_size: usize,
    /// Maximum binary length in bytes.
    pub max_binary_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Config::default().limits()
    }
}
