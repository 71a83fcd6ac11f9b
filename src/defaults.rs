use include_dir::{include_dir, Dir};

pub static DEFAULT_PROFILES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/data/profiles");

/// The default minimum delay between consecutive issue tracker requests, in seconds.
pub const DEFAULT_REQUEST_DELAY_SECS: f64 = 1.0;

/// The default delay before retrying a failed issue tracker request, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 60.0;
