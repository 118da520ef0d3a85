//! ## Logging Configuration
//!
//! Logging is set up automatically at program startup using the `ctor` crate.
//! It is controlled by the `DEBUG_HOUSING_FEATURES` environment variable:
//!
//! - **Disabled** (default): the variable is unset, empty, or set to `"0"` or `"false"`.
//! - **Enabled**: any other value installs a `tracing` subscriber with a maximum level of `DEBUG`.
//!
//! ```sh
//! export DEBUG_HOUSING_FEATURES=true
//! ```

use ctor::ctor;
use tracing::Level;

/// Name of the environment variable that turns on debug logging.
pub const DEBUG_ENV_VAR: &str = "DEBUG_HOUSING_FEATURES";

/// Returns true if the given value of [`DEBUG_ENV_VAR`] enables logging.
pub(crate) fn logging_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !(v == "0" || v == "false" || v.is_empty()))
}

#[ctor]
fn set_debug_level() {
    let value = std::env::var(DEBUG_ENV_VAR).ok();
    if logging_enabled(value.as_deref()) {
        // `try_init` so that a host application with its own subscriber is left alone.
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .try_init();
    }
}
