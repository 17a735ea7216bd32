//! Small shared helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time packed as `seconds << 32 | subsecond_nanos`.
///
/// This is the timestamp format carried by snap files and onode headers.
/// Monotonicity across the packed halves is not required; the value is
/// informational.
#[must_use]
pub(crate) fn packed_timestamp() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() << 32) | u64::from(d.subsec_nanos()),
        Err(_) => 0,
    }
}
