//! Wall-clock seconds since the Unix epoch, as `u32` (§3's `recv_secs`/
//! header `start_time` width matches the original on-disk format).

use std::time::{SystemTime, UNIX_EPOCH};

pub fn unix_now() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0)
}
