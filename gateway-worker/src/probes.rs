use std::time::Duration;

pub const LAST_BLOCK_PROBE_INTERVAL: Duration = Duration::from_secs(1);
pub const ARCHIVAL_PROBE_INTERVAL: Duration = Duration::from_secs(600);
pub const MAX_CONSECUTIVE_FAILURES: u32 = 10;
