//! Shared constants for the recorder
//!
//! Defaults mirror the values the DAMON debugfs tooling has always shipped
//! with; limits mirror the checks the kernel applies on write.

/// Default requested attributes
pub mod defaults {
    /// Sampling interval in microseconds
    pub const SAMPLE_INTERVAL_US: u64 = 5_000;
    /// Aggregation interval in microseconds
    pub const AGGR_INTERVAL_US: u64 = 100_000;
    /// Regions update interval in microseconds
    pub const REGIONS_UPDATE_INTERVAL_US: u64 = 1_000_000;
    pub const MIN_NR_REGIONS: u64 = 10;
    pub const MAX_NR_REGIONS: u64 = 1_000;
    /// Result buffer length in bytes
    pub const RBUF_LEN: u32 = 1024 * 1024;
    pub const OUTPUT_PATH: &str = "damon.data";
    pub const DEBUGFS_MOUNT: &str = "/sys/kernel/debug";
}

/// Limits enforced by the monitor on write
pub mod limits {
    pub const MIN_NR_REGIONS_FLOOR: u64 = 3;
    pub const MAX_RBUF_LEN: u32 = 4 * 1024 * 1024;
    /// Output paths must be strictly shorter than this many bytes
    pub const MAX_OUTPUT_PATH_LEN: usize = 256;
}

/// Control entries below the debugfs mount
pub mod entries {
    pub const DIR: &str = "damon";
    pub const ATTRS: &str = "attrs";
    pub const RECORD: &str = "record";
    pub const PIDS: &str = "pids";
    pub const MONITOR_ON: &str = "monitor_on";
}

/// Polling intervals
pub mod polling {
    use std::time::Duration;

    /// Interval between status reads while waiting on the monitor
    pub const STANDARD: Duration = Duration::from_secs(1);
    /// Interval used by tests
    pub const FAST: Duration = Duration::from_millis(10);
}

/// Process exit codes, stable per failure class
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// Any failure before a snapshot was taken
    pub const FATAL: i32 = 1;
    pub const ATTRS_APPLY_FAILED: i32 = -1;
    pub const TARGET_ATTACH_FAILED: i32 = -2;
    pub const ACTIVATION_FAILED: i32 = -3;
}

/// Shell used to launch command targets
pub const SHELL: &str = "/bin/sh";

/// Suffix appended to a previous recording before it is moved aside
pub const OLD_OUTPUT_SUFFIX: &str = ".old";
