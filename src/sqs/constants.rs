/// Window in which a FIFO deduplication id suppresses a repeated send.
pub const DEDUPLICATION_INTERVAL_IN_SEC: f64 = 300.0;

/// A deleted queue name stays blocked for this long when tombstoning is enabled.
pub const RECENTLY_DELETED_TIMEOUT: f64 = 60.0;

pub const PURGE_RETRY_INTERVAL: f64 = 60.0;

pub const DEFAULT_VISIBILITY_TIMEOUT: u32 = 30;
pub const DEFAULT_MESSAGE_RETENTION_PERIOD: u32 = 345_600;
pub const DEFAULT_MAXIMUM_MESSAGE_SIZE: u32 = 262_144;

pub const MAX_VISIBILITY_TIMEOUT: u32 = 43_200;
pub const MAX_DELAY_SECONDS: u32 = 900;
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;
pub const MAX_NUMBER_OF_MESSAGES: u32 = 10;
pub const MAX_RECEIVE_COUNT: u32 = 1_000;

pub const MAX_QUEUE_NAME_LENGTH: usize = 80;
pub const MAX_FIFO_ID_LENGTH: usize = 128;
pub const MAX_ATTRIBUTE_NAME_LENGTH: usize = 256;

pub const FIFO_SUFFIX: &str = ".fifo";
