/// Current block header version
pub const BLOCK_VERSION: i32 = 1;

/// Current transaction version
pub const TX_VERSION: u16 = 0;

/// Number of sompi in one coin
pub const SOMPI_PER_COIN: u64 = 100_000_000;

/// Upper bound for any single amount and for per-transaction sums
pub const MAX_SOMPI: u64 = 29_000_000_000 * SOMPI_PER_COIN;

/// Sequence value marking an input as final
pub const MAX_TX_IN_SEQUENCE_NUM: u64 = u64::MAX;

/// Setting this bit disables the relative lock of an input
pub const SEQUENCE_LOCK_TIME_DISABLED: u64 = 1 << 63;

/// When set, the relative lock is time-based instead of blue-score based
pub const SEQUENCE_LOCK_TIME_IS_SECONDS: u64 = 1 << 22;

/// Bits of the sequence that carry the relative lock value
pub const SEQUENCE_LOCK_TIME_MASK: u64 = 0x0000_ffff;

/// Time-based relative locks count in units of 2^19 milliseconds
pub const SEQUENCE_LOCK_TIME_GRANULARITY: u64 = 19;

/// Lock times below this value are blue scores, above are millisecond timestamps
pub const LOCK_TIME_THRESHOLD: u64 = 500_000_000_000;

/// Maximum length of a signature script or script public key
pub const MAX_SCRIPT_LEN: usize = 10_000;

/// Script opcode making an output provably unspendable
pub const OP_RETURN: u8 = 0x6a;
