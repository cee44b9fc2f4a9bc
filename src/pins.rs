//! GPIO / peripheral pin assignments for the registry node board.
//!
//! Single source of truth: every driver and adapter references this module
//! rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// I2C0: master, polls remote peers
// ---------------------------------------------------------------------------

pub const I2C_MASTER_SDA_GPIO: i32 = 8;
pub const I2C_MASTER_SCL_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// I2C1: slave, serves the local register file
// ---------------------------------------------------------------------------

pub const I2C_SLAVE_SDA_GPIO: i32 = 17;
pub const I2C_SLAVE_SCL_GPIO: i32 = 18;

/// Controller number of the slave peripheral (`i2c1`).
pub const I2C_SLAVE_PORT: i32 = 1;

/// Standard-mode bus clock.  The bus is shared and long; no fast mode.
pub const I2C_FREQ_HZ: u32 = 100_000;

/// Per-transaction timeout.  A stalled peer blocks its own poll for at
/// most this long.
pub const I2C_TIMEOUT_MS: u64 = 50;

/// Pause between a read's key write and its payload read.  Must exceed
/// a peer's main loop period so the reply is staged in time.
pub const I2C_RESPONSE_DELAY_MS: u32 = 20;

// ---------------------------------------------------------------------------
// Relay output
// ---------------------------------------------------------------------------

/// Digital output driving the relay coil (active HIGH).
pub const RELAY_GPIO: i32 = 4;
