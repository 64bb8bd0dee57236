//! GPIO / peripheral pin assignments for the CogniPet main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// User buttons (active-low momentary switches with external pull-ups)
// ---------------------------------------------------------------------------

/// Button 1 — leftmost. Menu previous / answer option 1.
pub const BUTTON_1_GPIO: i32 = 4;
/// Button 2 — centre. Menu select / answer option 2.
pub const BUTTON_2_GPIO: i32 = 5;
/// Button 3 — rightmost. Menu next / answer option 3.
pub const BUTTON_3_GPIO: i32 = 6;

/// All three button GPIOs in sampler order.
pub const BUTTON_GPIOS: [i32; 3] = [BUTTON_1_GPIO, BUTTON_2_GPIO, BUTTON_3_GPIO];

// ---------------------------------------------------------------------------
// I²C bus — 16x2 character LCD with RGB backlight controller
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;

/// 7-bit I²C address of the LCD controller (AIP31068-compatible).
pub const LCD_I2C_ADDR: u8 = 0x3E;
/// 7-bit I²C address of the RGB backlight controller (PCA9633-compatible).
pub const RGB_I2C_ADDR: u8 = 0x62;

/// I²C port index (the LCD shares ESP32-S3 port 0).
pub const I2C_PORT: i32 = 0;
pub const I2C_FREQ_HZ: u32 = 100_000;
/// Bus transaction timeout in FreeRTOS ticks.
pub const I2C_TIMEOUT_TICKS: u32 = 100;

// ---------------------------------------------------------------------------
// UART debug
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 17;
pub const UART_RX_GPIO: i32 = 18;
