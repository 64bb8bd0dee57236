//! 16x2 character LCD with RGB backlight, both on the I²C bus.
//!
//! The LCD controller is AIP31068-compatible (HD44780 command set
//! behind an I²C bridge: control byte 0x80 for commands, 0x40 for
//! data). The backlight is a PCA9633-compatible 3-channel PWM LED
//! driver. Both implement the [`DisplayPort`] boundary; a buffered
//! in-memory variant backs host builds and tests.

use crate::app::ports::DisplayPort;
use crate::error::DisplayError;
use crate::pins;

/// Visible columns per row.
pub const LCD_COLS: usize = 16;

// AIP31068 control bytes and commands.
const CTRL_CMD: u8 = 0x80;
const CTRL_DATA: u8 = 0x40;
const CMD_CLEAR: u8 = 0x01;
const CMD_FUNCTION_SET: u8 = 0x38; // 8-bit, 2 lines, 5x8 font
const CMD_DISPLAY_ON: u8 = 0x0C; // display on, cursor off, blink off
const CMD_ENTRY_MODE: u8 = 0x06; // increment, no shift
/// DDRAM base addresses for rows 0 and 1.
const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

// PCA9633 registers.
const REG_MODE1: u8 = 0x00;
const REG_MODE2: u8 = 0x01;
const REG_PWM_BLUE: u8 = 0x02;
const REG_PWM_GREEN: u8 = 0x03;
const REG_PWM_RED: u8 = 0x04;
const REG_LEDOUT: u8 = 0x08;
/// All three channels under individual PWM control.
const LEDOUT_PWM_ALL: u8 = 0xAA;

// ---------------------------------------------------------------------------
// On-target I²C implementation
// ---------------------------------------------------------------------------

/// Driver for the real panel. Construct once at boot with
/// [`I2cDisplay::init`]; all writes go through `hw_init::i2c_write`.
pub struct I2cDisplay {
    ready: bool,
}

impl I2cDisplay {
    /// Run the power-on sequence for both controllers.
    pub fn init() -> Result<Self, DisplayError> {
        for cmd in [CMD_FUNCTION_SET, CMD_DISPLAY_ON, CMD_CLEAR, CMD_ENTRY_MODE] {
            lcd_command(cmd)?;
        }
        for (reg, val) in [(REG_MODE1, 0x00), (REG_MODE2, 0x00), (REG_LEDOUT, LEDOUT_PWM_ALL)] {
            rgb_register(reg, val)?;
        }
        log::info!("display: LCD + backlight initialised");
        Ok(Self { ready: true })
    }

    /// Handle for a panel that failed its power-on sequence. Every
    /// write returns [`DisplayError::BusNotReady`]; the rest of the
    /// firmware keeps running headless.
    pub fn unready() -> Self {
        Self { ready: false }
    }
}

fn lcd_command(cmd: u8) -> Result<(), DisplayError> {
    crate::drivers::hw_init::i2c_write(pins::LCD_I2C_ADDR, &[CTRL_CMD, cmd])
        .map_err(|_| DisplayError::I2cWriteFailed)
}

fn lcd_data(byte: u8) -> Result<(), DisplayError> {
    crate::drivers::hw_init::i2c_write(pins::LCD_I2C_ADDR, &[CTRL_DATA, byte])
        .map_err(|_| DisplayError::I2cWriteFailed)
}

fn rgb_register(reg: u8, val: u8) -> Result<(), DisplayError> {
    crate::drivers::hw_init::i2c_write(pins::RGB_I2C_ADDR, &[reg, val])
        .map_err(|_| DisplayError::BacklightWriteFailed)
}

impl DisplayPort for I2cDisplay {
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), DisplayError> {
        if !self.ready {
            return Err(DisplayError::BusNotReady);
        }
        let row = (row as usize).min(1);
        lcd_command(0x80 | ROW_OFFSETS[row])?;

        // Truncate at 16, blank-pad short lines so stale characters
        // never linger at the end of a row.
        let mut written = 0;
        for byte in text.bytes().take(LCD_COLS) {
            lcd_data(byte)?;
            written += 1;
        }
        for _ in written..LCD_COLS {
            lcd_data(b' ')?;
        }
        Ok(())
    }

    fn set_backlight(&mut self, r: u8, g: u8, b: u8) -> Result<(), DisplayError> {
        if !self.ready {
            return Err(DisplayError::BusNotReady);
        }
        rgb_register(REG_PWM_RED, r)?;
        rgb_register(REG_PWM_GREEN, g)?;
        rgb_register(REG_PWM_BLUE, b)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        if !self.ready {
            return Err(DisplayError::BusNotReady);
        }
        lcd_command(CMD_CLEAR)
    }
}

// ---------------------------------------------------------------------------
// Buffered implementation (host builds, tests)
// ---------------------------------------------------------------------------

/// Captures writes in memory instead of touching a bus.
#[derive(Debug, Default)]
pub struct BufferDisplay {
    pub lines: [String; 2],
    pub backlight: (u8, u8, u8),
}

impl BufferDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplayPort for BufferDisplay {
    fn write_line(&mut self, row: u8, text: &str) -> Result<(), DisplayError> {
        let row = (row as usize).min(1);
        let mut line: String = text.chars().take(LCD_COLS).collect();
        while line.chars().count() < LCD_COLS {
            line.push(' ');
        }
        self.lines[row] = line;
        Ok(())
    }

    fn set_backlight(&mut self, r: u8, g: u8, b: u8) -> Result<(), DisplayError> {
        self.backlight = (r, g, b);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.lines = Default::default();
        Ok(())
    }
}
