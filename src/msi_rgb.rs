//! MSI mainboard RGB header control.
//!
//! The header is driven by the Nuvoton Super I/O chip. Colors are stored in a four step sequence
//! with 4 bits per channel, two steps per register.

use crate::superio::SuperIo;
use crate::Rgb;

/// Logical device selection register.
const REG_LOGDEV: u8 = 0x07;

/// Logical device holding the pulse unlock bit.
const LOGDEV_UNLOCK: u8 = 0x09;
const REG_UNLOCK: u8 = 0x2c;

/// Logical device of the RGB controller.
const LOGDEV_RGB: u8 = 0x12;

const REG_ENABLE: u8 = 0xe0;
const ENABLE_MASK: u8 = 0xe0;

/// Pulsing and blinking configuration.
const REG_CFG_1: u8 = 0xe4;

/// Rainbow effect configuration.
const REG_CFG_RAINBOW: u8 = 0xfd;

/// Header enable and channel inversion.
const REG_CFG_3: u8 = 0xff;

/// Header on with step duration bit 8 and pulse cleared.
const CFG_3_DEFAULT: u8 = 0b1110_0010;
const CFG_3_INVERT: u8 = 0b0001_1100;

/// Sequence registers, two 4-bit steps each.
const REGS_RED: [u8; 4] = [0xf0, 0xf1, 0xf2, 0xf3];
const REGS_GREEN: [u8; 4] = [0xf4, 0xf5, 0xf6, 0xf7];
const REGS_BLUE: [u8; 4] = [0xf8, 0xf9, 0xfa, 0xfb];

/// Board IDs which require the channel inversion flag.
const INVERTED_BOARDS: [&str; 21] = [
    "7B89", "7B90", "7B19", "7C02", "7B75", "7B22", "7B23", "7B24", "7B27", "7B30", "7B31", "7B51",
    "7C04", "7C00", "7B98", "7C22", "7C24", "7C01", "7C39", "7B86", "7B87",
];

/// MSI RGB header controller.
pub struct MsiRgb<S: SuperIo> {
    sio: S,
}

impl<S: SuperIo> MsiRgb<S> {
    /// Initialize the RGB controller of the board identified by `board`.
    pub fn new(sio: S, board: &str) -> Self {
        let mut controller = Self { sio };

        // Pulsing does not work without this bit being flipped.
        controller.write(REG_LOGDEV, LOGDEV_UNLOCK);
        let unlock = controller.read(REG_UNLOCK);
        controller.write(REG_UNLOCK, (unlock & 0b1111_0111) | 0b0001_0000);

        controller.write(REG_LOGDEV, LOGDEV_RGB);

        let enable = controller.read(REG_ENABLE);
        if enable & ENABLE_MASK != ENABLE_MASK {
            log::debug!("Enabling RGB controller");
            controller.write(REG_ENABLE, enable | ENABLE_MASK);
        }

        // Lighting on, no pulsing or blinking.
        controller.write(REG_CFG_1, 0x00);

        let inverted = is_inverted(board);
        log::debug!("Board '{}' uses {} channels", board, if inverted { "inverted" } else { "normal" });
        controller.write(REG_CFG_3, cfg_3(inverted));

        controller.write(REG_CFG_RAINBOW, 0x00);

        controller
    }

    /// Set a static header color.
    ///
    /// Only the 4 most significant bits of every channel are used.
    pub fn set_color(&mut self, color: Rgb) {
        self.write(REG_LOGDEV, LOGDEV_RGB);

        for (regs, value) in [(REGS_RED, color.r), (REGS_GREEN, color.g), (REGS_BLUE, color.b)] {
            let steps = sequence_byte(value);
            for reg in regs {
                self.write(reg, steps);
            }
        }
    }

    fn write(&mut self, reg: u8, val: u8) {
        log::trace!("Super I/O write {:#04x} = {:#04x}", reg, val);
        if let Err(err) = self.sio.outb(reg, val) {
            log::warn!("Super I/O write to {:#04x} failed: {}", reg, err);
        }
    }

    fn read(&mut self, reg: u8) -> u8 {
        match self.sio.inb(reg) {
            Ok(val) => val,
            Err(err) => {
                log::warn!("Super I/O read from {:#04x} failed: {}", reg, err);
                0
            },
        }
    }
}

/// Check if a board needs its color channels inverted.
fn is_inverted(board: &str) -> bool {
    INVERTED_BOARDS.iter().any(|id| board.contains(id))
}

/// Header configuration byte.
fn cfg_3(inverted: bool) -> u8 {
    if inverted {
        CFG_3_DEFAULT | CFG_3_INVERT
    } else {
        CFG_3_DEFAULT
    }
}

/// Convert an 8-bit channel to two identical 4-bit sequence steps.
fn sequence_byte(value: u8) -> u8 {
    let nibble = value >> 4;
    nibble | (nibble << 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::superio::mock::MockSuperIo;

    fn color_writes(sio: &MockSuperIo) -> Vec<(u8, u8)> {
        sio.writes.iter().copied().filter(|(reg, _)| (0xf0..=0xfb).contains(reg)).collect()
    }

    #[test]
    fn init_sequence() {
        let sio = MockSuperIo::default().with_register(REG_UNLOCK, 0b0000_1001);
        let controller = MsiRgb::new(sio, "MS-7A34");

        assert_eq!(controller.sio.writes, vec![
            (REG_LOGDEV, LOGDEV_UNLOCK),
            (REG_UNLOCK, 0b0001_0001),
            (REG_LOGDEV, LOGDEV_RGB),
            (REG_ENABLE, ENABLE_MASK),
            (REG_CFG_1, 0x00),
            (REG_CFG_3, CFG_3_DEFAULT),
            (REG_CFG_RAINBOW, 0x00),
        ]);
    }

    #[test]
    fn enable_preserves_low_bits() {
        let sio = MockSuperIo::default().with_register(REG_ENABLE, 0x05);
        let controller = MsiRgb::new(sio, "");
        assert_eq!(controller.sio.last_write(REG_ENABLE), Some(0xe5));
    }

    #[test]
    fn enabled_controller_is_left_alone() {
        let sio = MockSuperIo::default().with_register(REG_ENABLE, 0xe3);
        let controller = MsiRgb::new(sio, "");
        assert_eq!(controller.sio.last_write(REG_ENABLE), None);
    }

    #[test]
    fn inverted_board() {
        let controller = MsiRgb::new(MockSuperIo::default(), "MS-7B89");
        let cfg = controller.sio.last_write(REG_CFG_3).unwrap();
        assert_eq!(cfg & CFG_3_INVERT, CFG_3_INVERT);
        assert_eq!(cfg, 0b1111_1110);
    }

    #[test]
    fn normal_board() {
        let controller = MsiRgb::new(MockSuperIo::default(), "MS-7A34");
        let cfg = controller.sio.last_write(REG_CFG_3).unwrap();
        assert_eq!(cfg & CFG_3_INVERT, 0);
    }

    #[test]
    fn board_match_is_case_sensitive() {
        assert!(!is_inverted("ms-7b89"));
        assert!(is_inverted("MAG B450 TOMAHAWK (MS-7C02)"));
        assert!(INVERTED_BOARDS.iter().all(|id| is_inverted(id)));
        assert!(!is_inverted(""));
    }

    #[test]
    fn color_registers() {
        let mut controller = MsiRgb::new(MockSuperIo::default(), "");
        controller.sio.writes.clear();

        controller.set_color(Rgb { r: 0xff, g: 0x80, b: 0x1f });

        assert_eq!(controller.sio.writes[0], (REG_LOGDEV, LOGDEV_RGB));
        assert_eq!(color_writes(&controller.sio), vec![
            (0xf0, 0xff),
            (0xf1, 0xff),
            (0xf2, 0xff),
            (0xf3, 0xff),
            (0xf4, 0x88),
            (0xf5, 0x88),
            (0xf6, 0x88),
            (0xf7, 0x88),
            (0xf8, 0x11),
            (0xf9, 0x11),
            (0xfa, 0x11),
            (0xfb, 0x11),
        ]);
    }

    #[test]
    fn sequence_byte_all_values() {
        for value in 0..=u8::MAX {
            let expected = (value >> 4) | ((value >> 4) << 4);
            assert_eq!(sequence_byte(value), expected);
        }
    }

    #[test]
    fn slots_are_identical() {
        let mut controller = MsiRgb::new(MockSuperIo::default(), "");

        for value in (0..=u8::MAX).step_by(7) {
            controller.sio.writes.clear();
            controller.set_color(Rgb { r: value, g: value.wrapping_add(64), b: !value });

            let writes = color_writes(&controller.sio);
            assert_eq!(writes.len(), 12);
            for slots in writes.chunks(4) {
                assert!(slots.iter().all(|(_, val)| *val == slots[0].1));
            }
        }
    }
}
