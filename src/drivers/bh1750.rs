//! BH1750 ambient light sensor over I²C.
//!
//! Runs in continuous high-resolution mode (1 lx steps, ~120 ms per
//! conversion).  The node samples far slower than that, so each read just
//! fetches the latest conversion.

use embedded_hal::i2c::I2c;

/// ADDR pin low.
pub const DEFAULT_ADDRESS: u8 = 0x23;

const CMD_POWER_ON: u8 = 0x01;
const CMD_CONTINUOUS_HIGH_RES: u8 = 0x10;

/// Counts per lux in high-resolution mode at the default measurement time.
const COUNTS_PER_LUX: f32 = 1.2;

pub fn raw_to_lux(raw: u16) -> f32 {
    f32::from(raw) / COUNTS_PER_LUX
}

pub struct Bh1750<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Bh1750<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Power the sensor on and start continuous conversions.
    pub fn start(&mut self) -> Result<(), I::Error> {
        self.i2c.write(self.address, &[CMD_POWER_ON])?;
        self.i2c.write(self.address, &[CMD_CONTINUOUS_HIGH_RES])
    }

    /// Latest conversion in lux.
    pub fn read_lux(&mut self) -> Result<f32, I::Error> {
        let mut buf = [0u8; 2];
        self.i2c.read(self.address, &mut buf)?;
        Ok(raw_to_lux(u16::from_be_bytes(buf)))
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    #[derive(Default)]
    struct MockI2c {
        writes: Vec<(u8, Vec<u8>)>,
        response: [u8; 2],
        fail: bool,
    }

    impl ErrorType for MockI2c {
        type Error = ErrorKind;
    }

    impl I2c for MockI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buf) => buf.copy_from_slice(&self.response[..buf.len()]),
                }
            }
            Ok(())
        }
    }

    #[test]
    fn start_sends_power_on_then_mode() {
        let mut s = Bh1750::new(MockI2c::default(), DEFAULT_ADDRESS);
        s.start().unwrap();
        let i2c = s.release();
        assert_eq!(
            i2c.writes,
            vec![(0x23, vec![0x01]), (0x23, vec![0x10])]
        );
    }

    #[test]
    fn read_converts_counts_to_lux() {
        let mut s = Bh1750::new(
            MockI2c {
                response: [0x01, 0xE0], // 480 counts
                ..Default::default()
            },
            DEFAULT_ADDRESS,
        );
        let lux = s.read_lux().unwrap();
        assert!((lux - 400.0).abs() < 1e-3);
    }

    #[test]
    fn bus_error_propagates() {
        let mut s = Bh1750::new(
            MockI2c {
                fail: true,
                ..Default::default()
            },
            DEFAULT_ADDRESS,
        );
        assert_eq!(s.read_lux(), Err(ErrorKind::Other));
    }
}
