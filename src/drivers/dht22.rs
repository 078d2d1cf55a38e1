//! DHT22 / AM2302 single-wire temperature and humidity driver.
//!
//! ```text
//!  host:   ‾‾‾\______1 ms______/‾‾ 30 µs ‾‾
//!  sensor:                           \_80µs_/‾80µs‾\ 40 × (\_50µs_/‾26|70µs‾)
//! ```
//!
//! Bits are decoded by timing the high half of each bit cell: ~26 µs is a
//! `0`, ~70 µs is a `1`.  Timing is taken by polling the line once per
//! microsecond through [`DelayNs`], so the same code runs against the
//! ESP-IDF open-drain pin and a scripted test pin.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

/// High time that separates a `0` from a `1` bit (microseconds).
const ONE_BIT_THRESHOLD_US: u32 = 40;
/// Give up waiting for an edge after this long (microseconds).
const EDGE_TIMEOUT_US: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtError {
    /// The sensor never produced an expected edge.
    Timeout,
    /// The fifth byte did not match the sum of the first four.
    Checksum,
    /// The GPIO reported an error.
    Pin,
}

impl core::fmt::Display for DhtError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => write!(f, "DHT22 response timeout"),
            Self::Checksum => write!(f, "DHT22 checksum mismatch"),
            Self::Pin => write!(f, "DHT22 pin error"),
        }
    }
}

/// One decoded DHT22 frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhtReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Decode a 5-byte frame: humidity ×10, temperature ×10 (sign in bit 15),
/// checksum.
pub fn decode(frame: [u8; 5]) -> Result<DhtReading, DhtError> {
    let sum = frame[..4]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(DhtError::Checksum);
    }
    let humidity = u16::from_be_bytes([frame[0], frame[1]]);
    let magnitude = u16::from_be_bytes([frame[2] & 0x7F, frame[3]]);
    let mut temperature = f32::from(magnitude) / 10.0;
    if frame[2] & 0x80 != 0 {
        temperature = -temperature;
    }
    Ok(DhtReading {
        temperature_c: temperature,
        humidity_pct: f32::from(humidity) / 10.0,
    })
}

pub struct Dht22<P> {
    pin: P,
}

impl<P> Dht22<P>
where
    P: InputPin + OutputPin,
{
    /// `pin` must be open-drain with a pull-up; it idles high.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Run one full start/response/data exchange.
    ///
    /// The sensor needs ~2 s between reads; callers space samples at
    /// least that far apart.
    pub fn read<D: DelayNs>(&mut self, delay: &mut D) -> Result<DhtReading, DhtError> {
        self.pin.set_low().map_err(|_| DhtError::Pin)?;
        delay.delay_ms(1);
        self.pin.set_high().map_err(|_| DhtError::Pin)?;
        delay.delay_us(30);

        // Response: sensor pulls low ~80 µs, releases ~80 µs, then data.
        self.wait_while(delay, true)?;
        self.wait_while(delay, false)?;
        self.wait_while(delay, true)?;

        let mut frame = [0u8; 5];
        for bit in 0..40 {
            self.wait_while(delay, false)?;
            let high_us = self.wait_while(delay, true)?;
            if high_us > ONE_BIT_THRESHOLD_US {
                frame[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
        decode(frame)
    }

    /// Poll until the line leaves `level`; returns the microseconds spent.
    fn wait_while<D: DelayNs>(&mut self, delay: &mut D, level: bool) -> Result<u32, DhtError> {
        let mut elapsed = 0;
        loop {
            let high = self.pin.is_high().map_err(|_| DhtError::Pin)?;
            if high != level {
                return Ok(elapsed);
            }
            if elapsed >= EDGE_TIMEOUT_US {
                return Err(DhtError::Timeout);
            }
            delay.delay_us(1);
            elapsed += 1;
        }
    }

    pub fn release(self) -> P {
        self.pin
    }
}
