//! Fixed-point numbers used by the movie and track headers.
//!
//! ISOBMFF stores rates, volumes and track dimensions as binary fixed-point
//! values: 16.16 in 32 bits and 8.8 in 16 bits. These wrappers keep the raw
//! bits (so re-encoding is exact) and render them as `"<int>.<fraction>"`,
//! where the fraction is a fixed-width decimal truncation of
//! `fraction / (mask + 1)`.

use serde::{Serialize, Serializer};
use std::fmt;

fn write_magnitude(
    f: &mut fmt::Formatter<'_>,
    negative: bool,
    magnitude: u64,
    shift: u32,
    digits: u32,
) -> fmt::Result {
    let mask = (1u64 << shift) - 1;
    let int_part = magnitude >> shift;
    // integer arithmetic only: exact for every binary fraction
    let frac = ((magnitude & mask) * 10u64.pow(digits)) >> shift;
    let sign = if negative { "-" } else { "" };
    write!(f, "{sign}{int_part}.{frac:0width$}", width = digits as usize)
}

macro_rules! fixed_point {
    ($(#[$doc:meta])* $name:ident, $repr:ty, $bytes:literal, $shift:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub $repr);

        impl $name {
            pub const ONE: Self = Self(1 << $shift);

            pub fn from_be_bytes(b: [u8; $bytes]) -> Self {
                Self(<$repr>::from_be_bytes(b))
            }

            pub fn to_be_bytes(self) -> [u8; $bytes] {
                self.0.to_be_bytes()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(self)
            }
        }
    };
}

fixed_point!(
    /// Unsigned 16.16 value (track width / height).
    UFixed16_16, u32, 4, 16
);
fixed_point!(
    /// Signed 16.16 value (movie rate).
    Fixed16_16, i32, 4, 16
);
fixed_point!(
    /// Unsigned 8.8 value.
    UFixed8_8, u16, 2, 8
);
fixed_point!(
    /// Signed 8.8 value (volume, balance).
    Fixed8_8, i16, 2, 8
);

impl fmt::Display for UFixed16_16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_magnitude(f, false, self.0 as u64, 16, 3)
    }
}

impl fmt::Display for Fixed16_16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_magnitude(f, self.0 < 0, self.0.unsigned_abs() as u64, 16, 3)
    }
}

impl fmt::Display for UFixed8_8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_magnitude(f, false, self.0 as u64, 8, 2)
    }
}

impl fmt::Display for Fixed8_8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_magnitude(f, self.0 < 0, self.0.unsigned_abs() as u64, 8, 2)
    }
}
