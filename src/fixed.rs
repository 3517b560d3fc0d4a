/*!
Fixed-width signed fixed-point numbers.

A [`FixedPoint`] stores a magnitude in six little-endian 32-bit digits (192 bits)
scaled by 2^96, and a separate sign word:

```text
value = (-1)^negative * sum(digits[i] * 2^(32 * i)) / 2^96
```

so the representable magnitudes are the multiples of 2^-96 below 2^96. Addition
and subtraction are exact. Multiplication keeps the full 384-bit product and
truncates it toward zero onto the 2^-96 grid, which is the rule
`mandelbrot.wgsl` implements as well; host and device therefore agree bit for
bit.

Overflow past the top digit is a hard numeric limit. The `checked_*` methods
report it with `None`, and the operator impls panic rather than wrap, since a
wrapped coordinate would render a plausible but wrong image. The escape engine
bounds its inputs so that the kernel never reaches the limit.

The struct is `#[repr(C)]` and [`bytemuck::Pod`], so per-pixel state containing
it is uploaded to the device as is.
*/

use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, Mul, Neg, Sub},
};

use bytemuck::{Pod, Zeroable};

use crate::error::{Error, Result};

/// Number of 32-bit digits.
pub const DIGITS: usize = 6;

/// Digits below the binary point.
pub const FRACTION_DIGITS: usize = 3;

/// Bits below the binary point.
pub const FRACTION_BITS: i32 = 32 * FRACTION_DIGITS as i32;

/// Exclusive bound on magnitudes accepted by [`FixedPoint::from_native`] (2^96).
pub const MAGNITUDE_LIMIT: f64 = 79228162514264337593543950336.0;

/// Exclusive bound on magnitudes accepted by [`FixedPoint::to_hi_lo`] (2^31).
pub const TRANSPORT_LIMIT: f64 = 2147483648.0;

#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedPoint {
    digits: [u32; DIGITS],
    negative: u32,
}

impl FixedPoint {
    pub const ZERO: Self = FixedPoint {
        digits: [0; DIGITS],
        negative: 0,
    };

    pub const ONE: Self = FixedPoint {
        digits: [0, 0, 0, 1, 0, 0],
        negative: 0,
    };

    fn from_parts(digits: [u32; DIGITS], negative: bool) -> Self {
        let negative = negative && digits.iter().any(|digit| *digit != 0);
        FixedPoint {
            digits,
            negative: negative as u32,
        }
    }

    /// Converts a double, truncating toward zero below 2^-96.
    ///
    /// Fails with [`Error::PrecisionExceeded`] for non-finite input or when
    /// `|value| >= 2^96`.
    pub fn from_native(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::precision_exceeded(format!(
                "{value} has no fixed-point representation"
            )));
        }

        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let biased_exponent = ((bits >> 52) & 0x7ff) as i32;
        let fraction = bits & ((1 << 52) - 1);

        // |value| = mantissa * 2^exponent
        let (mantissa, exponent) = if biased_exponent == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1 << 52), biased_exponent - 1075)
        };

        if mantissa == 0 {
            return Ok(Self::ZERO);
        }

        let shift = exponent + FRACTION_BITS;
        let mut digits = [0u32; DIGITS];

        if shift >= 0 {
            let top_bit = 64 - mantissa.leading_zeros() as i32 + shift;
            if top_bit > 32 * DIGITS as i32 {
                return Err(Error::precision_exceeded(format!(
                    "|{value}| is not below 2^{}",
                    32 * (DIGITS - FRACTION_DIGITS)
                )));
            }

            let word = (shift / 32) as usize;
            let wide = (mantissa as u128) << (shift % 32);
            for (k, digit) in digits.iter_mut().skip(word).take(3).enumerate() {
                *digit = (wide >> (32 * k)) as u32;
            }
        } else if shift > -64 {
            let scaled = mantissa >> -shift;
            digits[0] = scaled as u32;
            digits[1] = (scaled >> 32) as u32;
        }

        Ok(Self::from_parts(digits, negative))
    }

    pub fn from_f32(value: f32) -> Result<Self> {
        Self::from_native(f64::from(value))
    }

    /// Nearest double. Lossy past 53 significant bits; intended for display.
    pub fn to_native(&self) -> f64 {
        let magnitude = self
            .digits
            .iter()
            .enumerate()
            .rev()
            .fold(0.0, |acc, (i, digit)| {
                acc + f64::from(*digit) * 2f64.powi(32 * i as i32 - FRACTION_BITS)
            });

        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }

    pub fn to_f32(&self) -> f32 {
        self.to_native() as f32
    }

    /// Number of significant digits.
    pub fn used(&self) -> usize {
        self.digits
            .iter()
            .rposition(|digit| *digit != 0)
            .map_or(0, |index| index + 1)
    }

    pub fn digits(&self) -> &[u32; DIGITS] {
        &self.digits
    }

    pub fn is_zero(&self) -> bool {
        self.used() == 0
    }

    pub fn is_negative(&self) -> bool {
        self.negative != 0
    }

    pub fn abs(self) -> Self {
        Self::from_parts(self.digits, false)
    }

    pub fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.digits.iter().rev().cmp(other.digits.iter().rev())
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        if self.negative == rhs.negative {
            add_magnitudes(&self.digits, &rhs.digits)
                .map(|digits| Self::from_parts(digits, self.is_negative()))
        } else if self.cmp_magnitude(&rhs) == Ordering::Less {
            Some(Self::from_parts(
                sub_magnitudes(&rhs.digits, &self.digits),
                rhs.is_negative(),
            ))
        } else {
            Some(Self::from_parts(
                sub_magnitudes(&self.digits, &rhs.digits),
                self.is_negative(),
            ))
        }
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.checked_add(-rhs)
    }

    /// Product truncated toward zero onto the 2^-96 grid.
    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        let mut product = [0u32; 2 * DIGITS];

        for (i, a) in self.digits.iter().enumerate() {
            if *a == 0 {
                continue;
            }

            let mut carry = 0u64;
            for (j, b) in rhs.digits.iter().enumerate() {
                let t = u64::from(*a) * u64::from(*b) + u64::from(product[i + j]) + carry;
                product[i + j] = t as u32;
                carry = t >> 32;
            }
            product[i + DIGITS] = carry as u32;
        }

        if product[DIGITS + FRACTION_DIGITS..]
            .iter()
            .any(|digit| *digit != 0)
        {
            return None;
        }

        let mut digits = [0u32; DIGITS];
        digits.copy_from_slice(&product[FRACTION_DIGITS..DIGITS + FRACTION_DIGITS]);
        Some(Self::from_parts(
            digits,
            self.is_negative() != rhs.is_negative(),
        ))
    }

    pub fn checked_square(self) -> Option<Self> {
        self.checked_mul(self)
    }

    /// Exact product with a small integer, used for `step * pixel_index`.
    pub fn mul_u32(self, factor: u32) -> Option<Self> {
        let mut digits = [0u32; DIGITS];
        let mut carry = 0u64;
        for (out, digit) in digits.iter_mut().zip(self.digits.iter()) {
            let t = u64::from(*digit) * u64::from(factor) + carry;
            *out = t as u32;
            carry = t >> 32;
        }

        (carry == 0).then(|| Self::from_parts(digits, self.is_negative()))
    }

    pub fn double(self) -> Option<Self> {
        self.checked_add(self)
    }

    /**
    Packs the value into two words for devices without 192-bit integers.

    `hi` carries the sign in bit 63, the integer part in bits 32..63 and the first
    fractional digit in its low half; `lo` carries the remaining two fractional
    digits. Magnitudes of 2^31 and above do not fit and fail with
    [`Error::PrecisionExceeded`].
    */
    pub fn to_hi_lo(&self) -> Result<(u64, u64)> {
        if self.digits[4] != 0 || self.digits[5] != 0 || self.digits[3] >> 31 != 0 {
            return Err(Error::precision_exceeded(format!(
                "{} does not fit the 128-bit transport encoding",
                self
            )));
        }

        let hi = (u64::from(self.negative) << 63)
            | (u64::from(self.digits[3]) << 32)
            | u64::from(self.digits[2]);
        let lo = (u64::from(self.digits[1]) << 32) | u64::from(self.digits[0]);
        Ok((hi, lo))
    }

    pub fn from_hi_lo(hi: u64, lo: u64) -> Self {
        let digits = [
            lo as u32,
            (lo >> 32) as u32,
            hi as u32,
            ((hi >> 32) & 0x7fff_ffff) as u32,
            0,
            0,
        ];
        Self::from_parts(digits, hi >> 63 == 1)
    }
}

fn add_magnitudes(a: &[u32; DIGITS], b: &[u32; DIGITS]) -> Option<[u32; DIGITS]> {
    let mut digits = [0u32; DIGITS];
    let mut carry = 0u64;
    for i in 0..DIGITS {
        let t = u64::from(a[i]) + u64::from(b[i]) + carry;
        digits[i] = t as u32;
        carry = t >> 32;
    }
    (carry == 0).then_some(digits)
}

/// `a - b`, where `|a| >= |b|`.
fn sub_magnitudes(a: &[u32; DIGITS], b: &[u32; DIGITS]) -> [u32; DIGITS] {
    let mut digits = [0u32; DIGITS];
    let mut borrow = false;
    for i in 0..DIGITS {
        let (d1, b1) = a[i].overflowing_sub(b[i]);
        let (d2, b2) = d1.overflowing_sub(borrow as u32);
        digits[i] = d2;
        borrow = b1 || b2;
    }
    debug_assert!(!borrow, "sub_magnitudes called with |a| < |b|");
    digits
}

impl Neg for FixedPoint {
    type Output = FixedPoint;

    fn neg(self) -> Self::Output {
        Self::from_parts(self.digits, !self.is_negative())
    }
}

impl Add for FixedPoint {
    type Output = FixedPoint;

    fn add(self, rhs: Self) -> Self::Output {
        self.checked_add(rhs)
            .unwrap_or_else(|| panic!("fixed-point overflow in {self} + {rhs}"))
    }
}

impl Sub for FixedPoint {
    type Output = FixedPoint;

    fn sub(self, rhs: Self) -> Self::Output {
        self.checked_sub(rhs)
            .unwrap_or_else(|| panic!("fixed-point overflow in {self} - {rhs}"))
    }
}

impl Mul for FixedPoint {
    type Output = FixedPoint;

    fn mul(self, rhs: Self) -> Self::Output {
        self.checked_mul(rhs)
            .unwrap_or_else(|| panic!("fixed-point overflow in {self} * {rhs}"))
    }
}

impl Ord for FixedPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_negative(), other.is_negative()) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

impl PartialOrd for FixedPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:e}", self.to_native())
    }
}

impl fmt::Debug for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedPoint({}", if self.is_negative() { '-' } else { '+' })?;
        for digit in self.digits.iter().rev() {
            write!(f, " {digit:08x}")?;
        }
        write!(f, " ≈ {})", self)
    }
}
