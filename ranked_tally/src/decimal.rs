//! Fixed precision decimal numbers for vote tallies.
//!
//! Values are stored as a signed integer scaled by 10^12. Additions and subtractions are
//! exact. Multiplications and divisions take the number of decimal digits to keep and the
//! rounding direction explicitly, so that every step of a count rounds the same way on
//! every platform.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// The largest number of decimal digits that can be requested.
pub const MAX_PRECISION: u32 = 12;

const SCALE: i128 = pow10(MAX_PRECISION);

const fn pow10(digits: u32) -> i128 {
    let mut res: i128 = 1;
    let mut togo = digits;
    while togo > 0 {
        res *= 10;
        togo -= 1;
    }
    res
}

/// Direction used when a result has more digits than the requested precision.
///
/// Rounding applies to the magnitude: `Up` rounds away from zero and `HalfUp` rounds
/// halves away from zero.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Rounding {
    Down,
    Up,
    HalfUp,
}

fn div_round(num: i128, den: i128, rounding: Rounding) -> i128 {
    let negative = (num < 0) != (den < 0);
    let (n, d) = (num.abs(), den.abs());
    let (q, r) = (n / d, n % d);
    let magnitude = match rounding {
        Rounding::Down => q,
        Rounding::Up if r > 0 => q + 1,
        Rounding::Up => q,
        Rounding::HalfUp if 2 * r >= d => q + 1,
        Rounding::HalfUp => q,
    };
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[derive(Eq, PartialEq, Clone, Copy, Hash, Ord, PartialOrd, Default)]
pub struct Decimal {
    scaled: i128,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal { scaled: 0 };
    pub const ONE: Decimal = Decimal { scaled: SCALE };

    /// The value `scaled / 10^12`.
    pub const fn from_scaled(scaled: i128) -> Decimal {
        Decimal { scaled }
    }

    pub fn scaled(&self) -> i128 {
        self.scaled
    }

    /// The smallest positive value representable with `precision` digits.
    pub fn unit(precision: u32) -> Decimal {
        Decimal {
            scaled: step(precision),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.scaled == 0
    }

    /// Exact multiplication by a ballot multiplicity.
    pub fn times(self, count: u64) -> Decimal {
        Decimal {
            scaled: self.scaled * count as i128,
        }
    }

    pub fn round(self, precision: u32, rounding: Rounding) -> Decimal {
        let step = step(precision);
        Decimal {
            scaled: div_round(self.scaled, step, rounding) * step,
        }
    }

    /// `self * rhs`, rounded once to `precision` digits.
    pub fn mul(self, rhs: Decimal, precision: u32, rounding: Rounding) -> Decimal {
        let step = step(precision);
        let units = div_round(self.scaled * rhs.scaled, SCALE * step, rounding);
        Decimal {
            scaled: units * step,
        }
    }

    /// `self / rhs`, rounded once to `precision` digits. None when dividing by zero.
    pub fn checked_div(self, rhs: Decimal, precision: u32, rounding: Rounding) -> Option<Decimal> {
        if rhs.is_zero() {
            return None;
        }
        let step = step(precision);
        let units = div_round(self.scaled * pow10(precision), rhs.scaled, rounding);
        Some(Decimal {
            scaled: units * step,
        })
    }

    /// `self * num / den` computed exactly, then rounded once to `precision` digits.
    pub fn checked_mul_div(
        self,
        num: Decimal,
        den: Decimal,
        precision: u32,
        rounding: Rounding,
    ) -> Option<Decimal> {
        if den.is_zero() {
            return None;
        }
        let step = step(precision);
        let units = div_round(self.scaled * num.scaled, den.scaled * step, rounding);
        Some(Decimal {
            scaled: units * step,
        })
    }
}

fn step(precision: u32) -> i128 {
    pow10(MAX_PRECISION - precision.min(MAX_PRECISION))
}

impl From<u64> for Decimal {
    fn from(v: u64) -> Self {
        Decimal {
            scaled: v as i128 * SCALE,
        }
    }
}

impl From<u32> for Decimal {
    fn from(v: u32) -> Self {
        Decimal::from(v as u64)
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.scaled += rhs.scaled;
    }
}

impl SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.scaled -= rhs.scaled;
    }
}

impl Add for Decimal {
    type Output = Decimal;
    fn add(self, rhs: Decimal) -> Decimal {
        Decimal {
            scaled: self.scaled + rhs.scaled,
        }
    }
}

impl Sub for Decimal {
    type Output = Decimal;
    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal {
            scaled: self.scaled - rhs.scaled,
        }
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Decimal {
            scaled: iter.map(|d| d.scaled).sum(),
        }
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.scaled < 0 { "-" } else { "" };
        let magnitude = self.scaled.abs();
        let int_portion = magnitude / SCALE;
        let frac_portion = magnitude % SCALE;
        if frac_portion == 0 {
            write!(f, "{}{}", sign, int_portion)
        } else {
            let digits = format!("{:01$}", frac_portion, MAX_PRECISION as usize);
            write!(f, "{}{}.{}", sign, int_portion, digits.trim_end_matches('0'))
        }
    }
}

impl Debug for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParseDecimalError {
    input: String,
}

impl Display for ParseDecimalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot read {:?} as a decimal number", self.input)
    }
}

impl Error for ParseDecimalError {}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(buf: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError {
            input: buf.to_string(),
        };
        let trimmed = buf.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if frac_part.len() > MAX_PRECISION as usize
            || !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }
        let int_value: i128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| err())?
        };
        let mut frac_value: i128 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().map_err(|_| err())?
        };
        for _ in frac_part.len()..MAX_PRECISION as usize {
            frac_value *= 10;
        }
        let scaled = int_value * SCALE + frac_value;
        Ok(Decimal {
            scaled: if negative { -scaled } else { scaled },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn display_and_parse() {
        assert_eq!("42", format!("{}", Decimal::from(42u64)));
        assert_eq!("45.25", format!("{}", d("45.25")));
        assert_eq!("-0.5", format!("{}", d("-.5")));
        assert_eq!(d("0.000000001"), Decimal::unit(9));
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!("0.0000000000001".parse::<Decimal>().is_err());
    }

    #[test]
    fn arithmetic_is_exact() {
        let mut x = Decimal::from(42u64);
        x += Decimal::ONE;
        assert_eq!(x, d("43"));
        x -= d("0.5");
        assert_eq!(x, d("42.5"));
        let sum: Decimal = [d("1.25"), d("2.5")].iter().sum();
        assert_eq!(sum, d("3.75"));
        assert_eq!(d("0.25").times(8), d("2"));
    }

    #[test]
    fn rounding_directions() {
        let third = Decimal::ONE.checked_div(d("3"), 9, Rounding::Down).unwrap();
        assert_eq!(third, d("0.333333333"));
        let third_up = Decimal::ONE.checked_div(d("3"), 9, Rounding::Up).unwrap();
        assert_eq!(third_up, d("0.333333334"));
        let two_thirds = d("2").checked_div(d("3"), 9, Rounding::HalfUp).unwrap();
        assert_eq!(two_thirds, d("0.666666667"));
        assert_eq!(d("0.125").round(2, Rounding::HalfUp), d("0.13"));
        assert_eq!(d("0.125").round(2, Rounding::Down), d("0.12"));
        assert_eq!(d("0.121").round(2, Rounding::Up), d("0.13"));
        assert_eq!(d("-0.121").round(2, Rounding::Up), d("-0.13"));
        assert_eq!(Decimal::ONE.checked_div(Decimal::ZERO, 9, Rounding::Up), None);
    }

    #[test]
    fn multiply_then_round() {
        // 0.444444444 * 0.5 = 0.222222222 exactly
        assert_eq!(
            d("0.444444444").mul(d("0.5"), 9, Rounding::HalfUp),
            d("0.222222222")
        );
        // 0.333333333 * 0.5 = 0.1666666665, halves go up
        assert_eq!(
            d("0.333333333").mul(d("0.5"), 9, Rounding::HalfUp),
            d("0.166666667")
        );
        assert_eq!(
            Decimal::ONE
                .checked_mul_div(d("33.333333334"), d("60"), 9, Rounding::Up)
                .unwrap(),
            d("0.555555556")
        );
    }
}
