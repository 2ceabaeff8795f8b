//! Fixed-point decimal support.
//!
//! Values cross the field API as [`rust_decimal::Decimal`]. Internally the
//! binary codec works on [`DecimalDigits`], a sign plus integer/fraction digit
//! vectors, so columns with a precision above what `Decimal` can hold (up to 65
//! digits) still encode and decode exactly. Errors use the [`DecimalError`]
//! bitmask from the status module.
//!
//! # Binary layout
//!
//! Digits are grouped in nines, each full group stored in 4 big-endian bytes.
//! Leftover digits at the integer head and fraction tail use
//! `DIG2BYTES[n]` bytes. Negative values have every byte inverted, and the
//! first byte's high bit is flipped last, so the image sorts with `memcmp`.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::field::status::DecimalError;

const DIG_PER_DEC1: usize = 9;
const DIG2BYTES: [usize; 10] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];
/// Longest integer part accepted from text before reporting overflow.
const MAX_INT_DIGITS: usize = 81;
/// Significant digits `rust_decimal` carries.
const DECIMAL_VALUE_DIGITS: usize = 28;

/// Bytes used by the binary form of a DECIMAL(precision, scale).
pub fn bin_size(precision: u8, scale: u8) -> usize {
    let intg = (precision - scale) as usize;
    let scale = scale as usize;
    let intg0 = intg / DIG_PER_DEC1;
    let frac0 = scale / DIG_PER_DEC1;
    let intg0x = intg - intg0 * DIG_PER_DEC1;
    let frac0x = scale - frac0 * DIG_PER_DEC1;
    intg0 * 4 + DIG2BYTES[intg0x] + frac0 * 4 + DIG2BYTES[frac0x]
}

/// Display width of a DECIMAL(precision, scale) column.
pub fn precision_to_length(precision: u8, scale: u8, unsigned: bool) -> u32 {
    let mut len = precision as u32;
    if scale > 0 {
        len += 1;
    }
    if !unsigned {
        len += 1;
    }
    len
}

/// Sign and decimal digits of a fixed-point value.
///
/// `int` never has leading zeros; `frac` may carry trailing zeros.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecimalDigits {
    pub negative: bool,
    pub int: Vec<u8>,
    pub frac: Vec<u8>,
}

/// Outcome of parsing decimal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDecimal {
    pub value: DecimalDigits,
    pub error: DecimalError,
    /// Bytes consumed by the number itself.
    pub end: usize,
}

impl DecimalDigits {
    pub fn zero() -> Self {
        DecimalDigits::default()
    }

    pub fn is_zero(&self) -> bool {
        self.int.iter().all(|&d| d == 0) && self.frac.iter().all(|&d| d == 0)
    }

    fn normalize(mut self) -> Self {
        let lead = self.int.iter().take_while(|&&d| d == 0).count();
        self.int.drain(..lead);
        if self.is_zero() {
            self.negative = false;
        }
        self
    }

    /// Parse decimal text such as `-12.50`, `1e3` or `  7.25  `.
    ///
    /// Text without any digits is `BAD_NUM`; non-space trailing bytes are
    /// `TRUNCATED`; an integer part wider than 81 digits is `OVERFLOW`.
    pub fn parse(text: &[u8]) -> ParsedDecimal {
        let mut pos = 0;
        while pos < text.len() && text[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let mut negative = false;
        if pos < text.len() && (text[pos] == b'-' || text[pos] == b'+') {
            negative = text[pos] == b'-';
            pos += 1;
        }
        let mut int = Vec::new();
        let mut frac = Vec::new();
        while pos < text.len() && text[pos].is_ascii_digit() {
            int.push(text[pos] - b'0');
            pos += 1;
        }
        if pos < text.len() && text[pos] == b'.' {
            let save = pos;
            pos += 1;
            while pos < text.len() && text[pos].is_ascii_digit() {
                frac.push(text[pos] - b'0');
                pos += 1;
            }
            if int.is_empty() && frac.is_empty() {
                pos = save;
            }
        }
        if int.is_empty() && frac.is_empty() {
            return ParsedDecimal {
                value: DecimalDigits::zero(),
                error: DecimalError::BAD_NUM,
                end: 0,
            };
        }

        // Optional exponent.
        if pos < text.len() && (text[pos] == b'e' || text[pos] == b'E') {
            let mut p = pos + 1;
            let mut exp_neg = false;
            if p < text.len() && (text[p] == b'-' || text[p] == b'+') {
                exp_neg = text[p] == b'-';
                p += 1;
            }
            let start = p;
            let mut exp: i64 = 0;
            while p < text.len() && text[p].is_ascii_digit() {
                exp = (exp * 10 + (text[p] - b'0') as i64).min(10_000);
                p += 1;
            }
            if p > start {
                pos = p;
                let shift = if exp_neg { -exp } else { exp };
                shift_digits(&mut int, &mut frac, shift);
            }
        }

        let mut error = DecimalError::OK;
        let mut value = DecimalDigits { negative, int, frac }.normalize();
        if value.int.len() > MAX_INT_DIGITS {
            value = DecimalDigits::max_value(MAX_INT_DIGITS as u8, 0, value.negative);
            error |= DecimalError::OVERFLOW;
        }
        if text[pos..].iter().any(|b| !b.is_ascii_whitespace()) {
            error |= DecimalError::TRUNCATED;
        }
        ParsedDecimal { value, error, end: pos }
    }

    /// Largest magnitude representable with `precision` digits, `scale` of them
    /// fractional.
    pub fn max_value(precision: u8, scale: u8, negative: bool) -> Self {
        let intg = (precision.saturating_sub(scale)) as usize;
        DecimalDigits {
            negative,
            int: vec![9; intg],
            frac: vec![9; scale as usize],
        }
        .normalize()
    }

    pub fn from_decimal(value: &Decimal) -> Self {
        DecimalDigits::parse(value.to_string().as_bytes()).value
    }

    pub fn from_i64(value: i64) -> Self {
        DecimalDigits::parse(value.to_string().as_bytes()).value
    }

    pub fn from_u64(value: u64) -> Self {
        DecimalDigits::parse(value.to_string().as_bytes()).value
    }

    /// Exact decimal expansion of a double's shortest representation.
    pub fn from_f64(value: f64) -> (Self, DecimalError) {
        if !value.is_finite() {
            return (DecimalDigits::zero(), DecimalError::OVERFLOW);
        }
        let parsed = DecimalDigits::parse(format!("{}", value).as_bytes());
        (parsed.value, parsed.error)
    }

    /// Round half away from zero to `scale` fractional digits.
    ///
    /// Returns the rounded value and whether any non-zero digit was dropped.
    pub fn round_to(&self, scale: usize) -> (Self, bool) {
        if self.frac.len() <= scale {
            return (self.clone(), false);
        }
        let dropped = self.frac[scale..].iter().any(|&d| d != 0);
        let round_up = self.frac[scale] >= 5;
        let mut int = self.int.clone();
        let mut frac = self.frac[..scale].to_vec();
        if round_up {
            let mut carry = true;
            for d in frac.iter_mut().rev() {
                if *d == 9 {
                    *d = 0;
                } else {
                    *d += 1;
                    carry = false;
                    break;
                }
            }
            if carry {
                for d in int.iter_mut().rev() {
                    if *d == 9 {
                        *d = 0;
                    } else {
                        *d += 1;
                        carry = false;
                        break;
                    }
                }
                if carry {
                    int.insert(0, 1);
                }
            }
        }
        let rounded = DecimalDigits {
            negative: self.negative,
            int,
            frac,
        }
        .normalize();
        (rounded, dropped)
    }

    /// Plain text with exactly `scale` fractional digits.
    pub fn to_text(&self, scale: usize) -> String {
        let (v, _) = self.round_to(scale);
        let mut s = String::new();
        if v.negative {
            s.push('-');
        }
        if v.int.is_empty() {
            s.push('0');
        } else {
            s.extend(v.int.iter().map(|d| (b'0' + d) as char));
        }
        if scale > 0 {
            s.push('.');
            for i in 0..scale {
                let d = v.frac.get(i).copied().unwrap_or(0);
                s.push((b'0' + d) as char);
            }
        }
        s
    }

    /// Convert to `Decimal`, rounding away digits it cannot carry and
    /// saturating integer parts that do not fit.
    pub fn to_decimal(&self) -> Decimal {
        if self.int.len() > DECIMAL_VALUE_DIGITS {
            return if self.negative { Decimal::MIN } else { Decimal::MAX };
        }
        let mut keep = (DECIMAL_VALUE_DIGITS - self.int.len()).min(self.frac.len());
        loop {
            let text = self.to_text(keep);
            match Decimal::from_str(&text) {
                Ok(d) => return d,
                Err(_) if keep > 0 => keep -= 1,
                Err(_) => {
                    return if self.negative { Decimal::MIN } else { Decimal::MAX };
                }
            }
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.to_text(self.frac.len()).parse::<f64>().unwrap_or(0.0)
    }

    /// Round to an integer (half away from zero) and clamp into the target range.
    pub fn to_i64(&self, unsigned: bool) -> (i64, DecimalError) {
        let (v, truncated) = self.round_to(0);
        let mut error = if truncated { DecimalError::TRUNCATED } else { DecimalError::OK };
        let mut acc: i128 = 0;
        for &d in &v.int {
            acc = acc * 10 + d as i128;
            if acc > u64::MAX as i128 {
                break;
            }
        }
        if v.negative {
            acc = -acc;
        }
        let (lo, hi) = if unsigned {
            (0i128, u64::MAX as i128)
        } else {
            (i64::MIN as i128, i64::MAX as i128)
        };
        if acc < lo {
            acc = lo;
            error |= DecimalError::OVERFLOW;
        } else if acc > hi {
            acc = hi;
            error |= DecimalError::OVERFLOW;
        }
        let out = if unsigned { acc as u64 as i64 } else { acc as i64 };
        (out, error)
    }

    /// Integer part and fractional nanoseconds, for temporal conversion.
    pub fn split_nanos(&self) -> (i64, u32) {
        let (int_val, _) = DecimalDigits {
            negative: false,
            int: self.int.clone(),
            frac: Vec::new(),
        }
        .to_i64(false);
        let mut nanos: u32 = 0;
        for i in 0..9 {
            nanos = nanos * 10 + self.frac.get(i).copied().unwrap_or(0) as u32;
        }
        (if self.negative { -int_val } else { int_val }, nanos)
    }
}

fn shift_digits(int: &mut Vec<u8>, frac: &mut Vec<u8>, shift: i64) {
    if shift > 0 {
        let n = shift as usize;
        for i in 0..n {
            int.push(frac.get(i).copied().unwrap_or(0));
        }
        if frac.len() > n {
            frac.drain(..n);
        } else {
            frac.clear();
        }
    } else if shift < 0 {
        let n = (-shift) as usize;
        let mut moved: Vec<u8> = Vec::with_capacity(n + frac.len());
        if int.len() < n {
            moved.extend(std::iter::repeat(0).take(n - int.len()));
            moved.extend(int.drain(..));
        } else {
            let split = int.len() - n;
            moved.extend(int.drain(split..));
        }
        moved.extend(frac.drain(..));
        *frac = moved;
    }
}

fn digits_value(digits: &[u8]) -> u32 {
    digits.iter().fold(0u32, |acc, &d| acc * 10 + d as u32)
}

/// Encode `value` as DECIMAL(precision, scale) into `out` (`bin_size` bytes).
///
/// Rounding away fractional digits reports `TRUNCATED`. An integer part wider
/// than `precision - scale` reports `OVERFLOW` and leaves `out` untouched.
pub fn decimal2bin(value: &DecimalDigits, precision: u8, scale: u8, out: &mut [u8]) -> DecimalError {
    let intg = (precision - scale) as usize;
    let scale_u = scale as usize;
    let (v, truncated) = value.round_to(scale_u);
    if v.int.len() > intg {
        return DecimalError::OVERFLOW;
    }
    let mut error = if truncated { DecimalError::TRUNCATED } else { DecimalError::OK };

    let mut int_digits = vec![0u8; intg - v.int.len()];
    int_digits.extend_from_slice(&v.int);
    let mut frac_digits = v.frac.clone();
    frac_digits.resize(scale_u, 0);

    let intg0x = intg % DIG_PER_DEC1;
    let frac0x = scale_u % DIG_PER_DEC1;
    let size = bin_size(precision, scale);
    if out.len() < size {
        return DecimalError::OOM;
    }
    let mut pos = 0;
    let mut put = |digits: &[u8], bytes: usize, out: &mut [u8]| {
        let val = digits_value(digits) as u64;
        for i in 0..bytes {
            out[pos + i] = (val >> (8 * (bytes - 1 - i))) as u8;
        }
        pos += bytes;
    };
    put(&int_digits[..intg0x], DIG2BYTES[intg0x], out);
    for chunk in int_digits[intg0x..].chunks(DIG_PER_DEC1) {
        put(chunk, 4, out);
    }
    let full_frac = scale_u - frac0x;
    for chunk in frac_digits[..full_frac].chunks(DIG_PER_DEC1) {
        put(chunk, 4, out);
    }
    put(&frac_digits[full_frac..], DIG2BYTES[frac0x], out);

    if v.negative {
        for b in out[..size].iter_mut() {
            *b ^= 0xFF;
        }
    }
    if size > 0 {
        out[0] ^= 0x80;
    } else {
        error |= DecimalError::OVERFLOW;
    }
    error
}

fn group_digits(val: u32, count: usize) -> Vec<u8> {
    let mut digits = vec![0u8; count];
    let mut v = val;
    for slot in digits.iter_mut().rev() {
        *slot = (v % 10) as u8;
        v /= 10;
    }
    digits
}

/// Decode a DECIMAL(precision, scale) binary image.
pub fn bin2decimal(bin: &[u8], precision: u8, scale: u8) -> DecimalDigits {
    let size = bin_size(precision, scale);
    if bin.len() < size || size == 0 {
        return DecimalDigits::zero();
    }
    let mut buf = bin[..size].to_vec();
    let negative = buf[0] & 0x80 == 0;
    buf[0] ^= 0x80;
    if negative {
        for b in buf.iter_mut() {
            *b ^= 0xFF;
        }
    }
    let intg = (precision - scale) as usize;
    let scale_u = scale as usize;
    let intg0x = intg % DIG_PER_DEC1;
    let frac0x = scale_u % DIG_PER_DEC1;

    let mut pos = 0;
    let mut take = |bytes: usize| -> u32 {
        let mut v: u32 = 0;
        for i in 0..bytes {
            v = (v << 8) | buf[pos + i] as u32;
        }
        pos += bytes;
        v
    };
    let mut int = Vec::with_capacity(intg);
    int.extend(group_digits(take(DIG2BYTES[intg0x]), intg0x));
    for _ in 0..intg / DIG_PER_DEC1 {
        int.extend(group_digits(take(4), DIG_PER_DEC1));
    }
    let mut frac = Vec::with_capacity(scale_u);
    for _ in 0..scale_u / DIG_PER_DEC1 {
        frac.extend(group_digits(take(4), DIG_PER_DEC1));
    }
    frac.extend(group_digits(take(DIG2BYTES[frac0x]), frac0x));
    DecimalDigits { negative, int, frac }.normalize()
}

/// Round a `Decimal` half away from zero to `scale` digits.
pub fn round_decimal(value: &Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Decimal to double, zero when out of range.
pub fn decimal_to_f64(value: &Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits(s: &str) -> DecimalDigits {
        DecimalDigits::parse(s.as_bytes()).value
    }

    #[test]
    fn test_bin_size() {
        assert_eq!(bin_size(5, 2), 3);
        assert_eq!(bin_size(10, 2), 5);
        assert_eq!(bin_size(18, 9), 8);
        assert_eq!(bin_size(65, 30), 30);
        assert_eq!(bin_size(1, 0), 1);
    }

    #[test]
    fn test_parse() {
        let p = DecimalDigits::parse(b"  -0012.340 ");
        assert_eq!(p.error, DecimalError::OK);
        assert_eq!(p.value.to_text(3), "-12.340");
        let p = DecimalDigits::parse(b"1.5e2");
        assert_eq!(p.value.to_text(0), "150");
        let p = DecimalDigits::parse(b"25e-3");
        assert_eq!(p.value.to_text(3), "0.025");
        let p = DecimalDigits::parse(b"12abc");
        assert!(p.error.contains(DecimalError::TRUNCATED));
        assert_eq!(p.end, 2);
        let p = DecimalDigits::parse(b"abc");
        assert!(p.error.contains(DecimalError::BAD_NUM));
        let p = DecimalDigits::parse(b"-0.000");
        assert!(!p.value.negative);
    }

    #[test]
    fn test_round_to_carries() {
        let (v, dropped) = digits("9.995").round_to(2);
        assert!(dropped);
        assert_eq!(v.to_text(2), "10.00");
        let (v, dropped) = digits("1.20").round_to(1);
        assert!(!dropped);
        assert_eq!(v.to_text(1), "1.2");
        let (v, _) = digits("-2.5").round_to(0);
        assert_eq!(v.to_text(0), "-3");
    }

    #[test]
    fn test_bin_encoding_known_image() {
        // 1234567890.1234 as DECIMAL(14,4): 1 leading digit, one full group,
        // 4 fractional digits.
        let mut out = vec![0u8; bin_size(14, 4)];
        let err = decimal2bin(&digits("1234567890.1234"), 14, 4, &mut out);
        assert!(err.is_ok());
        assert_eq!(out, vec![0x81, 0x0D, 0xFB, 0x38, 0xD2, 0x04, 0xD2]);
        let back = bin2decimal(&out, 14, 4);
        assert_eq!(back.to_text(4), "1234567890.1234");
    }

    #[test]
    fn test_bin_negative_and_order() {
        let mut a = vec![0u8; bin_size(5, 2)];
        let mut b = vec![0u8; bin_size(5, 2)];
        let mut c = vec![0u8; bin_size(5, 2)];
        decimal2bin(&digits("-1.50"), 5, 2, &mut a);
        decimal2bin(&digits("0"), 5, 2, &mut b);
        decimal2bin(&digits("1.25"), 5, 2, &mut c);
        assert!(a < b && b < c);
        assert_eq!(bin2decimal(&a, 5, 2).to_text(2), "-1.50");
    }

    #[test]
    fn test_overflow_leaves_output() {
        let mut out = vec![0xAAu8; bin_size(5, 2)];
        let err = decimal2bin(&digits("99999.999"), 5, 2, &mut out);
        assert!(err.contains(DecimalError::OVERFLOW));
        assert_eq!(out, vec![0xAA; 3]);
    }

    #[test]
    fn test_wide_precision_round_trip() {
        let text = "12345678901234567890123456789012345.123456789012345678901234567890";
        let mut out = vec![0u8; bin_size(65, 30)];
        assert!(decimal2bin(&digits(text), 65, 30, &mut out).is_ok());
        assert_eq!(bin2decimal(&out, 65, 30).to_text(30), text);
    }

    #[test]
    fn test_to_i64_and_decimal() {
        assert_eq!(digits("2.5").to_i64(false), (3, DecimalError::TRUNCATED));
        let (v, e) = digits("-5").to_i64(true);
        assert_eq!(v, 0);
        assert!(e.contains(DecimalError::OVERFLOW));
        assert_eq!(digits("12.5").to_decimal(), Decimal::new(125, 1));
        assert_eq!(digits("1e40").to_decimal(), Decimal::MAX);
    }

    #[test]
    fn test_from_f64() {
        let (v, e) = DecimalDigits::from_f64(0.1);
        assert!(e.is_ok());
        assert_eq!(v.to_text(1), "0.1");
        let (_, e) = DecimalDigits::from_f64(f64::INFINITY);
        assert!(e.contains(DecimalError::OVERFLOW));
    }
}
