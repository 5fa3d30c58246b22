//! Exact resource quantity arithmetic.
//!
//! CPU is held in millicores and memory/storage in bytes, both as integers.
//! Values are only converted to display units (mCPU, MiB, GiB) at the
//! formatting boundary, so sums never accumulate floating point error.

use std::fmt;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use tracing::warn;

use crate::error::QuantityError;

const MEBIBYTE: i128 = 1_048_576;
const GIBIBYTE: i128 = 1_073_741_824;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitClass {
    Cpu,
    Memory,
    Storage,
}

impl fmt::Display for UnitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitClass::Cpu => f.write_str("cpu"),
            UnitClass::Memory => f.write_str("memory"),
            UnitClass::Storage => f.write_str("storage"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUnit {
    Millicores,
    Cores,
    Mebibytes,
    Gibibytes,
}

impl DisplayUnit {
    fn divisor(self) -> i128 {
        match self {
            DisplayUnit::Millicores => 1,
            DisplayUnit::Cores => 1000,
            DisplayUnit::Mebibytes => MEBIBYTE,
            DisplayUnit::Gibibytes => GIBIBYTE,
        }
    }
}

/// A signed amount of one resource class, in millicores (CPU) or bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quantity {
    class: UnitClass,
    base: i128,
}

impl Quantity {
    pub const fn zero(class: UnitClass) -> Self {
        Self { class, base: 0 }
    }

    pub const fn millicores(value: i64) -> Self {
        Self {
            class: UnitClass::Cpu,
            base: value as i128,
        }
    }

    pub fn class(&self) -> UnitClass {
        self.class
    }

    /// Raw value in the class base unit (millicores or bytes).
    pub fn base_value(&self) -> i128 {
        self.base
    }

    pub fn is_zero(&self) -> bool {
        self.base == 0
    }

    pub fn parse(class: UnitClass, raw: &str) -> Result<Self, QuantityError> {
        let base = parse_base(class, raw)?;
        Ok(Self { class, base })
    }

    pub fn from_k8s(class: UnitClass, quantity: &K8sQuantity) -> Result<Self, QuantityError> {
        Self::parse(class, &quantity.0)
    }

    /// Parses an API-provided quantity, counting malformed values as zero.
    pub fn from_k8s_or_zero(class: UnitClass, quantity: &K8sQuantity) -> Self {
        Self::from_k8s(class, quantity).unwrap_or_else(|err| {
            warn!(%class, error = %err, "ignoring malformed quantity");
            Self::zero(class)
        })
    }

    pub fn add(self, other: Quantity) -> Result<Self, QuantityError> {
        self.same_class(&other)?;
        let base = self
            .base
            .checked_add(other.base)
            .ok_or_else(|| QuantityError::Overflow(format!("{} + {}", self.base, other.base)))?;
        Ok(Self {
            class: self.class,
            base,
        })
    }

    pub fn sub(self, other: Quantity) -> Result<Self, QuantityError> {
        self.same_class(&other)?;
        let base = self
            .base
            .checked_sub(other.base)
            .ok_or_else(|| QuantityError::Overflow(format!("{} - {}", self.base, other.base)))?;
        Ok(Self {
            class: self.class,
            base,
        })
    }

    /// Converts to a display unit. Pure: the stored value is never touched.
    pub fn scale_to(&self, unit: DisplayUnit) -> f64 {
        let divisor = unit.divisor();
        if divisor == 1 {
            return self.base as f64;
        }
        let whole = self.base / divisor;
        let rem = self.base % divisor;
        whole as f64 + rem as f64 / divisor as f64
    }

    /// Whole display units, truncating toward zero.
    pub fn whole(&self, unit: DisplayUnit) -> i64 {
        let value = self.base / unit.divisor();
        value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    fn same_class(&self, other: &Quantity) -> Result<(), QuantityError> {
        if self.class != other.class {
            return Err(QuantityError::UnitClassMismatch {
                left: self.class,
                right: other.class,
            });
        }
        Ok(())
    }
}

/// Sums quantities of one class. An empty input yields the class zero.
pub fn aggregate<I>(class: UnitClass, items: I) -> Result<Quantity, QuantityError>
where
    I: IntoIterator<Item = Quantity>,
{
    items
        .into_iter()
        .try_fold(Quantity::zero(class), |acc, q| acc.add(q))
}

/// `part / whole * 100`, defined as `0.0` when `whole` is zero.
pub fn percent_of(part: Quantity, whole: Quantity) -> Result<f64, QuantityError> {
    part.same_class(&whole)?;
    if whole.base == 0 {
        return Ok(0.0);
    }
    Ok(part.base as f64 / whole.base as f64 * 100.0)
}

fn parse_base(class: UnitClass, raw: &str) -> Result<i128, QuantityError> {
    let malformed = || QuantityError::Malformed(raw.to_string());
    let overflow = || QuantityError::Overflow(raw.to_string());

    let trimmed = raw.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        Some(_) => (false, trimmed),
        None => return Err(malformed()),
    };

    let number_end = body
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(body.len());
    let (number, suffix) = body.split_at(number_end);
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
        return Err(malformed());
    }

    let digits = format!("{int_part}{frac_part}");
    if digits.len() > 36 {
        return Err(overflow());
    }
    let mantissa: i128 = digits.parse().map_err(|_| malformed())?;

    let mut exp10 = -(frac_part.len() as i32);
    let mut binary_pow = 0u32;
    match suffix {
        "" => {}
        "n" => exp10 -= 9,
        "u" => exp10 -= 6,
        "m" => exp10 -= 3,
        "k" | "K" => exp10 += 3,
        "M" => exp10 += 6,
        "G" => exp10 += 9,
        "T" => exp10 += 12,
        "P" => exp10 += 15,
        "E" => exp10 += 18,
        "Ki" => binary_pow = 1,
        "Mi" => binary_pow = 2,
        "Gi" => binary_pow = 3,
        "Ti" => binary_pow = 4,
        "Pi" => binary_pow = 5,
        "Ei" => binary_pow = 6,
        s if s.len() > 1 && (s.starts_with('e') || s.starts_with('E')) => {
            let exp: i32 = s[1..].parse().map_err(|_| malformed())?;
            exp10 = exp10.checked_add(exp).ok_or_else(overflow)?;
        }
        _ => return Err(malformed()),
    }
    if class == UnitClass::Cpu {
        exp10 += 3;
    }

    let mut value = mantissa
        .checked_mul(1024i128.pow(binary_pow))
        .ok_or_else(overflow)?;
    if exp10 >= 0 {
        let factor = 10i128.checked_pow(exp10 as u32).ok_or_else(overflow)?;
        value = value.checked_mul(factor).ok_or_else(overflow)?;
    } else {
        // Fractions of a base unit round up to the next whole unit.
        value = match 10i128.checked_pow(exp10.unsigned_abs()) {
            Some(divisor) => value / divisor + i128::from(value % divisor != 0),
            None => i128::from(value != 0),
        };
    }

    Ok(if negative { -value } else { value })
}
