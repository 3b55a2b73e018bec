// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CPU and memory accounting on top of Kubernetes resource quantities.

use crate::types::error::{Error, InvalidQuantitySnafu, QuantityOverflowSnafu};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;
use snafu::OptionExt;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use tracing::warn;

pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";

/// CPU in millicores and memory in bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub cpu_millis: i64,
    pub memory_bytes: i64,
}

impl Resources {
    pub const fn new(cpu_millis: i64, memory_bytes: i64) -> Self {
        Self {
            cpu_millis,
            memory_bytes,
        }
    }

    /// Reads the `cpu` and `memory` entries of a resource list
    /// (requests, limits or allocatable). Missing entries count as zero.
    pub fn from_list(list: Option<&BTreeMap<String, Quantity>>) -> Self {
        let Some(list) = list else {
            return Self::default();
        };

        Self {
            cpu_millis: list
                .get(CPU)
                .map(|q| quantity_or_zero(q, cpu_millis))
                .unwrap_or_default(),
            memory_bytes: list
                .get(MEMORY)
                .map(|q| quantity_or_zero(q, bytes))
                .unwrap_or_default(),
        }
    }

    /// Headroom is required: a request equal to the capacity does not fit.
    pub fn fits_within(&self, capacity: &Resources) -> bool {
        self.cpu_millis < capacity.cpu_millis && self.memory_bytes < capacity.memory_bytes
    }
}

impl Add for Resources {
    type Output = Resources;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            cpu_millis: self.cpu_millis.saturating_add(rhs.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_add(rhs.memory_bytes),
        }
    }
}

impl AddAssign for Resources {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Resources {
    type Output = Resources;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            cpu_millis: self.cpu_millis.saturating_sub(rhs.cpu_millis),
            memory_bytes: self.memory_bytes.saturating_sub(rhs.memory_bytes),
        }
    }
}

impl Sum for Resources {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Resources::default(), Add::add)
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu={}m memory={}", self.cpu_millis, self.memory_bytes)
    }
}

fn quantity_or_zero(quantity: &Quantity, parse: fn(&Quantity) -> Result<i64, Error>) -> i64 {
    parse(quantity).unwrap_or_else(|e| {
        warn!("ignoring unparsable quantity: {}", e);
        0
    })
}

/// Parses a CPU quantity into millicores, rounding up.
pub fn cpu_millis(quantity: &Quantity) -> Result<i64, Error> {
    parse_scaled(&quantity.0, 1000)
}

/// Parses a memory quantity into bytes, rounding up.
pub fn bytes(quantity: &Quantity) -> Result<i64, Error> {
    parse_scaled(&quantity.0, 1)
}

// (base, exponent) for each suffix of the Kubernetes quantity grammar.
fn suffix_multiplier(suffix: &str) -> Option<(i128, i32)> {
    Some(match suffix {
        "" => (10, 0),
        "n" => (10, -9),
        "u" => (10, -6),
        "m" => (10, -3),
        "k" => (10, 3),
        "M" => (10, 6),
        "G" => (10, 9),
        "T" => (10, 12),
        "P" => (10, 15),
        "E" => (10, 18),
        "Ki" => (2, 10),
        "Mi" => (2, 20),
        "Gi" => (2, 30),
        "Ti" => (2, 40),
        "Pi" => (2, 50),
        "Ei" => (2, 60),
        _ => return None,
    })
}

fn parse_scaled(value: &str, scale: i128) -> Result<i64, Error> {
    let invalid = |reason: &str| {
        InvalidQuantitySnafu {
            value,
            reason: reason.to_string(),
        }
        .build()
    };
    let overflow = || QuantityOverflowSnafu { value }.build();

    let trimmed = value.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        Some(_) => (false, trimmed),
        None => return Err(invalid("empty quantity")),
    };

    let number_end = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, rest) = unsigned.split_at(number_end);

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("missing digits"));
    }
    if fraction.contains('.') {
        return Err(invalid("more than one decimal point"));
    }

    // "1E" is exa, "1E3" is an exponent.
    let (base, exponent) = match (suffix_multiplier(rest), rest.strip_prefix(['e', 'E'])) {
        (Some(multiplier), _) => multiplier,
        (None, Some(exp)) => (
            10,
            exp.parse::<i32>()
                .map_err(|_| invalid("malformed exponent"))?,
        ),
        (None, None) => return Err(invalid("unknown suffix")),
    };

    let mut numerator: i128 = 0;
    for digit in whole.bytes().chain(fraction.bytes()) {
        numerator = numerator
            .checked_mul(10)
            .and_then(|n| n.checked_add(i128::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }
    numerator = numerator.checked_mul(scale).ok_or_else(overflow)?;

    let fraction_digits = u32::try_from(fraction.len()).map_err(|_| overflow())?;
    let mut denominator: i128 = 10i128.checked_pow(fraction_digits).ok_or_else(overflow)?;

    let power = base
        .checked_pow(exponent.unsigned_abs())
        .ok_or_else(overflow)?;
    if exponent >= 0 {
        numerator = numerator.checked_mul(power).ok_or_else(overflow)?;
    } else {
        denominator = denominator.checked_mul(power).ok_or_else(overflow)?;
    }

    let mut scaled = numerator / denominator;
    if numerator % denominator != 0 && !negative {
        scaled += 1;
    }
    if negative {
        scaled = -scaled;
    }

    i64::try_from(scaled).ok().context(QuantityOverflowSnafu { value })
}
