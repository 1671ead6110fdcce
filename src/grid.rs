use itertools::Itertools;
use std::fmt;
use std::str::FromStr;

/// Parameter holding either a single value, an explicit set of values
/// or an arithmetic range.
///
/// Accepted forms are a plain value (`0.5`), a set (`{1, 2, 5}`) and a
/// range with an optional step (`[1:100]`, `[0:1:0.25]`). Ranges are
/// inclusive on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueGrid<T> {
    values: Vec<T>,
}

impl<T> ValueGrid<T> {
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_multivalued(&self) -> bool {
        self.values.len() > 1
    }
}

impl<T: GridValue> From<T> for ValueGrid<T> {
    fn from(value: T) -> Self {
        ValueGrid { values: vec![value] }
    }
}

/// Value types that can populate a [`ValueGrid`] range.
pub trait GridValue: Copy + PartialOrd + FromStr + fmt::Display {
    const UNIT: Self;

    fn step_by(self, step: Self) -> Self;

    /// Tolerance used when closing a range, so that floating-point
    /// accumulation does not drop the upper bound.
    fn tolerance(step: Self) -> Self;
}

impl GridValue for u32 {
    const UNIT: Self = 1;

    fn step_by(self, step: Self) -> Self {
        self + step
    }

    fn tolerance(_step: Self) -> Self {
        0
    }
}

impl GridValue for usize {
    const UNIT: Self = 1;

    fn step_by(self, step: Self) -> Self {
        self + step
    }

    fn tolerance(_step: Self) -> Self {
        0
    }
}

impl GridValue for f64 {
    const UNIT: Self = 1.;

    fn step_by(self, step: Self) -> Self {
        self + step
    }

    fn tolerance(step: Self) -> Self {
        step * 1e-9
    }
}

fn parse_value<T: GridValue>(text: &str) -> Result<T, String> {
    text.trim()
        .parse::<T>()
        .map_err(|_| format!("invalid value `{}`", text.trim()))
}

impl<T: GridValue> FromStr for ValueGrid<T> {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();

        if let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
            let values = inner
                .split(',')
                .map(parse_value)
                .collect::<Result<Vec<T>, _>>()?;

            if values.is_empty() {
                return Err("empty value set".to_owned());
            }

            return Ok(ValueGrid { values });
        }

        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            let parts: Vec<&str> = inner.split(':').collect();

            let (min, max, step) = match parts.as_slice() {
                [min, max] => (parse_value(min)?, parse_value::<T>(max)?, T::UNIT),
                [min, max, step] => {
                    (parse_value(min)?, parse_value(max)?, parse_value(step)?)
                }
                _ => {
                    return Err(format!(
                        "invalid range `{}`, expected [min:max] or [min:max:step]",
                        text
                    ))
                }
            };

            let mut values = Vec::new();
            let mut current: T = min;
            let bound = max.step_by(T::tolerance(step));

            while current <= bound {
                values.push(current);
                let next = current.step_by(step);
                if !(current < next) {
                    return Err(format!("invalid step in range `{}`", text));
                }
                current = next;
            }

            if values.is_empty() {
                return Err(format!("empty range `{}`", text));
            }

            return Ok(ValueGrid { values });
        }

        Ok(ValueGrid { values: vec![parse_value(text)?] })
    }
}

impl<T: GridValue> fmt::Display for ValueGrid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.len() == 1 {
            write!(f, "{}", self.values[0])
        } else {
            write!(f, "{{{}}}", self.values.iter().join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_values() {
        let grid: ValueGrid<u32> = "5".parse().unwrap();
        assert_eq!(grid.values(), &[5]);
        assert!(!grid.is_multivalued());

        let grid: ValueGrid<f64> = "0.25".parse().unwrap();
        assert_eq!(grid.values(), &[0.25]);
    }

    #[test]
    fn parses_sets() {
        let grid: ValueGrid<u32> = "{1, 2, 5}".parse().unwrap();
        assert_eq!(grid.values(), &[1, 2, 5]);
        assert!(grid.is_multivalued());

        let grid: ValueGrid<f64> = "{0.1,0.9}".parse().unwrap();
        assert_eq!(grid.values(), &[0.1, 0.9]);
    }

    #[test]
    fn parses_ranges() {
        let grid: ValueGrid<u32> = "[1:5]".parse().unwrap();
        assert_eq!(grid.values(), &[1, 2, 3, 4, 5]);

        let grid: ValueGrid<u32> = "[1:10:3]".parse().unwrap();
        assert_eq!(grid.values(), &[1, 4, 7, 10]);

        let grid: ValueGrid<f64> = "[0:1:0.25]".parse().unwrap();
        assert_eq!(grid.values(), &[0., 0.25, 0.5, 0.75, 1.]);
    }

    #[test]
    fn range_includes_upper_bound_despite_drift() {
        let grid: ValueGrid<f64> = "[0.1:0.5:0.1]".parse().unwrap();
        assert_eq!(grid.len(), 5);
        assert!((grid.values()[4] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rejects_invalid_input() {
        assert!("".parse::<ValueGrid<u32>>().is_err());
        assert!("{}".parse::<ValueGrid<u32>>().is_err());
        assert!("{1, x}".parse::<ValueGrid<u32>>().is_err());
        assert!("[1:2:3:4]".parse::<ValueGrid<u32>>().is_err());
        assert!("[5:1]".parse::<ValueGrid<u32>>().is_err());
        assert!("[0:1:0]".parse::<ValueGrid<f64>>().is_err());
        assert!("abc".parse::<ValueGrid<u32>>().is_err());
    }

    #[test]
    fn displays_back() {
        let grid: ValueGrid<u32> = "{1,2}".parse().unwrap();
        assert_eq!(grid.to_string(), "{1, 2}");

        let grid: ValueGrid<u32> = "7".parse().unwrap();
        assert_eq!(grid.to_string(), "7");
    }
}
