//! # Elementwise Kernels
//!
//! Pure `f64 -> f64` transforms addressed by name so that a worker process
//! can rebuild the same transform from its command line.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Failure of a single element
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("{kernel} is undefined for input {value} at index {index}")]
    Domain {
        kernel: String,
        index: usize,
        value: f64,
    },

    #[error("unknown kernel '{0}'")]
    Unknown(String),

    #[error("invalid parameter for kernel '{kernel}': {message}")]
    Parameter { kernel: String, message: String },
}

/// A named elementwise transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    Identity,
    Square,
    /// Multiply by a constant
    Scale(f64),
    /// Square root, NaN for negative inputs
    Sqrt,
    /// Square root that rejects negative and NaN inputs
    CheckedSqrt,
    /// `sin(x)^2 + cos(x)^2`: 1 up to rounding, expensive on purpose
    SinCosIdentity,
}

impl Kernel {
    /// Apply to one element. `index` is only used to label failures.
    #[inline]
    pub fn apply(&self, index: usize, x: f64) -> Result<f64, KernelError> {
        match *self {
            Kernel::Identity => Ok(x),
            Kernel::Square => Ok(x * x),
            Kernel::Scale(k) => Ok(k * x),
            Kernel::Sqrt => Ok(x.sqrt()),
            Kernel::CheckedSqrt => {
                if x >= 0.0 {
                    Ok(x.sqrt())
                } else {
                    Err(KernelError::Domain {
                        kernel: self.to_string(),
                        index,
                        value: x,
                    })
                }
            }
            Kernel::SinCosIdentity => {
                let (s, c) = x.sin_cos();
                Ok(s * s + c * c)
            }
        }
    }

    /// Apply to a chunk, labelling failures with `offset + local index`
    pub fn apply_slice(&self, offset: usize, input: &[f64]) -> Result<Vec<f64>, KernelError> {
        input
            .iter()
            .enumerate()
            .map(|(i, &x)| self.apply(offset + i, x))
            .collect()
    }

    /// Overwrite `data` with the transformed values
    ///
    /// Stops at the first failing element; earlier elements are already
    /// transformed.
    pub fn apply_in_place(&self, offset: usize, data: &mut [f64]) -> Result<(), KernelError> {
        for (i, x) in data.iter_mut().enumerate() {
            *x = self.apply(offset + i, *x)?;
        }
        Ok(())
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Identity => write!(f, "identity"),
            Kernel::Square => write!(f, "square"),
            Kernel::Scale(k) => write!(f, "scale={}", k),
            Kernel::Sqrt => write!(f, "sqrt"),
            Kernel::CheckedSqrt => write!(f, "checked-sqrt"),
            Kernel::SinCosIdentity => write!(f, "sin-cos-identity"),
        }
    }
}

impl FromStr for Kernel {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(factor) = s.strip_prefix("scale=") {
            let k: f64 = factor.parse().map_err(|e| KernelError::Parameter {
                kernel: "scale".to_string(),
                message: format!("{}: {}", factor, e),
            })?;
            return Ok(Kernel::Scale(k));
        }
        match s {
            "identity" => Ok(Kernel::Identity),
            "square" => Ok(Kernel::Square),
            "sqrt" => Ok(Kernel::Sqrt),
            "checked-sqrt" => Ok(Kernel::CheckedSqrt),
            "sin-cos-identity" => Ok(Kernel::SinCosIdentity),
            other => Err(KernelError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_slice() {
        let input: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let out = Kernel::Square.apply_slice(0, &input).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 4.0, 9.0, 16.0, 25.0, 36.0, 49.0, 64.0, 81.0]);
    }

    #[test]
    fn test_sin_cos_identity_is_one() {
        for x in [0.0, 0.3, 1.7, -12.5, 1e6] {
            let y = Kernel::SinCosIdentity.apply(0, x).unwrap();
            assert!((y - 1.0).abs() < 1e-12, "x={} gave {}", x, y);
        }
    }

    #[test]
    fn test_checked_sqrt_reports_global_index() {
        let err = Kernel::CheckedSqrt
            .apply_slice(100, &[4.0, 9.0, -1.0, 16.0])
            .unwrap_err();
        assert_eq!(
            err,
            KernelError::Domain {
                kernel: "checked-sqrt".to_string(),
                index: 102,
                value: -1.0,
            }
        );
    }

    #[test]
    fn test_checked_sqrt_rejects_nan() {
        assert!(Kernel::CheckedSqrt.apply(0, f64::NAN).is_err());
        assert!(Kernel::Sqrt.apply(0, -4.0).unwrap().is_nan());
    }

    #[test]
    fn test_in_place() {
        let mut data = vec![1.0, 2.0, 3.0];
        Kernel::Scale(2.0).apply_in_place(0, &mut data).unwrap();
        assert_eq!(data, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_names_parse_back() {
        for kernel in [
            Kernel::Identity,
            Kernel::Square,
            Kernel::Scale(2.5),
            Kernel::Sqrt,
            Kernel::CheckedSqrt,
            Kernel::SinCosIdentity,
        ] {
            assert_eq!(kernel.to_string().parse::<Kernel>().unwrap(), kernel);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("cube".parse::<Kernel>(), Err(KernelError::Unknown(_))));
        assert!(matches!(
            "scale=abc".parse::<Kernel>(),
            Err(KernelError::Parameter { .. })
        ));
    }
}
