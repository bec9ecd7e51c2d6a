use std::path::Path;

use crate::error::{MedScreenError, Result};

/// Thresholds and levels must lie in `(0, 1]`.
pub fn check_probability(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(MedScreenError::InvalidArgument(format!(
            "Value of {name} should be in (0, 1], got {value}"
        )));
    }
    Ok(())
}

pub fn check_at_least(value: usize, min: usize, name: &str) -> Result<()> {
    if value < min {
        return Err(MedScreenError::InvalidArgument(format!(
            "Value of {name} should be at least {min}, got {value}"
        )));
    }
    Ok(())
}

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.is_file() {
        return Err(MedScreenError::MissingArtifact(format!(
            "{name} not found at {}",
            path.display()
        )));
    }
    Ok(())
}

/// 1-based index from the command line into a collection of `len` items.
pub fn check_index(index: usize, len: usize, name: &str) -> Result<usize> {
    if index == 0 || index > len {
        return Err(MedScreenError::InvalidArgument(format!(
            "{name} {index} is outside 1..={len}"
        )));
    }
    Ok(index - 1)
}
