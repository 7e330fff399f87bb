// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    EmptyTitle,
    InvalidYear,
    UnassignedKind,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => f.write_str("piece title must not be empty"),
            Self::InvalidYear => f.write_str("piece year must be a four-digit year"),
            Self::UnassignedKind => f.write_str("piece must be assigned to a shelf kind"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

pub fn validate_title(title: &str) -> ValidationResult<()> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

pub fn validate_year(year: Option<i32>) -> ValidationResult<()> {
    match year {
        Some(value) if !(1000..=9999).contains(&value) => Err(ValidationError::InvalidYear),
        _ => Ok(()),
    }
}

pub fn validate_kind_ref(kind_id: i64) -> ValidationResult<()> {
    if kind_id <= 0 {
        return Err(ValidationError::UnassignedKind);
    }
    Ok(())
}
