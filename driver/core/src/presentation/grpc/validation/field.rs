// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Field Errors
//!
//! Path-addressed validation errors in the Kubernetes `field.Error` format,
//! so messages read like `volumeCapabilities[0].accessMode: Required value`.
//! A list of errors renders as the single message when it holds one error
//! and as `[e1, e2]` otherwise.
//!
//! # Architecture
//!
//! - **Layer:** Presentation Layer
//! - **Purpose:** Implements internal responsibilities for field

use std::fmt;

/// Dotted path to a request field, e.g. `capacityRange.requiredBytes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(root: &str) -> Self {
        Self(root.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Invalid,
    Forbidden,
    NotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub field: FieldPath,
    /// Rendered offending value; strings are quoted
    pub value: Option<String>,
    pub detail: String,
}

impl FieldError {
    pub fn required(field: FieldPath, detail: &str) -> Self {
        Self {
            kind: FieldErrorKind::Required,
            field,
            value: None,
            detail: detail.to_string(),
        }
    }

    pub fn invalid(field: FieldPath, value: impl fmt::Debug, detail: &str) -> Self {
        Self {
            kind: FieldErrorKind::Invalid,
            field,
            value: Some(format!("{:?}", value)),
            detail: detail.to_string(),
        }
    }

    pub fn forbidden(field: FieldPath, detail: &str) -> Self {
        Self {
            kind: FieldErrorKind::Forbidden,
            field,
            value: None,
            detail: detail.to_string(),
        }
    }

    pub fn not_supported(field: FieldPath, value: impl fmt::Debug, supported: &[&str]) -> Self {
        let quoted: Vec<String> = supported.iter().map(|s| format!("{:?}", s)).collect();
        Self {
            kind: FieldErrorKind::NotSupported,
            field,
            value: Some(format!("{:?}", value)),
            detail: format!("supported values: {}", quoted.join(", ")),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            FieldErrorKind::Required => "Required value",
            FieldErrorKind::Invalid => "Invalid value",
            FieldErrorKind::Forbidden => "Forbidden",
            FieldErrorKind::NotSupported => "Unsupported value",
        };
        write!(f, "{}: {}", self.field, label)?;
        if let Some(value) = &self.value {
            write!(f, ": {}", value)?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Accumulated errors of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        // Duplicates collapse, as with an aggregated error list
        if !self.0.contains(&error) {
            self.0.push(error);
        }
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for error in other.0 {
            self.push(error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok` when no error was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<FieldError> for FieldErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => Ok(()),
            [single] => write!(f, "{}", single),
            many => {
                let messages: Vec<String> = many.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", messages.join(", "))
            }
        }
    }
}

impl std::error::Error for FieldErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let path = FieldPath::new("volumeCapabilities").index(0).child("accessMode").child("mode");
        assert_eq!(path.to_string(), "volumeCapabilities[0].accessMode.mode");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FieldError::required(FieldPath::new("name"), "").to_string(),
            "name: Required value"
        );
        assert_eq!(
            FieldError::invalid(FieldPath::new("targetPath"), "rel/path", "must be an absolute path").to_string(),
            "targetPath: Invalid value: \"rel/path\": must be an absolute path"
        );
        assert_eq!(
            FieldError::invalid(FieldPath::new("capacityRange").child("limitBytes"), -1i64, "must be greater than or equal to 0")
                .to_string(),
            "capacityRange.limitBytes: Invalid value: -1: must be greater than or equal to 0"
        );
        assert_eq!(
            FieldError::not_supported(FieldPath::new("mode"), 9, &["A", "B"]).to_string(),
            "mode: Unsupported value: 9: supported values: \"A\", \"B\""
        );
    }

    #[test]
    fn test_aggregate_formatting() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.push(FieldError::required(FieldPath::new("volumeId"), ""));
        assert_eq!(errors.to_string(), "volumeId: Required value");

        errors.push(FieldError::required(FieldPath::new("targetPath"), ""));
        errors.push(FieldError::required(FieldPath::new("targetPath"), ""));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.to_string(), "[volumeId: Required value, targetPath: Required value]");
    }
}
