//! Allow-list of supported currency codes.

use std::collections::BTreeSet;
use std::path::Path;

use ratefeed_common::CurrencyCode;
use tracing::{info, warn};

use crate::error::{FxError, FxResult};

const BUNDLED_CODES: &str = include_str!("../resources/currency_codes.txt");

/// Membership check against a fixed set of currency codes.
///
/// Built once at startup and never mutated afterwards. Lines are trimmed and
/// matched case-insensitively; blank lines and `#` comments are ignored.
#[derive(Debug, Clone)]
pub struct CodeValidator {
    supported: BTreeSet<CurrencyCode>,
}

impl CodeValidator {
    /// Load the allow-list from a line-delimited file.
    ///
    /// A missing or unreadable file, or one with no usable codes, is a
    /// configuration error: the service must not start with an empty set.
    pub fn from_path(path: impl AsRef<Path>) -> FxResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FxError::Configuration(format!(
                "cannot read currency codes from {}: {e}",
                path.display()
            ))
        })?;

        let validator = Self::from_lines(&text)?;
        info!(
            path = %path.display(),
            codes = validator.len(),
            "Loaded supported currency codes"
        );
        Ok(validator)
    }

    /// The allow-list compiled into the crate.
    pub fn bundled() -> FxResult<Self> {
        Self::from_lines(BUNDLED_CODES)
    }

    /// Build from newline-separated codes.
    pub fn from_lines(text: &str) -> FxResult<Self> {
        let mut supported = BTreeSet::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match CurrencyCode::parse(line) {
                Ok(code) => {
                    supported.insert(code);
                }
                Err(_) => warn!(line = index + 1, entry = line, "Skipping malformed currency code"),
            }
        }

        if supported.is_empty() {
            return Err(FxError::Configuration(
                "currency code list is empty".to_string(),
            ));
        }

        Ok(Self { supported })
    }

    /// Check whether `code` is allow-listed.
    pub fn is_supported(&self, code: &str) -> bool {
        CurrencyCode::parse(code)
            .map(|code| self.supported.contains(&code))
            .unwrap_or(false)
    }

    /// Return the normalized code, or [`FxError::InvalidCurrency`] if it is not allow-listed.
    pub fn validate(&self, code: &str) -> FxResult<CurrencyCode> {
        match CurrencyCode::parse(code) {
            Ok(parsed) if self.supported.contains(&parsed) => Ok(parsed),
            _ => Err(self.invalid(code)),
        }
    }

    /// Build the error returned for an unusable code.
    pub fn invalid(&self, code: &str) -> FxError {
        FxError::InvalidCurrency {
            code: code.to_string(),
            valid_codes: self.supported.iter().map(ToString::to_string).collect(),
        }
    }

    /// Supported codes, sorted.
    pub fn codes(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.supported.iter()
    }

    /// Number of supported codes.
    pub fn len(&self) -> usize {
        self.supported.len()
    }

    /// Always false for a constructed validator.
    pub fn is_empty(&self) -> bool {
        self.supported.is_empty()
    }
}
