//! SQL statement validator.
//!
//! Enforces an allow-list of leading statement keywords and rejects text that
//! matches known injection shapes. The pattern check is a deny-list: it can
//! reject known-bad statements but cannot prove a statement safe, so callers
//! should still pass values through `query_params` rather than splicing them
//! into the text.

use crate::error::{GatewayError, GatewayResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Canonical deny-list, matched case-insensitively against the original text.
const DANGEROUS_PATTERNS: [&str; 8] = [
    r";.*--",             // statement separator then line comment
    r";.*/\*",            // statement separator then block comment
    r"UNION.*SELECT",     // UNION-based injection
    r"INTO.*OUTFILE",     // file write
    r"INTO.*DUMPFILE",    // file write
    r"EXECUTE.*IMMEDIATE", // dynamic execution
    r"EXEC.*sp_",         // stored procedure execution
    r"xp_cmdshell",       // command execution
];

/// All patterns are compile-time constants, so expect() is safe here.
static DEFAULT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    DANGEROUS_PATTERNS
        .iter()
        .map(|p| compile_pattern(p).expect("Invalid regex: dangerous statement pattern"))
        .collect()
});

fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?i){}", pattern))
}

/// Statement validator.
#[derive(Debug, Clone)]
pub struct StatementValidator {
    allowed_types: Vec<String>,
    patterns: Vec<Regex>,
}

impl Default for StatementValidator {
    fn default() -> Self {
        Self::new(["SELECT"])
    }
}

impl StatementValidator {
    /// Create a validator allowing the given leading keywords.
    pub fn new<I, S>(allowed_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed: Vec<String> = Vec::new();
        for keyword in allowed_types {
            let keyword = keyword.as_ref().trim().to_uppercase();
            if !keyword.is_empty() && !allowed.contains(&keyword) {
                allowed.push(keyword);
            }
        }

        Self {
            allowed_types: allowed,
            patterns: DEFAULT_PATTERNS.clone(),
        }
    }

    /// Add a case-insensitive pattern to the deny-list.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.patterns.push(compile_pattern(pattern)?);
        Ok(self)
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    /// Validate a statement, reporting the first failing check.
    pub fn validate(&self, statement: Option<&str>) -> GatewayResult<()> {
        let statement = match statement {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Err(GatewayError::EmptyStatement),
        };

        debug!(
            "Validating statement: {}",
            truncate(statement, 100)
        );

        self.check_statement_type(statement)?;
        self.check_dangerous_patterns(statement)?;

        debug!("Statement validation passed");
        Ok(())
    }

    fn check_statement_type(&self, statement: &str) -> GatewayResult<()> {
        let normalized = statement.trim().to_uppercase();
        if self
            .allowed_types
            .iter()
            .any(|keyword| normalized.starts_with(keyword.as_str()))
        {
            return Ok(());
        }

        warn!("Statement type not allowed");
        Err(GatewayError::DisallowedStatementType {
            allowed: self.allowed_types.join(", "),
        })
    }

    fn check_dangerous_patterns(&self, statement: &str) -> GatewayResult<()> {
        for pattern in &self.patterns {
            if pattern.is_match(statement) {
                warn!("Dangerous pattern detected: {}", pattern.as_str());
                return Err(GatewayError::DangerousPattern {
                    pattern: pattern.as_str().to_string(),
                });
            }
        }
        Ok(())
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
