//! Invoice definitions
//!
//! Loaded from a JSON file (default `~/.config/commitbill/invoices.json`).
//! Each entry names a customer, a schedule, recipients, git sources and the
//! weekly hour budget. The pipeline only reads `customer`, `schedule`, `git`
//! and `ai`; `email` and `global` belong to delivery.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schedule::Schedule;

/// Top-level invoice definitions file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceConfigFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub invoices: Vec<InvoiceConfig>,
    #[serde(default)]
    pub global: GlobalConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One recurring invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceConfig {
    pub id: String,
    pub customer: String,
    pub schedule: Schedule,
    pub email: EmailConfig,
    pub git: GitConfig,
    #[serde(default)]
    pub ai: Option<AiConfig>,
}

/// Recipients and presentation of the invoice email
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
}

/// Where commits come from and how many hours to bill
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfig {
    /// GitHub repos as `owner/name`
    #[serde(default)]
    pub repos: Vec<String>,
    /// Glob patterns for local clones, e.g. `~/code/acme-*`
    #[serde(default)]
    pub repo_dirs: Vec<String>,
    /// Only count commits by this author.
    ///
    /// Local clones match it against name or email (`git log --author`), but
    /// GitHub only accepts a login or email here; a display name finds no
    /// remote commits and the resolver falls back to local clones.
    #[serde(default)]
    pub author: Option<String>,
    pub weeks: u32,
    pub hours_per_week: f64,
}

impl GitConfig {
    /// No explicit sources: fall back to searching by customer name
    pub fn is_customer_driven(&self) -> bool {
        self.repos.is_empty() && self.repo_dirs.is_empty()
    }
}

/// AI stage toggles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub code_analysis: AiStageConfig,
    #[serde(default)]
    pub line_item_generation: AiStageConfig,
}

/// One AI stage: on/off plus an optional prompt replacing the default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiStageConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Settings shared by every invoice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub default_from_email: Option<String>,
    #[serde(default)]
    pub default_bcc: Vec<String>,
}

impl InvoiceConfigFile {
    /// Load and validate invoice definitions from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read invoice config {:?}: {}", path, e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate invoice definitions
    pub fn parse(content: &str) -> Result<Self> {
        let file: InvoiceConfigFile = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse invoice config: {}", e)))?;
        file.validate()?;
        Ok(file)
    }

    /// Structural checks beyond what serde enforces
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for invoice in &self.invoices {
            if invoice.id.trim().is_empty() {
                return Err(Error::Config("invoice id must not be empty".to_string()));
            }
            if !seen.insert(invoice.id.as_str()) {
                return Err(Error::Config(format!("duplicate invoice id: {}", invoice.id)));
            }
            if invoice.customer.trim().is_empty() {
                return Err(Error::Config(format!(
                    "invoice {}: customer must not be empty",
                    invoice.id
                )));
            }
            if invoice.git.weeks == 0 {
                return Err(Error::Config(format!(
                    "invoice {}: git.weeks must be at least 1",
                    invoice.id
                )));
            }
            if !(invoice.git.hours_per_week > 0.0) {
                return Err(Error::Config(format!(
                    "invoice {}: git.hoursPerWeek must be positive",
                    invoice.id
                )));
            }
            if invoice.email.to.is_empty() {
                return Err(Error::Config(format!(
                    "invoice {}: email.to needs at least one recipient",
                    invoice.id
                )));
            }
        }
        Ok(())
    }

    /// Find an invoice configuration by id
    pub fn find(&self, id: &str) -> Result<&InvoiceConfig> {
        self.invoices
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::ConfigNotFound(id.to_string()))
    }
}
