//! Generate, store and deliver invoices.
//!
//! [`Runner`] owns the assembler, the invoice store and the mailer. Both
//! binaries go through it: the CLI for one configuration at a time, the
//! scheduler for a full pass over every configuration.

use chrono::NaiveDate;

use crate::ai::create_text_generator;
use crate::config::Config;
use crate::db::InvoiceStore;
use crate::delivery::{EmailRequest, HttpMailer, Mailer};
use crate::error::{Error, Result};
use crate::invoice::{GenerateRequest, InvoiceAssembler};
use crate::invoice_config::{GlobalConfig, InvoiceConfig, InvoiceConfigFile};
use crate::schedule::should_run;
use crate::sources::{GitCli, GitHubClient, RemoteCommitSource, SourceResolver};
use crate::types::{InvoiceData, SavedInvoice};

/// What happened to one configuration in a scheduler pass
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Schedule says not today
    NotDue,
    /// Generated and sent; the saved invoice id
    Sent { invoice_id: String },
    /// Generated but not saved or sent (dry run)
    Generated { invoice: Box<InvoiceData> },
    /// Schedule, generation, storage or delivery failed
    Failed { reason: String },
}

/// Per-configuration outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOutcome {
    pub config_id: String,
    pub status: RunStatus,
}

/// Result of one scheduler pass
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub date: NaiveDate,
    pub outcomes: Vec<ConfigOutcome>,
}

impl BatchReport {
    pub fn due(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status != RunStatus::NotDue)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConfigOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RunStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Ties together the pipeline, the store and delivery
pub struct Runner {
    assembler: InvoiceAssembler,
    store: InvoiceStore,
    mailer: Option<Box<dyn Mailer>>,
}

impl Runner {
    pub fn new(
        assembler: InvoiceAssembler,
        store: InvoiceStore,
        mailer: Option<Box<dyn Mailer>>,
    ) -> Self {
        Self {
            assembler,
            store,
            mailer,
        }
    }

    /// Build the production runner from settings.
    ///
    /// An unusable `[ai]` or `[mailer]` section is logged and left out; the
    /// pipeline then keeps heuristic tasks and delivery reports an error.
    pub fn from_settings(config: &Config, global: &GlobalConfig) -> Result<Self> {
        let remote: Box<dyn RemoteCommitSource> = Box::new(GitHubClient::new(&config.github)?);
        let resolver = SourceResolver::new(
            Some(remote),
            Box::new(GitCli::new()),
            config.local.search_root_path(),
        );

        let generator = match config.ai.as_ref().map(create_text_generator) {
            Some(Ok(generator)) => Some(generator),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "AI backend unavailable");
                None
            }
            None => None,
        };

        let mailer = config.mailer.as_ref().and_then(|mailer| {
            let from = global
                .default_from_email
                .clone()
                .or_else(|| mailer.from_email.clone())
                .unwrap_or_default();
            match HttpMailer::new(mailer, from) {
                Ok(m) => Some(Box::new(m) as Box<dyn Mailer>),
                Err(e) => {
                    tracing::warn!(error = %e, "Mailer unavailable");
                    None
                }
            }
        });

        let store = InvoiceStore::open(&Config::database_path())?;
        store.migrate()?;

        Ok(Self::new(
            InvoiceAssembler::new(resolver, generator),
            store,
            mailer,
        ))
    }

    pub fn store(&self) -> &InvoiceStore {
        &self.store
    }

    /// Generate an invoice for one configuration
    pub async fn generate_for(
        &self,
        config: &InvoiceConfig,
        today: NaiveDate,
    ) -> Option<InvoiceData> {
        self.generate(&GenerateRequest::from_config(config, today))
            .await
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Option<InvoiceData> {
        self.assembler.generate(request).await
    }

    /// Email an invoice to the configuration's recipients.
    ///
    /// `global.defaultBcc` is appended to the configuration's own bcc list.
    pub async fn deliver(
        &self,
        config: &InvoiceConfig,
        global: &GlobalConfig,
        invoice: &InvoiceData,
        test_mode: bool,
    ) -> Result<()> {
        let mailer = self.mailer.as_deref().ok_or_else(|| {
            Error::Config("mail delivery is not configured (see [mailer] in config.toml)".to_string())
        })?;

        let mut bcc = config.email.bcc.clone();
        for address in &global.default_bcc {
            if !bcc.contains(address) {
                bcc.push(address.clone());
            }
        }

        let request = EmailRequest {
            customer: invoice.customer.clone(),
            start_date: invoice.start_date_label.clone(),
            end_date: invoice.end_date_label.clone(),
            formatted_text: invoice.formatted_text.clone(),
            total_hours: invoice.total_hours,
            recipients: config.email.to.clone(),
            cc: config.email.cc.clone(),
            bcc,
            subject: config.email.subject.clone(),
            from_name: config.email.from_name.clone(),
            test_mode,
        };

        mailer.send(&request).await.into_result()
    }

    /// Deliver a previously saved invoice and mark it sent.
    ///
    /// Test sends leave the sent timestamp untouched.
    pub async fn send_saved(
        &self,
        id: &str,
        configs: &InvoiceConfigFile,
        test_mode: bool,
    ) -> Result<SavedInvoice> {
        let mut saved = self.store.load(id)?;
        let config = configs.find(&saved.config_id)?;

        self.deliver(config, &configs.global, &saved.invoice, test_mode)
            .await?;
        if !test_mode {
            saved.sent_at = Some(self.store.mark_sent(id)?);
        }
        Ok(saved)
    }

    /// One scheduler pass over every configuration.
    ///
    /// Each configuration is isolated: its failure is logged and recorded
    /// and the pass moves on to the next one.
    pub async fn run_scheduled(
        &self,
        configs: &InvoiceConfigFile,
        today: NaiveDate,
        dry_run: bool,
    ) -> BatchReport {
        let mut outcomes = Vec::with_capacity(configs.invoices.len());

        for config in &configs.invoices {
            let status = match self.run_one(config, &configs.global, today, dry_run).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::error!(config_id = %config.id, error = %e, "Scheduled invoice failed");
                    RunStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(ConfigOutcome {
                config_id: config.id.clone(),
                status,
            });
        }

        let report = BatchReport {
            date: today,
            outcomes,
        };
        tracing::info!(
            date = %today,
            configs = report.outcomes.len(),
            due = report.due(),
            failed = report.failures().count(),
            "Scheduler pass complete"
        );
        report
    }

    async fn run_one(
        &self,
        config: &InvoiceConfig,
        global: &GlobalConfig,
        today: NaiveDate,
        dry_run: bool,
    ) -> Result<RunStatus> {
        if !should_run(&config.schedule, today)? {
            tracing::debug!(config_id = %config.id, schedule = %config.schedule.kind, "Not due");
            return Ok(RunStatus::NotDue);
        }

        let invoice = self.generate_for(config, today).await.ok_or_else(|| {
            Error::Source(format!("no repositories found for {}", config.customer))
        })?;

        if dry_run {
            return Ok(RunStatus::Generated {
                invoice: Box::new(invoice),
            });
        }

        let saved = self.store.save(&config.id, &invoice)?;
        self.deliver(config, global, &invoice, false)
            .await
            .map_err(|e| Error::Delivery(format!("invoice {} saved but not sent: {}", saved.id, e)))?;
        self.store.mark_sent(&saved.id)?;

        Ok(RunStatus::Sent {
            invoice_id: saved.id,
        })
    }
}
