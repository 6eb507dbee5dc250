//! Optional AI rewrite of invoice line items.
//!
//! Two stages run over the whole invoice window:
//! 1. **Code analysis** turns the `[repo] message` commit list into a narrative.
//! 2. **Line item generation** turns that narrative and the total hours into
//!    `<hours>hr - <description>` lines.
//!
//! The resulting items are spread over the weeks by each week's share of the
//! total hours. Any failure leaves every week with its heuristic tasks.

mod command;
mod http;

pub use command::CommandTextGenerator;
pub use http::HttpTextGenerator;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::allocate::round_to_half;
use crate::config::{AiBackendConfig, AiProvider};
use crate::error::{Error, Result};
use crate::format::format_hours;
use crate::invoice_config::AiConfig;
use crate::types::{CommitRecord, TaskSummary, WeeklyWork};

const DEFAULT_ANALYSIS_PROMPT: &str = "You are reviewing a contractor's git history for a client invoice. \
Describe the work below in a few short paragraphs: the features built, problems fixed and \
maintenance done. Group related commits and skip trivial ones. Use plain language a \
non-technical client understands.";

const DEFAULT_LINE_ITEM_PROMPT: &str = "Turn the work summary below into invoice line items. \
Output one item per line in exactly the form `<hours>hr - <description>`, using multiples of \
0.5 hours that add up to the total hours given. Use 3 to 8 items and output nothing else.";

/// Text generation capability (LLM API or local CLI).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run `prompt` and return the model's text
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Create the configured text generator.
pub fn create_text_generator(config: &AiBackendConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider {
        AiProvider::Command => Ok(Box::new(CommandTextGenerator::new(config))),
        AiProvider::Ollama | AiProvider::Claude | AiProvider::OpenAI => {
            Ok(Box::new(HttpTextGenerator::new(config)?))
        }
    }
}

/// Prompts for the two stages; present only when both are enabled.
///
/// The code analysis narrative is only an input to line item generation, so
/// analysis on its own would be a call whose result nothing reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiStages {
    /// Replaces the default code analysis prompt
    pub analysis_prompt: Option<String>,
    /// Replaces the default line item prompt
    pub line_item_prompt: Option<String>,
}

impl AiStages {
    /// Stages enabled by an invoice's `ai` section, `None` unless AI and
    /// both stages are on
    pub fn from_config(config: &AiConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        if !config.code_analysis.enabled || !config.line_item_generation.enabled {
            tracing::debug!(
                code_analysis = config.code_analysis.enabled,
                line_items = config.line_item_generation.enabled,
                "AI override needs both stages; skipping"
            );
            return None;
        }
        Some(Self {
            analysis_prompt: config.code_analysis.prompt.clone(),
            line_item_prompt: config.line_item_generation.prompt.clone(),
        })
    }
}

/// Run both stages and parse the line items.
///
/// Returns an empty list when there are no commits or a stage produced nothing.
pub async fn generate_line_items(
    generator: &dyn TextGenerator,
    stages: &AiStages,
    commits: &[CommitRecord],
    total_hours: f64,
) -> Result<Vec<TaskSummary>> {
    if commits.is_empty() {
        return Ok(Vec::new());
    }

    let prompt = build_analysis_prompt(stages.analysis_prompt.as_deref(), commits);
    let analysis = generator.generate(&prompt).await?;
    let analysis = analysis.trim();
    tracing::debug!(chars = analysis.len(), "Code analysis stage complete");

    if analysis.is_empty() {
        return Ok(Vec::new());
    }

    let prompt = build_line_item_prompt(stages.line_item_prompt.as_deref(), analysis, total_hours);
    let output = generator.generate(&prompt).await?;
    let items = parse_line_items(&output);
    tracing::debug!(items = items.len(), "Line item stage complete");

    Ok(items)
}

fn build_analysis_prompt(custom: Option<&str>, commits: &[CommitRecord]) -> String {
    let commit_lines: Vec<String> = commits
        .iter()
        .map(|c| format!("[{}] {}", c.repo, c.message))
        .collect();
    format!(
        "{}\n\nCommits:\n{}",
        custom.unwrap_or(DEFAULT_ANALYSIS_PROMPT),
        commit_lines.join("\n")
    )
}

fn build_line_item_prompt(custom: Option<&str>, analysis: &str, total_hours: f64) -> String {
    format!(
        "{}\n\nTotal hours: {}\n\nWork summary:\n{}",
        custom.unwrap_or(DEFAULT_LINE_ITEM_PROMPT),
        format_hours(total_hours),
        analysis
    )
}

fn line_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:\*\*)?(\d+(?:\.\d+)?)\s*hrs?(?:\*\*)?\s+-\s+(.+?)\s*$")
            .unwrap_or_else(|e| panic!("line item regex is invalid: {e}"))
    })
}

/// Extract `<hours>hr - <description>` lines; everything else is ignored.
///
/// Bold markers around the hours (`**2.5hr** - ...`) are accepted.
pub fn parse_line_items(output: &str) -> Vec<TaskSummary> {
    let re = line_item_regex();
    output
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let hours: f64 = caps[1].parse().ok()?;
            Some(TaskSummary {
                description: caps[2].to_string(),
                hours,
                commit_count: 0,
            })
        })
        .collect()
}

/// Replace each week's tasks with `items` scaled to the week's share of hours.
///
/// Shares are rounded to the nearest half hour and zero-hour results dropped,
/// so a week's sum may differ slightly from its budget.
pub fn redistribute(weeks: &mut [WeeklyWork], items: &[TaskSummary]) {
    let grand_total: f64 = weeks.iter().map(|w| w.total_hours).sum();
    if grand_total <= 0.0 {
        return;
    }

    for week in weeks.iter_mut() {
        let share = week.total_hours / grand_total;
        week.tasks = items
            .iter()
            .map(|item| TaskSummary {
                description: item.description.clone(),
                hours: round_to_half(item.hours * share),
                commit_count: 0,
            })
            .filter(|t| t.hours > 0.0)
            .collect();
    }
}

/// Run the pipeline and apply it to `weeks`, or leave `weeks` untouched.
///
/// Returns whether the AI items replaced the heuristic tasks.
pub async fn apply_overrides(
    generator: &dyn TextGenerator,
    stages: &AiStages,
    commits: &[CommitRecord],
    weeks: &mut [WeeklyWork],
) -> bool {
    let total_hours: f64 = weeks.iter().map(|w| w.total_hours).sum();

    match generate_line_items(generator, stages, commits, total_hours).await {
        Ok(items) if !items.is_empty() => {
            redistribute(weeks, &items);
            tracing::info!(items = items.len(), "Applied AI line items");
            true
        }
        Ok(_) => {
            tracing::info!("AI stages produced no line items; keeping heuristic tasks");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "AI stages failed; keeping heuristic tasks");
            false
        }
    }
}

/// Error for a generator that produced unusable output
pub(crate) fn ai_error(context: &str, detail: impl std::fmt::Display) -> Error {
    Error::Ai(format!("{context}: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice_config::AiStageConfig;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Mutex;

    struct ScriptedGenerator {
        responses: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(Error::Ai("no scripted response".to_string()));
            }
            responses.remove(0)
        }
    }

    fn commits() -> Vec<CommitRecord> {
        vec![
            CommitRecord {
                message: "fix login".to_string(),
                date: Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
                repo: "acme/api".to_string(),
            },
            CommitRecord {
                message: "add export".to_string(),
                date: Utc.with_ymd_and_hms(2024, 1, 9, 9, 0, 0).unwrap(),
                repo: "acme-web".to_string(),
            },
        ]
    }

    fn both_stages() -> AiStages {
        AiStages::default()
    }

    fn week(start: (i32, u32, u32), total_hours: f64) -> WeeklyWork {
        let start = NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap();
        WeeklyWork {
            week_start: start,
            week_end: start + chrono::Duration::days(6),
            date_range_label: String::new(),
            total_hours,
            tasks: vec![TaskSummary {
                description: "heuristic".to_string(),
                hours: total_hours,
                commit_count: 1,
            }],
        }
    }

    #[test]
    fn test_parse_line_items() {
        let output = "Here are your items:\n\
                      **12hr** - Built the reporting dashboard\n\
                      3.5hr - Fixed login errors  \n\
                      - 2hr - bulleted lines are ignored\n\
                      4 hrs - Deployment work\n\
                      Total: 19.5hr";
        let items = parse_line_items(output);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].description, "Built the reporting dashboard");
        assert_eq!(items[0].hours, 12.0);
        assert_eq!(items[1].description, "Fixed login errors");
        assert_eq!(items[1].hours, 3.5);
        assert_eq!(items[2].hours, 4.0);
        assert!(items.iter().all(|i| i.commit_count == 0));
    }

    #[test]
    fn test_stages_from_config() {
        let mut config = AiConfig {
            enabled: true,
            code_analysis: AiStageConfig {
                enabled: true,
                prompt: Some("Custom".to_string()),
            },
            line_item_generation: AiStageConfig {
                enabled: true,
                prompt: None,
            },
        };
        let stages = AiStages::from_config(&config).unwrap();
        assert_eq!(stages.analysis_prompt.as_deref(), Some("Custom"));
        assert_eq!(stages.line_item_prompt, None);

        config.code_analysis.enabled = false;
        assert!(AiStages::from_config(&config).is_none());

        config.code_analysis.enabled = true;
        config.line_item_generation.enabled = false;
        assert!(AiStages::from_config(&config).is_none());

        config.line_item_generation.enabled = true;
        config.enabled = false;
        assert!(AiStages::from_config(&config).is_none());
    }

    #[tokio::test]
    async fn test_analysis_only_config_makes_no_calls() {
        let config = AiConfig {
            enabled: true,
            code_analysis: AiStageConfig {
                enabled: true,
                prompt: None,
            },
            line_item_generation: AiStageConfig::default(),
        };
        let generator = ScriptedGenerator::new(vec![Ok("narrative".to_string())]);
        let mut weeks = vec![week((2024, 1, 7), 10.0)];

        if let Some(stages) = AiStages::from_config(&config) {
            apply_overrides(&generator, &stages, &commits(), &mut weeks).await;
        }

        assert!(generator.prompts().is_empty());
        assert_eq!(weeks[0].tasks[0].description, "heuristic");
    }

    #[tokio::test]
    async fn test_pipeline_prompts_and_output() {
        let generator = ScriptedGenerator::new(vec![
            Ok("Worked on login and exports.".to_string()),
            Ok("6hr - Login fixes\n4hr - Export feature".to_string()),
        ]);

        let items = generate_line_items(&generator, &both_stages(), &commits(), 10.0)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let prompts = generator.prompts();
        assert!(prompts[0].starts_with(DEFAULT_ANALYSIS_PROMPT));
        assert!(prompts[0].contains("[acme/api] fix login\n[acme-web] add export"));
        assert!(prompts[1].contains("Total hours: 10"));
        assert!(prompts[1].contains("Worked on login and exports."));
    }

    #[tokio::test]
    async fn test_empty_analysis_skips_second_stage() {
        let generator = ScriptedGenerator::new(vec![Ok("   ".to_string())]);
        let items = generate_line_items(&generator, &both_stages(), &commits(), 10.0)
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(generator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_no_commits_skips_pipeline() {
        let generator = ScriptedGenerator::new(vec![]);
        let items = generate_line_items(&generator, &both_stages(), &[], 10.0)
            .await
            .unwrap();
        assert!(items.is_empty());
        assert!(generator.prompts().is_empty());
    }

    #[test]
    fn test_redistribute_by_week_share() {
        let mut weeks = vec![week((2024, 1, 7), 30.0), week((2024, 1, 14), 10.0)];
        let items = vec![
            TaskSummary {
                description: "Dashboard".to_string(),
                hours: 30.0,
                commit_count: 0,
            },
            TaskSummary {
                description: "Fixes".to_string(),
                hours: 10.0,
                commit_count: 0,
            },
            TaskSummary {
                description: "Tiny".to_string(),
                hours: 0.5,
                commit_count: 0,
            },
        ];

        redistribute(&mut weeks, &items);

        let first: Vec<_> = weeks[0].tasks.iter().map(|t| t.hours).collect();
        let second: Vec<_> = weeks[1].tasks.iter().map(|t| t.hours).collect();
        // 0.5 * 0.75 = 0.375 -> 0.5; 0.5 * 0.25 = 0.125 -> 0 (dropped)
        assert_eq!(first, vec![22.5, 7.5, 0.5]);
        assert_eq!(second, vec![7.5, 2.5]);
        assert!(weeks.iter().all(|w| w.tasks.iter().all(|t| t.commit_count == 0)));
    }

    #[tokio::test]
    async fn test_failure_keeps_heuristic_weeks() {
        let generator = ScriptedGenerator::new(vec![
            Ok("analysis".to_string()),
            Err(Error::Ai("timeout".to_string())),
        ]);
        let mut weeks = vec![week((2024, 1, 7), 10.0), week((2024, 1, 14), 10.0)];
        let before = weeks.clone();

        let applied = apply_overrides(&generator, &both_stages(), &commits(), &mut weeks).await;
        assert!(!applied);
        assert_eq!(weeks, before);
    }

    #[tokio::test]
    async fn test_unparseable_output_keeps_heuristic_weeks() {
        let generator = ScriptedGenerator::new(vec![
            Ok("analysis".to_string()),
            Ok("I could not produce line items.".to_string()),
        ]);
        let mut weeks = vec![week((2024, 1, 7), 10.0)];
        let before = weeks.clone();

        assert!(!apply_overrides(&generator, &both_stages(), &commits(), &mut weeks).await);
        assert_eq!(weeks, before);
    }
}
