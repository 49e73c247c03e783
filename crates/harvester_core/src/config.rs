use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::{
    CompletionCheck, ExtraSource, ItemDataSpec, ItemIdSpec, ListLocatorSpec, Locator,
    NavigationSpec, PageNumberSpec, RevealResult, RevealTrigger, PLACEHOLDER,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid job configuration: {0}")]
    Invalid(String),
}

/// Everything one harvest job needs to know about the target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub page_count: PageNumberSpec,
    pub current_page: PageNumberSpec,
    pub navigation: NavigationSpec,
    #[serde(default)]
    pub completion_check: Option<CompletionCheck>,
    pub list: ListLocatorSpec,
    pub item_id: ItemIdSpec,
    pub item_data: ItemDataSpec,
    #[serde(default)]
    pub timing: Timing,
    /// Used when the page-count strategy yields 0.
    #[serde(default = "defaults::default_max_pages")]
    pub default_max_pages: u32,
    #[serde(default = "defaults::max_session_recoveries")]
    pub max_session_recoveries: u32,
    #[serde(default)]
    pub rework_pass: bool,
    #[serde(default)]
    pub diagnostics: DiagnosticSwitches,
}

/// Timing knobs, all in milliseconds except the poll budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default = "defaults::list_interval_ms")]
    pub list_interval_ms: u64,
    #[serde(default = "defaults::item_interval_ms")]
    pub item_interval_ms: u64,
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "defaults::poll_budget")]
    pub poll_budget: u32,
    #[serde(default = "defaults::error_poll_cost")]
    pub error_poll_cost: u32,
    #[serde(default = "defaults::startup_delay_ms")]
    pub startup_delay_ms: u64,
    #[serde(default = "defaults::reveal_settle_ms")]
    pub reveal_settle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            list_interval_ms: defaults::list_interval_ms(),
            item_interval_ms: defaults::item_interval_ms(),
            poll_interval_ms: defaults::poll_interval_ms(),
            poll_budget: defaults::poll_budget(),
            error_poll_cost: defaults::error_poll_cost(),
            startup_delay_ms: defaults::startup_delay_ms(),
            reveal_settle_ms: defaults::reveal_settle_ms(),
        }
    }
}

impl Timing {
    pub fn list_interval(&self) -> Duration {
        Duration::from_millis(self.list_interval_ms)
    }

    pub fn item_interval(&self) -> Duration {
        Duration::from_millis(self.item_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn reveal_settle(&self) -> Duration {
        Duration::from_millis(self.reveal_settle_ms)
    }
}

/// Which sub-operations a diagnostic dry-run exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagnosticSwitches {
    #[serde(default)]
    pub current_page: bool,
    #[serde(default)]
    pub go_page: bool,
    #[serde(default)]
    pub page_count: bool,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub item_id: bool,
    #[serde(default)]
    pub item_data: bool,
}

impl DiagnosticSwitches {
    pub fn all() -> Self {
        Self {
            current_page: true,
            go_page: true,
            page_count: true,
            list: true,
            item_id: true,
            item_data: true,
        }
    }

    pub fn any(&self) -> bool {
        self.current_page
            || self.go_page
            || self.page_count
            || self.list
            || self.item_id
            || self.item_data
    }
}

impl JobConfig {
    /// Semantic checks that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_page_spec("page_count", &self.page_count)?;
        check_page_spec("current_page", &self.current_page)?;

        match &self.navigation {
            NavigationSpec::RewriteUrl { template } => {
                if !template.contains(PLACEHOLDER) {
                    return Err(invalid(format!(
                        "navigation template {template:?} has no {PLACEHOLDER} placeholder"
                    )));
                }
            }
            NavigationSpec::InvokeNamedFunction { name } => {
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
                if !valid {
                    return Err(invalid(format!(
                        "navigation function name {name:?} is not an identifier"
                    )));
                }
            }
            NavigationSpec::FillAndSubmit { input, confirm } => {
                check_locator("navigation.input", input)?;
                if let Some(confirm) = confirm {
                    check_locator("navigation.confirm", confirm)?;
                }
            }
        }

        if let Some(check) = &self.completion_check {
            check_locator("completion_check", &check.locator)?;
        }

        check_locator("list", &self.list.locator)?;
        if self.list.merge_group == Some(0) {
            return Err(invalid("list.merge_group must be at least 1"));
        }

        if let ItemIdSpec::ChildLocator { locator, .. } = &self.item_id {
            check_locator("item_id", locator)?;
        }

        self.validate_item_data()?;

        if self.timing.poll_budget == 0 {
            return Err(invalid("timing.poll_budget must be > 0"));
        }
        if self.default_max_pages == 0 {
            return Err(invalid("default_max_pages must be > 0"));
        }
        Ok(())
    }

    fn validate_item_data(&self) -> Result<(), ConfigError> {
        check_locator("item_data", &self.item_data.locator)?;
        let Some(extra) = &self.item_data.extra else {
            return Ok(());
        };
        match &extra.source {
            ExtraSource::RemoteFetch {
                url_template,
                params,
                markup_rule,
            } => {
                let slots = url_template.matches(PLACEHOLDER).count();
                if slots != params.len() {
                    return Err(invalid(format!(
                        "remote fetch template has {slots} placeholders but {} params",
                        params.len()
                    )));
                }
                if matches!(markup_rule, Some(rule) if rule.trim().is_empty()) {
                    return Err(invalid("remote fetch markup_rule is empty"));
                }
            }
            ExtraSource::InPageReveal {
                trigger, result, ..
            } => {
                if let RevealTrigger::Child(locator) = trigger {
                    check_locator("reveal trigger", locator)?;
                }
                if let RevealResult::Elements { locator, .. } = result {
                    check_locator("reveal result", locator)?;
                }
            }
        }
        Ok(())
    }
}

fn check_page_spec(field: &str, spec: &PageNumberSpec) -> Result<(), ConfigError> {
    match spec {
        PageNumberSpec::TextAt { locator, .. } | PageNumberSpec::AttributeAt { locator, .. } => {
            check_locator(field, locator)
        }
        PageNumberSpec::Literal(_) | PageNumberSpec::FromUrl { .. } => Ok(()),
    }
}

fn check_locator(field: &str, locator: &Locator) -> Result<(), ConfigError> {
    if locator.value.trim().is_empty() {
        return Err(invalid(format!("{field} locator is empty")));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

mod defaults {
    pub fn default_max_pages() -> u32 {
        1
    }
    pub fn max_session_recoveries() -> u32 {
        5
    }
    pub fn list_interval_ms() -> u64 {
        5_000
    }
    pub fn item_interval_ms() -> u64 {
        500
    }
    pub fn poll_interval_ms() -> u64 {
        500
    }
    pub fn poll_budget() -> u32 {
        100
    }
    pub fn error_poll_cost() -> u32 {
        10
    }
    pub fn startup_delay_ms() -> u64 {
        1_000
    }
    pub fn reveal_settle_ms() -> u64 {
        1_000
    }
}
