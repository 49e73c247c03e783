//! Secondary content appended to an item's base fields.
use engine_logging::{engine_debug, engine_warn};
use harvester_core::resolve::{escape_field, fill_placeholders};
use harvester_core::{ExtraContentSpec, ExtraSource, Locator, RevealResult, RevealTrigger, Timing};
use scraper::{Html, Selector};

use crate::decode::decode_body;
use crate::driver::{find_single, Driver, ElementHandle};
use crate::fetch::Fetcher;
use crate::hooks::HarvestHooks;
use crate::HarvestError;

pub(crate) struct ExtraContent<'a> {
    pub spec: &'a ExtraContentSpec,
    pub fetcher: &'a dyn Fetcher,
    pub hooks: &'a dyn HarvestHooks,
    pub timing: &'a Timing,
}

impl ExtraContent<'_> {
    pub async fn augment(
        &self,
        driver: &mut dyn Driver,
        element: &ElementHandle,
        id: &str,
        mut fields: Vec<String>,
    ) -> Result<Vec<String>, HarvestError> {
        let extra = match &self.spec.source {
            ExtraSource::RemoteFetch {
                url_template,
                params,
                markup_rule,
            } => {
                self.remote(url_template, params, markup_rule.as_deref(), &fields)
                    .await?
            }
            ExtraSource::InPageReveal {
                trigger,
                opens_new_tab,
                result,
            } => {
                self.reveal(driver, element, id, trigger, *opens_new_tab, result)
                    .await?
            }
        };
        if self.spec.replace_fields {
            fields.truncate(1);
        }
        fields.extend(extra);
        Ok(fields)
    }

    async fn remote(
        &self,
        url_template: &str,
        params: &[usize],
        markup_rule: Option<&str>,
        fields: &[String],
    ) -> Result<Vec<String>, HarvestError> {
        let values = params
            .iter()
            .map(|index| {
                fields.get(*index).map(String::as_str).ok_or_else(|| {
                    HarvestError::Validation(format!(
                        "extra content wants field {index}, item has {}",
                        fields.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let url = fill_placeholders(url_template, &values);

        let output = self.fetcher.fetch(&url).await?;
        let decoded = decode_body(&output.bytes, output.metadata.content_type.as_deref())?;
        engine_debug!(
            "Fetched extra content from {url} ({} bytes, {})",
            output.metadata.byte_len,
            decoded.encoding_label
        );

        let Some(rule) = markup_rule else {
            return Ok(vec![decoded.text]);
        };
        let selector = Selector::parse(rule)
            .map_err(|err| HarvestError::Config(format!("markup rule {rule:?}: {err}")))?;
        let document = Html::parse_document(&decoded.text);
        Ok(document
            .select(&selector)
            .map(|node| escape_field(&node.text().collect::<String>()))
            .collect())
    }

    async fn reveal(
        &self,
        driver: &mut dyn Driver,
        element: &ElementHandle,
        id: &str,
        trigger: &RevealTrigger,
        opens_new_tab: bool,
        result: &RevealResult,
    ) -> Result<Vec<String>, HarvestError> {
        driver.close_extra_tabs().await?;
        match trigger {
            RevealTrigger::SelfItem => driver.click(element).await?,
            RevealTrigger::Child(locator) => {
                let target = find_single(driver, Some(element), locator).await?;
                driver.click(&target).await?;
            }
        }
        if opens_new_tab {
            self.wait_for_new_tab(driver).await?;
            driver.switch_to_newest_tab().await?;
        }
        tokio::time::sleep(self.timing.reveal_settle()).await;

        let collected = self.collect(driver, id, result).await;

        let restored = if opens_new_tab {
            driver.close_current_tab().await
        } else {
            driver.navigate_back().await
        };
        if let Err(err) = restored {
            engine_warn!("Could not leave revealed content for {id}: {err}");
            collected?;
            return Err(err.into());
        }
        collected
    }

    async fn collect(
        &self,
        driver: &mut dyn Driver,
        id: &str,
        result: &RevealResult,
    ) -> Result<Vec<String>, HarvestError> {
        match result {
            RevealResult::Hook => self
                .hooks
                .reveal_content(driver, id)
                .await?
                .ok_or_else(|| HarvestError::hook("reveal content requested but no hook provided it")),
            RevealResult::Elements { locator, attribute } => {
                collect_elements(driver, locator, attribute.as_deref()).await
            }
        }
    }

    async fn wait_for_new_tab(&self, driver: &mut dyn Driver) -> Result<(), HarvestError> {
        for _ in 0..self.timing.poll_budget {
            if driver.tab_count().await? >= 2 {
                return Ok(());
            }
            tokio::time::sleep(self.timing.poll_interval()).await;
        }
        Err(HarvestError::Session("revealed content never opened a new tab".into()))
    }
}

async fn collect_elements(
    driver: &mut dyn Driver,
    locator: &Locator,
    attribute: Option<&str>,
) -> Result<Vec<String>, HarvestError> {
    let mut values = Vec::new();
    for element in driver.find_elements(locator).await? {
        let is_anchor = driver.tag_name(&element).await?.eq_ignore_ascii_case("a");
        let value = if is_anchor {
            driver.read_attribute(&element, "href").await?
        } else if let Some(attribute) = attribute {
            driver.read_attribute(&element, attribute).await?
        } else {
            Some(escape_field(&driver.read_text(&element).await?))
        };
        values.push(value.unwrap_or_default());
    }
    Ok(values)
}
