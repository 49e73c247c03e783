//! Page Navigator: reads page numbers and drives the session to a page.
use engine_logging::{engine_debug, engine_warn};
use harvester_core::resolve::{ensure_positive, fill_placeholders, page_number_from, parse_page_number};
use harvester_core::{CompletionCheck, JobConfig, Locator, NavigationSpec, PageNumberSpec, Timing};
use serde_json::{json, Value};

use crate::driver::{find_single, Driver};
use crate::HarvestError;

pub struct PageNavigator<'a> {
    page_count: &'a PageNumberSpec,
    current_page: &'a PageNumberSpec,
    navigation: &'a NavigationSpec,
    completion_check: Option<&'a CompletionCheck>,
    timing: &'a Timing,
}

impl<'a> PageNavigator<'a> {
    pub fn new(config: &'a JobConfig) -> Self {
        Self {
            page_count: &config.page_count,
            current_page: &config.current_page,
            navigation: &config.navigation,
            completion_check: config.completion_check.as_ref(),
            timing: &config.timing,
        }
    }

    /// Page count as the site reports it. 0 means "unknown"; the caller
    /// substitutes its default cap.
    pub async fn total_pages(&self, driver: &mut dyn Driver) -> Result<u32, HarvestError> {
        read_page_number(driver, self.page_count).await
    }

    pub async fn current_page(&self, driver: &mut dyn Driver) -> Result<u32, HarvestError> {
        let page = read_page_number(driver, self.current_page).await?;
        Ok(ensure_positive(page)?)
    }

    /// Run the navigation action, then poll until the session shows `target`.
    pub async fn go_to(&self, driver: &mut dyn Driver, target: u32) -> Result<(), HarvestError> {
        engine_debug!("Navigating to page {target}");
        self.trigger(driver, target).await?;

        let mut spent = 0u32;
        loop {
            tokio::time::sleep(self.timing.poll_interval()).await;
            match self.observe(driver).await {
                Ok(Some(page)) if page == target => return Ok(()),
                Ok(_) => spent = spent.saturating_add(1),
                Err(err) => {
                    engine_debug!("Page check failed while waiting for page {target}: {err}");
                    spent = spent.saturating_add(self.timing.error_poll_cost);
                }
            }
            if spent > self.timing.poll_budget {
                return Err(HarvestError::NavigationTimeout { target });
            }
        }
    }

    async fn trigger(&self, driver: &mut dyn Driver, target: u32) -> Result<(), HarvestError> {
        let page = target.to_string();
        match self.navigation {
            NavigationSpec::RewriteUrl { template } => {
                driver.navigate_to(&fill_placeholders(template, &[&page])).await?;
            }
            NavigationSpec::InvokeNamedFunction { name } => {
                self.wait_for_function(driver, name).await?;
                driver
                    .execute_script(&format!("{name}(arguments[0]);"), vec![json!(target)])
                    .await?;
            }
            NavigationSpec::FillAndSubmit { input, confirm } => {
                let input = find_single(driver, None, input).await?;
                driver.clear(&input).await?;
                match confirm {
                    Some(confirm) => {
                        let confirm = find_single(driver, None, confirm).await?;
                        driver.type_text(&input, &page, false).await?;
                        driver.click(&confirm).await?;
                    }
                    None => driver.type_text(&input, &page, true).await?,
                }
            }
        }
        Ok(())
    }

    async fn wait_for_function(&self, driver: &mut dyn Driver, name: &str) -> Result<(), HarvestError> {
        let probe = format!("return typeof {name} === 'function';");
        let mut spent = 0u32;
        loop {
            match driver.execute_script(&probe, Vec::new()).await {
                Ok(Value::Bool(true)) => return Ok(()),
                Ok(_) => spent = spent.saturating_add(1),
                Err(err) => {
                    engine_debug!("Probe for {name} failed: {err}");
                    spent = spent.saturating_add(self.timing.error_poll_cost);
                }
            }
            if spent > self.timing.poll_budget {
                engine_warn!("Navigation function {name} never became available");
                return Err(HarvestError::Session(format!(
                    "page function {name} is not defined"
                )));
            }
            tokio::time::sleep(self.timing.poll_interval()).await;
        }
    }

    /// `None` while a completion check says the page is not ready yet.
    async fn observe(&self, driver: &mut dyn Driver) -> Result<Option<u32>, HarvestError> {
        if let Some(check) = self.completion_check {
            let visible = !driver.find_elements(&check.locator).await?.is_empty();
            if visible != check.expect_visible {
                return Ok(None);
            }
        }
        self.current_page(driver).await.map(Some)
    }
}

async fn read_page_number(
    driver: &mut dyn Driver,
    spec: &PageNumberSpec,
) -> Result<u32, HarvestError> {
    match spec {
        PageNumberSpec::Literal(page) => Ok(*page),
        PageNumberSpec::TextAt { locator, pattern } => {
            let element = first_element(driver, locator).await?;
            let text = driver.read_text(&element).await?;
            Ok(page_number_from(&text, pattern.as_ref())?)
        }
        PageNumberSpec::AttributeAt { locator, attribute } => {
            let element = first_element(driver, locator).await?;
            let value = driver
                .read_attribute(&element, attribute)
                .await?
                .ok_or_else(|| {
                    HarvestError::Parse(format!("{locator} has no attribute {attribute:?}"))
                })?;
            Ok(parse_page_number(&value)?)
        }
        PageNumberSpec::FromUrl { pattern } => {
            let url = driver.current_url().await?;
            Ok(page_number_from(&url, Some(pattern))?)
        }
    }
}

async fn first_element(
    driver: &mut dyn Driver,
    locator: &Locator,
) -> Result<crate::driver::ElementHandle, HarvestError> {
    driver
        .find_elements(locator)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| HarvestError::Parse(format!("no element matches {locator}")))
}
