//! Item Processor: id resolution, dedup, payload extraction and persistence.
use engine_logging::engine_info;
use harvester_core::resolve::{escape_field, group_id, is_empty_payload, normalize_id};
use harvester_core::{ItemIdSpec, JobConfig};

use crate::driver::{find_single, link_or_text, Driver, ElementHandle};
use crate::extra::ExtraContent;
use crate::fetch::Fetcher;
use crate::hooks::HarvestHooks;
use crate::list::{Item, ItemNode};
use crate::store::{Record, RecordStore};
use crate::HarvestError;

pub struct ItemProcessor<'a> {
    config: &'a JobConfig,
    store: &'a dyn RecordStore,
    hooks: &'a dyn HarvestHooks,
    fetcher: &'a dyn Fetcher,
}

impl<'a> ItemProcessor<'a> {
    pub fn new(
        config: &'a JobConfig,
        store: &'a dyn RecordStore,
        hooks: &'a dyn HarvestHooks,
        fetcher: &'a dyn Fetcher,
    ) -> Self {
        Self {
            config,
            store,
            hooks,
            fetcher,
        }
    }

    /// Storage key for `item`, which sits on `page`.
    pub async fn resolve_id(
        &self,
        driver: &mut dyn Driver,
        item: &Item,
        page: u32,
    ) -> Result<String, HarvestError> {
        if let Some(id) = self.hooks.item_id(driver, item).await? {
            return Ok(id);
        }

        let id = match &item.node {
            ItemNode::Group(elements) => group_id(&texts(driver, elements).await?),
            ItemNode::Single(element) => match &self.config.item_id {
                ItemIdSpec::ExternalHook => {
                    return Err(HarvestError::hook("item id hook declined"));
                }
                ItemIdSpec::PageNumber => page.to_string(),
                ItemIdSpec::SelfText => driver.read_text(element).await?,
                ItemIdSpec::ChildLocator {
                    locator,
                    pattern,
                    prefix_with_index,
                } => {
                    let child = find_single(driver, Some(element), locator).await?;
                    let raw = link_or_text(driver, &child).await?;
                    normalize_id(
                        &raw,
                        pattern.as_ref(),
                        prefix_with_index.then_some(item.index),
                    )?
                }
            },
        };
        if id.is_empty() {
            return Err(HarvestError::Parse(format!(
                "item {} resolved to an empty id",
                item.index
            )));
        }
        Ok(id)
    }

    /// Whether `id` is already stored and the stored record counts as done.
    pub async fn is_complete(&self, id: &str) -> Result<bool, HarvestError> {
        Ok(match self.store.find_by_id(id).await? {
            Some(record) => self.hooks.is_complete(&record),
            None => false,
        })
    }

    pub async fn fetch_payload(
        &self,
        driver: &mut dyn Driver,
        item: &Item,
        id: &str,
    ) -> Result<Vec<String>, HarvestError> {
        let fields = match self.hooks.item_data(driver, item, id).await? {
            Some(fields) => fields,
            None => match &item.node {
                ItemNode::Group(elements) => texts(driver, elements).await?,
                ItemNode::Single(element) => self.element_payload(driver, element, id).await?,
            },
        };
        if is_empty_payload(&fields) {
            return Err(HarvestError::EmptyContent { id: id.to_string() });
        }
        Ok(fields)
    }

    pub async fn persist(&self, id: &str, fields: Vec<String>) -> Result<(), HarvestError> {
        engine_info!("Saving item {id}");
        self.store.save(Record::new(id, fields)).await?;
        Ok(())
    }

    async fn element_payload(
        &self,
        driver: &mut dyn Driver,
        element: &ElementHandle,
        id: &str,
    ) -> Result<Vec<String>, HarvestError> {
        let mut fields = vec![id.to_string()];
        for field in driver
            .find_elements_in(element, &self.config.item_data.locator)
            .await?
        {
            fields.push(escape_field(&driver.read_text(&field).await?));
        }

        match &self.config.item_data.extra {
            Some(spec) => {
                ExtraContent {
                    spec,
                    fetcher: self.fetcher,
                    hooks: self.hooks,
                    timing: &self.config.timing,
                }
                .augment(driver, element, id, fields)
                .await
            }
            None => Ok(fields),
        }
    }
}

async fn texts(
    driver: &mut dyn Driver,
    elements: &[ElementHandle],
) -> Result<Vec<String>, HarvestError> {
    let mut texts = Vec::with_capacity(elements.len());
    for element in elements {
        texts.push(driver.read_text(element).await?);
    }
    Ok(texts)
}
