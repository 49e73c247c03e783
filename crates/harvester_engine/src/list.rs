use harvester_core::resolve::{merge_groups, skip_rows};
use harvester_core::ListLocatorSpec;

use crate::driver::{Driver, ElementHandle};
use crate::HarvestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemNode {
    Single(ElementHandle),
    /// Consecutive rows merged into one logical item.
    Group(Vec<ElementHandle>),
}

/// One entry of the current page's list; `index` counts from 0 after
/// skipping and merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub index: usize,
    pub node: ItemNode,
}

impl Item {
    pub fn single(index: usize, element: ElementHandle) -> Self {
        Self {
            index,
            node: ItemNode::Single(element),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.node, ItemNode::Group(_))
    }
}

pub struct ListExtractor<'a> {
    spec: &'a ListLocatorSpec,
}

impl<'a> ListExtractor<'a> {
    pub fn new(spec: &'a ListLocatorSpec) -> Self {
        Self { spec }
    }

    pub async fn fetch_items(&self, driver: &mut dyn Driver) -> Result<Vec<Item>, HarvestError> {
        let rows = driver.find_elements(&self.spec.locator).await?;
        let rows = skip_rows(rows, self.spec.skip_rows);
        let items = match self.spec.merge_group {
            Some(size) => merge_groups(&rows, size)
                .into_iter()
                .enumerate()
                .map(|(index, group)| Item {
                    index,
                    node: ItemNode::Group(group),
                })
                .collect(),
            None => rows
                .into_iter()
                .enumerate()
                .map(|(index, element)| Item::single(index, element))
                .collect(),
        };
        Ok(items)
    }
}
