use crate::driver::Driver;
use crate::list::Item;
use crate::store::Record;
use crate::HarvestError;

/// Site-specific overrides. Every resolver hook may decline with `Ok(None)`,
/// in which case the configured strategy is used.
#[async_trait::async_trait]
pub trait HarvestHooks: Send + Sync {
    /// Item id, consulted first. Required for `ItemIdSpec::ExternalHook`.
    async fn item_id(
        &self,
        _driver: &mut dyn Driver,
        _item: &Item,
    ) -> Result<Option<String>, HarvestError> {
        Ok(None)
    }

    /// Full payload for an item, replacing the configured extraction.
    async fn item_data(
        &self,
        _driver: &mut dyn Driver,
        _item: &Item,
        _id: &str,
    ) -> Result<Option<Vec<String>>, HarvestError> {
        Ok(None)
    }

    /// Content collected after an in-page reveal configured with `RevealResult::Hook`.
    async fn reveal_content(
        &self,
        _driver: &mut dyn Driver,
        _id: &str,
    ) -> Result<Option<Vec<String>>, HarvestError> {
        Ok(None)
    }

    /// Whether a stored record still counts as done.
    fn is_complete(&self, _record: &Record) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl HarvestHooks for NoHooks {}
