//! Browser-driver seam.
//!
//! The engine owns exactly one session and drives it strictly sequentially,
//! so every operation takes `&mut self`.
use harvester_core::Locator;
use serde_json::Value;
use thiserror::Error;

use crate::types::FetchError;

/// Opaque reference to an element in the driver's current document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("stale element reference: {0}")]
    StaleElement(String),
    #[error("operation not supported by this driver: {0}")]
    Unsupported(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("session error: {0}")]
    Session(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[async_trait::async_trait]
pub trait Driver: Send {
    /// Elements matching `locator` anywhere in the current document.
    async fn find_elements(&mut self, locator: &Locator)
        -> Result<Vec<ElementHandle>, DriverError>;

    /// Descendants of `parent` matching `locator`.
    async fn find_elements_in(
        &mut self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String, DriverError>;

    async fn read_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn tag_name(&mut self, element: &ElementHandle) -> Result<String, DriverError>;

    async fn clear(&mut self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Type into `element`; with `submit` the input is submitted afterwards.
    async fn type_text(
        &mut self,
        element: &ElementHandle,
        text: &str,
        submit: bool,
    ) -> Result<(), DriverError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Run `script` in page context; `args` are exposed as `arguments`.
    async fn execute_script(&mut self, script: &str, args: Vec<Value>)
        -> Result<Value, DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;

    async fn navigate_to(&mut self, url: &str) -> Result<(), DriverError>;

    async fn navigate_back(&mut self) -> Result<(), DriverError>;

    async fn tab_count(&mut self) -> Result<usize, DriverError>;

    async fn switch_to_newest_tab(&mut self) -> Result<(), DriverError>;

    async fn close_current_tab(&mut self) -> Result<(), DriverError>;

    /// Close every tab but the first and switch back to it.
    async fn close_extra_tabs(&mut self) -> Result<(), DriverError>;

    /// Discard the session and open a fresh one at the start location.
    async fn reopen(&mut self) -> Result<(), DriverError>;
}

/// The single element `locator` matches, or `AmbiguousElement`.
pub(crate) async fn find_single(
    driver: &mut dyn Driver,
    parent: Option<&ElementHandle>,
    locator: &Locator,
) -> Result<ElementHandle, crate::HarvestError> {
    let mut found = match parent {
        Some(parent) => driver.find_elements_in(parent, locator).await?,
        None => driver.find_elements(locator).await?,
    };
    if found.len() != 1 {
        return Err(crate::HarvestError::ambiguous(locator, found.len()));
    }
    Ok(found.remove(0))
}

/// Anchors yield their `href`, everything else its text.
pub(crate) async fn link_or_text(
    driver: &mut dyn Driver,
    element: &ElementHandle,
) -> Result<String, DriverError> {
    if driver.tag_name(element).await?.eq_ignore_ascii_case("a") {
        if let Some(href) = driver.read_attribute(element, "href").await? {
            return Ok(href);
        }
    }
    driver.read_text(element).await
}
