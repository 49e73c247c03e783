//! A `Driver` for server-rendered listings: pages are downloaded with a
//! `Fetcher` and queried with `scraper`. Nothing is executed, so scripts,
//! typing and extra tabs are unsupported.
use std::sync::Arc;

use harvester_core::{Locator, LocatorKind};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use crate::decode::decode_body;
use crate::driver::{Driver, DriverError, ElementHandle};
use crate::fetch::Fetcher;

#[derive(Debug, Clone)]
struct Page {
    url: Url,
    html: String,
}

pub struct StaticHtmlDriver {
    fetcher: Arc<dyn Fetcher>,
    start_url: String,
    current: Option<Page>,
    history: Vec<Page>,
    /// Bumped on every navigation; handles from older documents are stale.
    generation: u64,
}

impl StaticHtmlDriver {
    /// Load `start_url` and return a driver positioned on it.
    pub async fn open(
        fetcher: Arc<dyn Fetcher>,
        start_url: impl Into<String>,
    ) -> Result<Self, DriverError> {
        let mut driver = Self {
            fetcher,
            start_url: start_url.into(),
            current: None,
            history: Vec::new(),
            generation: 0,
        };
        driver.reopen().await?;
        Ok(driver)
    }

    async fn load(&self, url: &str) -> Result<Page, DriverError> {
        let target = match &self.current {
            Some(page) => page.url.join(url),
            None => Url::parse(url),
        }
        .map_err(|err| DriverError::Session(format!("bad url {url:?}: {err}")))?;

        let output = self.fetcher.fetch(target.as_str()).await?;
        let decoded = decode_body(&output.bytes, output.metadata.content_type.as_deref())
            .map_err(|err| DriverError::Session(err.to_string()))?;
        let url = Url::parse(&output.metadata.final_url).unwrap_or(target);
        Ok(Page {
            url,
            html: decoded.text,
        })
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.current
            .as_ref()
            .ok_or_else(|| DriverError::Session("no page loaded".into()))
    }

    fn handle(&self, index: usize) -> ElementHandle {
        ElementHandle(format!("{}:{index}", self.generation))
    }

    fn index_of(&self, handle: &ElementHandle) -> Result<usize, DriverError> {
        let (generation, index) = handle
            .as_str()
            .split_once(':')
            .and_then(|(g, i)| Some((g.parse::<u64>().ok()?, i.parse::<usize>().ok()?)))
            .ok_or_else(|| DriverError::NoSuchElement(handle.as_str().to_string()))?;
        if generation != self.generation {
            return Err(DriverError::StaleElement(handle.as_str().to_string()));
        }
        Ok(index)
    }

    /// Run `f` against the element behind `handle` in a freshly parsed document.
    fn with_element<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(ElementRef<'_>, &Url) -> T,
    ) -> Result<T, DriverError> {
        let index = self.index_of(handle)?;
        let page = self.page()?;
        let document = Html::parse_document(&page.html);
        let element = elements(&document)
            .into_iter()
            .nth(index)
            .ok_or_else(|| DriverError::NoSuchElement(handle.as_str().to_string()))?;
        Ok(f(element, &page.url))
    }

    fn locate(
        &self,
        parent: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let parent_index = parent.map(|p| self.index_of(p)).transpose()?;
        let matcher = Matcher::new(locator)?;
        let page = self.page()?;
        let document = Html::parse_document(&page.html);
        let all = elements(&document);

        let scope: Vec<ElementRef<'_>> = match parent_index {
            Some(index) => {
                let parent = all.get(index).copied().ok_or_else(|| {
                    DriverError::NoSuchElement(format!("{}:{index}", self.generation))
                })?;
                parent
                    .descendants()
                    .skip(1)
                    .filter_map(ElementRef::wrap)
                    .collect()
            }
            None => all.clone(),
        };

        let indices = scope
            .into_iter()
            .filter(|element| matcher.matches(element))
            .filter_map(|element| all.iter().position(|e| e.id() == element.id()))
            .map(|index| self.handle(index))
            .collect();
        Ok(indices)
    }

    fn enter(&mut self, page: Page) {
        if let Some(previous) = self.current.replace(page) {
            self.history.push(previous);
        }
        self.generation += 1;
    }
}

enum Matcher {
    Css(Selector),
    Id(String),
}

impl Matcher {
    fn new(locator: &Locator) -> Result<Self, DriverError> {
        match locator.kind {
            LocatorKind::Css => Selector::parse(&locator.value)
                .map(Matcher::Css)
                .map_err(|err| DriverError::Session(format!("bad selector {locator}: {err}"))),
            LocatorKind::Id => Ok(Matcher::Id(locator.value.clone())),
            LocatorKind::XPath => Err(DriverError::Unsupported(format!(
                "xpath locator {locator}"
            ))),
        }
    }

    fn matches(&self, element: &ElementRef<'_>) -> bool {
        match self {
            Matcher::Css(selector) => selector.matches(element),
            Matcher::Id(id) => element.value().id() == Some(id.as_str()),
        }
    }
}

/// Every element of the document in document order.
fn elements(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[async_trait::async_trait]
impl Driver for StaticHtmlDriver {
    async fn find_elements(
        &mut self,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        self.locate(None, locator)
    }

    async fn find_elements_in(
        &mut self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        self.locate(Some(parent), locator)
    }

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String, DriverError> {
        self.with_element(element, |e, _| element_text(e))
    }

    async fn read_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.with_element(element, |e, base| {
            let value = e.value().attr(name)?;
            // Browsers report resolved link targets.
            if matches!(name, "href" | "src") {
                if let Ok(resolved) = base.join(value) {
                    return Some(resolved.to_string());
                }
            }
            Some(value.to_string())
        })
    }

    async fn tag_name(&mut self, element: &ElementHandle) -> Result<String, DriverError> {
        self.with_element(element, |e, _| e.value().name().to_string())
    }

    async fn clear(&mut self, _element: &ElementHandle) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("clear".into()))
    }

    async fn type_text(
        &mut self,
        _element: &ElementHandle,
        _text: &str,
        _submit: bool,
    ) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("type_text".into()))
    }

    /// Only anchors can be clicked: the driver follows their `href`.
    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        let href = self
            .with_element(element, |e, _| {
                e.value()
                    .name()
                    .eq_ignore_ascii_case("a")
                    .then(|| e.value().attr("href").map(str::to_string))
                    .flatten()
            })?
            .ok_or_else(|| DriverError::Unsupported("click on a non-link element".into()))?;
        self.navigate_to(&href).await
    }

    async fn execute_script(
        &mut self,
        _script: &str,
        _args: Vec<Value>,
    ) -> Result<Value, DriverError> {
        Err(DriverError::Unsupported("execute_script".into()))
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.page()?.url.to_string())
    }

    async fn navigate_to(&mut self, url: &str) -> Result<(), DriverError> {
        let page = self.load(url).await?;
        self.enter(page);
        Ok(())
    }

    async fn navigate_back(&mut self) -> Result<(), DriverError> {
        let previous = self
            .history
            .pop()
            .ok_or_else(|| DriverError::Session("no previous page".into()))?;
        self.current = Some(previous);
        self.generation += 1;
        Ok(())
    }

    async fn tab_count(&mut self) -> Result<usize, DriverError> {
        Ok(1)
    }

    async fn switch_to_newest_tab(&mut self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("tabs".into()))
    }

    async fn close_current_tab(&mut self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("tabs".into()))
    }

    async fn close_extra_tabs(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn reopen(&mut self) -> Result<(), DriverError> {
        self.current = None;
        self.history.clear();
        let start = self.start_url.clone();
        let page = self.load(&start).await?;
        self.enter(page);
        Ok(())
    }
}
