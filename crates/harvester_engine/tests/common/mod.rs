#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Once};

use harvester_core::{
    DiagnosticSwitches, ExtractionPattern, ItemDataSpec, ItemIdSpec, JobConfig, ListLocatorSpec,
    Locator, LocatorKind, NavigationSpec, PageNumberSpec, Timing,
};
use harvester_engine::{
    Driver, DriverError, ElementHandle, EngineEvent, ProgressSink, Record, RecordStore,
    StoreError,
};
use serde_json::Value;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub const LIST_URL: &str = "https://fake.test/list?page=";
pub const ITEM_URL: &str = "https://fake.test/item/";

/// One row of a fake listing.
#[derive(Debug, Clone)]
pub struct FakeRow {
    /// Text of the row's `a.id` child; `None` leaves the child out.
    pub id: Option<String>,
    pub fields: Vec<String>,
    /// Reading any field cell fails.
    pub broken: bool,
}

impl FakeRow {
    pub fn ok(id: &str, fields: &[&str]) -> Self {
        Self {
            id: Some(id.to_string()),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            broken: false,
        }
    }

    pub fn broken(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            fields: vec!["x".into()],
            broken: true,
        }
    }

    pub fn without_id() -> Self {
        Self {
            id: None,
            fields: vec!["x".into()],
            broken: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct DriverLog {
    pub navigations: Vec<String>,
    pub reopens: usize,
    pub field_reads: usize,
    pub clicks: Vec<String>,
    pub typed: Vec<String>,
    pub scripts: Vec<String>,
    pub backs: usize,
    pub tabs_closed: usize,
}

/// What clicking a row, or its `a.id` child, does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailView {
    Nothing,
    NewTab,
    /// Replaces the listing until `navigate_back`.
    SameTab,
}

/// In-memory paginated site.
///
/// Supported locators: css `.total`, `tr`, `input.page` and `button.go` on the
/// listing, css `a.id` and `td` under a row, and css `.detail` on a row's
/// detail view. Handles embed the document they came from, so using one after
/// navigating away yields `StaleElement`.
///
/// A detail view holds a `span` reading `about {id}` with `data-code` set to
/// `code-{id}`, followed by an anchor to `{ITEM_URL}{id}`.
pub struct FakeDriver {
    pub pages: BTreeMap<u32, Vec<FakeRow>>,
    pub current: u32,
    /// Remaining navigation attempts to ignore, per target page.
    pub ignore_navigation: HashMap<u32, usize>,
    pub detail_view: DetailView,
    /// Page-context navigation function and how many existence checks fail
    /// before it is defined.
    pub page_function: Option<(String, usize)>,
    pub log: Arc<Mutex<DriverLog>>,
    documents: u32,
    detail: Option<usize>,
    detail_tab: Option<usize>,
    on_detail_tab: bool,
    typed: String,
    function_checks: usize,
}

impl FakeDriver {
    pub fn new(pages: Vec<Vec<FakeRow>>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, rows)| (i as u32 + 1, rows))
                .collect(),
            current: 1,
            ignore_navigation: HashMap::new(),
            detail_view: DetailView::Nothing,
            page_function: None,
            log: Arc::new(Mutex::new(DriverLog::default())),
            documents: 0,
            detail: None,
            detail_tab: None,
            on_detail_tab: false,
            typed: String::new(),
            function_checks: 0,
        }
    }

    pub fn ignoring_navigation_to(mut self, page: u32, times: usize) -> Self {
        self.ignore_navigation.insert(page, times);
        self
    }

    pub fn with_detail_view(mut self, view: DetailView) -> Self {
        self.detail_view = view;
        self
    }

    pub fn with_page_function(mut self, name: &str, undefined_for: usize) -> Self {
        self.page_function = Some((name.to_string(), undefined_for));
        self
    }

    pub fn log(&self) -> Arc<Mutex<DriverLog>> {
        self.log.clone()
    }

    fn stamp(&self) -> String {
        format!("{}.{}", self.current, self.documents)
    }

    fn shown_detail(&self) -> Option<usize> {
        if self.on_detail_tab {
            self.detail_tab
        } else {
            self.detail
        }
    }

    fn rows(&self) -> &[FakeRow] {
        self.pages.get(&self.current).map(Vec::as_slice).unwrap_or(&[])
    }

    fn parse(&self, handle: &ElementHandle) -> Result<Vec<String>, DriverError> {
        let parts: Vec<String> = handle.as_str().split(':').map(str::to_string).collect();
        match parts.get(1) {
            Some(stamp) if *stamp == self.stamp() => Ok(parts),
            Some(_) => Err(DriverError::StaleElement(handle.as_str().into())),
            None => Err(DriverError::NoSuchElement(handle.as_str().into())),
        }
    }

    fn row_index(parts: &[String]) -> Result<usize, DriverError> {
        parts
            .get(2)
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| DriverError::NoSuchElement(parts.join(":")))
    }

    fn row(&self, parts: &[String]) -> Result<&FakeRow, DriverError> {
        let index = Self::row_index(parts)?;
        self.rows()
            .get(index)
            .ok_or_else(|| DriverError::NoSuchElement(parts.join(":")))
    }

    fn row_id(&self, parts: &[String]) -> Result<String, DriverError> {
        Ok(self.row(parts)?.id.clone().unwrap_or_default())
    }

    fn show_page(&mut self, page: u32) -> Result<(), DriverError> {
        if let Some(remaining) = self.ignore_navigation.get_mut(&page) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(());
            }
        }
        self.current = page;
        self.detail = None;
        self.documents += 1;
        Ok(())
    }

    fn submit_typed(&mut self) -> Result<(), DriverError> {
        let page = self
            .typed
            .parse()
            .map_err(|_| DriverError::Session(format!("not a page number: {:?}", self.typed)))?;
        self.show_page(page)
    }
}

#[async_trait::async_trait]
impl Driver for FakeDriver {
    async fn find_elements(
        &mut self,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let stamp = self.stamp();
        if let Some(row) = self.shown_detail() {
            return Ok(match locator.value.as_str() {
                ".detail" => vec![
                    ElementHandle::new(format!("detail:{stamp}:{row}")),
                    ElementHandle::new(format!("dlink:{stamp}:{row}")),
                ],
                _ => Vec::new(),
            });
        }
        Ok(match locator.value.as_str() {
            ".total" => vec![ElementHandle::new(format!("total:{stamp}"))],
            "tr" => (0..self.rows().len())
                .map(|i| ElementHandle::new(format!("row:{stamp}:{i}")))
                .collect(),
            "input.page" => vec![ElementHandle::new(format!("input:{stamp}"))],
            "button.go" => vec![ElementHandle::new(format!("button:{stamp}"))],
            _ => Vec::new(),
        })
    }

    async fn find_elements_in(
        &mut self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let parts = self.parse(parent)?;
        let row = self.row(&parts)?;
        let (stamp, index) = (&parts[1], &parts[2]);
        Ok(match locator.value.as_str() {
            "a.id" if row.id.is_some() => vec![ElementHandle::new(format!("id:{stamp}:{index}"))],
            "td" => (0..row.fields.len())
                .map(|j| ElementHandle::new(format!("td:{stamp}:{index}:{j}")))
                .collect(),
            _ => Vec::new(),
        })
    }

    async fn read_text(&mut self, element: &ElementHandle) -> Result<String, DriverError> {
        let parts = self.parse(element)?;
        match parts[0].as_str() {
            "total" => Ok(format!("{} pages", self.pages.len())),
            "row" => Ok(self.row(&parts)?.fields.join(" ")),
            "id" => self.row_id(&parts),
            "td" => {
                self.log.lock().unwrap().field_reads += 1;
                let row = self.row(&parts)?;
                if row.broken {
                    return Err(DriverError::Session("cell vanished".into()));
                }
                let j: usize = parts[3].parse().unwrap();
                Ok(row.fields[j].clone())
            }
            "detail" => Ok(format!("about {}", self.row_id(&parts)?)),
            "dlink" => Ok("details".to_string()),
            _ => Err(DriverError::NoSuchElement(element.as_str().into())),
        }
    }

    async fn read_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let parts = self.parse(element)?;
        Ok(match (parts[0].as_str(), name) {
            ("dlink", "href") => Some(format!("{ITEM_URL}{}", self.row_id(&parts)?)),
            ("detail", "data-code") => Some(format!("code-{}", self.row_id(&parts)?)),
            _ => None,
        })
    }

    async fn tag_name(&mut self, element: &ElementHandle) -> Result<String, DriverError> {
        let parts = self.parse(element)?;
        Ok(match parts[0].as_str() {
            "row" => "tr",
            "td" => "td",
            "dlink" => "a",
            "input" => "input",
            "button" => "button",
            _ => "span",
        }
        .to_string())
    }

    async fn clear(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        if self.parse(element)?[0] == "input" {
            self.typed.clear();
        }
        Ok(())
    }

    async fn type_text(
        &mut self,
        element: &ElementHandle,
        text: &str,
        submit: bool,
    ) -> Result<(), DriverError> {
        self.parse(element)?;
        self.log.lock().unwrap().typed.push(text.to_string());
        self.typed.push_str(text);
        if submit {
            self.submit_typed()?;
        }
        Ok(())
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        let parts = self.parse(element)?;
        self.log
            .lock()
            .unwrap()
            .clicks
            .push(element.as_str().to_string());
        match parts[0].as_str() {
            "button" => self.submit_typed(),
            "row" | "id" => {
                let row = Self::row_index(&parts)?;
                match self.detail_view {
                    DetailView::Nothing => {}
                    DetailView::NewTab => self.detail_tab = Some(row),
                    DetailView::SameTab => {
                        self.detail = Some(row);
                        self.documents += 1;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn execute_script(
        &mut self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Value, DriverError> {
        self.log.lock().unwrap().scripts.push(script.to_string());
        let Some((name, undefined_for)) = self.page_function.clone() else {
            return Err(DriverError::Unsupported("scripts".into()));
        };
        if script == format!("return typeof {name} === 'function';") {
            self.function_checks += 1;
            return Ok(Value::Bool(self.function_checks > undefined_for));
        }
        if script == format!("{name}(arguments[0]);") {
            let page = args
                .first()
                .and_then(Value::as_u64)
                .ok_or_else(|| DriverError::Script("missing page argument".into()))?;
            self.show_page(page as u32)?;
            return Ok(Value::Null);
        }
        Err(DriverError::Script(format!("unknown script {script}")))
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(format!("{LIST_URL}{}", self.current))
    }

    async fn navigate_to(&mut self, url: &str) -> Result<(), DriverError> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        let page: u32 = url
            .strip_prefix(LIST_URL)
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| DriverError::Session(format!("unknown url {url}")))?;
        self.show_page(page)
    }

    async fn navigate_back(&mut self) -> Result<(), DriverError> {
        self.log.lock().unwrap().backs += 1;
        if self.detail.take().is_some() {
            self.documents += 1;
        }
        Ok(())
    }

    async fn tab_count(&mut self) -> Result<usize, DriverError> {
        Ok(1 + usize::from(self.detail_tab.is_some()))
    }

    async fn switch_to_newest_tab(&mut self) -> Result<(), DriverError> {
        self.on_detail_tab = self.detail_tab.is_some();
        Ok(())
    }

    async fn close_current_tab(&mut self) -> Result<(), DriverError> {
        if !self.on_detail_tab {
            return Err(DriverError::Session("cannot close the listing tab".into()));
        }
        self.log.lock().unwrap().tabs_closed += 1;
        self.detail_tab = None;
        self.on_detail_tab = false;
        Ok(())
    }

    async fn close_extra_tabs(&mut self) -> Result<(), DriverError> {
        if self.detail_tab.take().is_some() {
            self.log.lock().unwrap().tabs_closed += 1;
        }
        self.on_detail_tab = false;
        Ok(())
    }

    async fn reopen(&mut self) -> Result<(), DriverError> {
        self.log.lock().unwrap().reopens += 1;
        self.current = 1;
        self.detail = None;
        self.detail_tab = None;
        self.on_detail_tab = false;
        self.documents += 1;
        Ok(())
    }
}

/// Record store backed by a map; keeps every save in order.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<HashMap<String, Record>>,
    pub saves: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn with_records(records: &[Record]) -> Self {
        let store = Self::default();
        {
            let mut map = store.records.lock().unwrap();
            for record in records {
                map.insert(record.id.clone(), record.clone());
            }
        }
        store
    }

    pub fn saved_ids(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.records.lock().unwrap().get(id).cloned()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn save(&self, record: Record) -> Result<(), StoreError> {
        self.saves.lock().unwrap().push(record.id.clone());
        self.records.lock().unwrap().insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.get(id))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn backoffs(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::BackoffStarted { seconds } => Some(seconds),
                _ => None,
            })
            .collect()
    }

    pub fn pages_started(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::PageStarted { page, .. } => Some(page),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn fast_timing() -> Timing {
    Timing {
        list_interval_ms: 100,
        item_interval_ms: 10,
        poll_interval_ms: 10,
        poll_budget: 5,
        error_poll_cost: 2,
        startup_delay_ms: 0,
        reveal_settle_ms: 0,
    }
}

/// Job matching `FakeDriver`'s markup.
pub fn fake_job() -> JobConfig {
    JobConfig {
        page_count: PageNumberSpec::TextAt {
            locator: Locator::css(".total"),
            pattern: None,
        },
        current_page: PageNumberSpec::FromUrl {
            pattern: ExtractionPattern::new(r"page=(\d+)").unwrap(),
        },
        navigation: NavigationSpec::RewriteUrl {
            template: format!("{LIST_URL}#p"),
        },
        completion_check: None,
        list: ListLocatorSpec {
            locator: Locator::new(LocatorKind::Css, "tr"),
            skip_rows: 0,
            merge_group: None,
        },
        item_id: ItemIdSpec::ChildLocator {
            locator: Locator::css("a.id"),
            pattern: None,
            prefix_with_index: false,
        },
        item_data: ItemDataSpec {
            locator: Locator::css("td"),
            extra: None,
        },
        timing: fast_timing(),
        default_max_pages: 1,
        max_session_recoveries: 3,
        rework_pass: false,
        diagnostics: DiagnosticSwitches::default(),
    }
}
