//! Harvest Engine: executes the effects of the core state machine against a
//! driver session, one at a time.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use harvester_core::{
    update, DiagnosticSwitches, Effect, HarvestState, JobConfig, Msg, NavReason, Phase, RunPolicy,
};
use tokio_util::sync::CancellationToken;

use crate::driver::Driver;
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::hooks::{HarvestHooks, NoHooks};
use crate::item::ItemProcessor;
use crate::list::{Item, ListExtractor};
use crate::navigator::PageNavigator;
use crate::progress::ProgressStore;
use crate::store::RecordStore;
use crate::{EngineEvent, HarvestError, RunSummary};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Results of a diagnostic dry-run; `None` for sub-operations that were not
/// selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub current_page: Option<u32>,
    pub went_to_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub list_len: Option<usize>,
    pub first_item_id: Option<String>,
    pub first_item_data: Option<Vec<String>>,
}

pub struct HarvestEngine {
    config: JobConfig,
    driver: Box<dyn Driver>,
    store: Arc<dyn RecordStore>,
    hooks: Arc<dyn HarvestHooks>,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn ProgressSink>,
    progress: ProgressStore,
    cancel: CancellationToken,
    state: Option<HarvestState>,
}

/// Borrowed view of the engine used while the driver is mutably borrowed.
struct Session<'a> {
    config: &'a JobConfig,
    navigator: PageNavigator<'a>,
    list: ListExtractor<'a>,
    items: ItemProcessor<'a>,
    sink: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

enum ItemOutcome {
    Saved(String),
    Skipped(String),
}

impl HarvestEngine {
    pub fn new(
        config: JobConfig,
        driver: Box<dyn Driver>,
        store: Arc<dyn RecordStore>,
        progress: ProgressStore,
    ) -> Result<Self, HarvestError> {
        config.validate()?;
        Ok(Self {
            config,
            driver,
            store,
            hooks: Arc::new(NoHooks),
            fetcher: Arc::new(ReqwestFetcher::new(FetchSettings::default())),
            sink: Arc::new(NullSink),
            progress,
            cancel: CancellationToken::new(),
            state: None,
        })
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn HarvestHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run cooperatively when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// State as of the last effect executed; `None` before `run` loaded it.
    pub fn state(&self) -> Option<&HarvestState> {
        self.state.as_ref()
    }

    /// Persist the current state. Does nothing before a state was loaded.
    pub fn save(&self) -> Result<(), HarvestError> {
        if let Some(state) = &self.state {
            self.progress.save(state)?;
        }
        Ok(())
    }

    /// Walk every page from the resume point to the last one.
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let state = self.progress.load()?;
        engine_info!(
            "Loaded state: last page {}, {} rework page(s)",
            state.last_run_page(),
            state.rework_pages().len()
        );
        self.state = Some(state.clone());

        let mut summary = RunSummary::default();
        let session = Session {
            config: &self.config,
            navigator: PageNavigator::new(&self.config),
            list: ListExtractor::new(&self.config.list),
            items: ItemProcessor::new(
                &self.config,
                self.store.as_ref(),
                self.hooks.as_ref(),
                self.fetcher.as_ref(),
            ),
            sink: self.sink.as_ref(),
            cancel: &self.cancel,
        };
        let driver = self.driver.as_mut();
        let progress = &self.progress;

        let mut state = state;
        let mut queue: VecDeque<Effect> = VecDeque::new();
        if pause(session.cancel, self.config.timing.startup_delay()).await {
            let total = session.navigator.total_pages(driver).await?;
            let current = session.navigator.current_page(driver).await?;
            engine_info!(
                "last page: {}, current page: {current}, pages: {total}",
                state.last_run_page()
            );
            let (next, effects) = update(
                state,
                Msg::PagesDetected {
                    total,
                    current,
                    policy: RunPolicy::from(&self.config),
                },
            );
            state = next;
            session.sink.emit(EngineEvent::Started {
                current_page: state.current_page(),
                total_pages: state.total_pages(),
            });
            queue.extend(effects);
        } else {
            let (next, effects) = update(state, Msg::StopRequested);
            state = next;
            queue.extend(effects);
        }

        while let Some(effect) = queue.pop_front() {
            let msg = match effect {
                Effect::NavigateTo { page, reason } => {
                    Some(navigate(&session, driver, page, reason).await)
                }
                Effect::ProcessPage { page } => {
                    if session.cancel.is_cancelled() {
                        Some(Msg::StopRequested)
                    } else {
                        match session.list.fetch_items(driver).await {
                            Ok(items) => {
                                let (next, effects) = update(
                                    state,
                                    Msg::ListFetched {
                                        page,
                                        items: items.len(),
                                    },
                                );
                                state = next;
                                queue.extend(effects);
                                Some(process_items(&session, driver, page, items, &mut summary).await)
                            }
                            Err(err) => {
                                engine_error!("listFetch -> getList rework : {page}, {err}");
                                Some(Msg::ListFailed { page })
                            }
                        }
                    }
                }
                Effect::Backoff { seconds } => {
                    engine_warn!("fetch item error, sleep {seconds}s to continue");
                    session.sink.emit(EngineEvent::BackoffStarted { seconds });
                    if pause(session.cancel, Duration::from_secs(seconds)).await {
                        Some(Msg::BackoffElapsed)
                    } else {
                        Some(Msg::StopRequested)
                    }
                }
                Effect::ReopenSession => {
                    engine_warn!(
                        "Reopening driver session (recovery {})",
                        state.session_recoveries()
                    );
                    if let Err(err) = driver.reopen().await {
                        engine_error!("Could not reopen driver session: {err}");
                    }
                    session.sink.emit(EngineEvent::SessionRecovered {
                        page: state.current_page(),
                        recoveries: state.session_recoveries(),
                    });
                    None
                }
                Effect::SaveProgress => {
                    progress.save(&state)?;
                    None
                }
                Effect::Finish => {
                    engine_info!("All {} page(s) processed", state.total_pages());
                    summary.finished = true;
                    None
                }
                Effect::GiveUp { recoveries } => {
                    self.state = Some(state);
                    return Err(HarvestError::Session(format!(
                        "gave up after {recoveries} consecutive session recoveries"
                    )));
                }
            };
            if let Some(msg) = msg {
                let (next, effects) = update(state, msg);
                state = next;
                queue.extend(effects);
            }
        }

        summary.stopped = state.phase() == Phase::Stopped;
        summary.rework_pages = state.pending_rework_pages();
        if summary.stopped {
            engine_info!("Stopped at page {}; progress saved", state.current_page());
        }
        session.sink.emit(EngineEvent::Finished(summary.clone()));
        self.state = Some(state);
        Ok(summary)
    }

    /// Run the selected sub-operations once, in order, and report what each
    /// produced. Progress files are neither read nor written.
    pub async fn diagnose(
        &mut self,
        switches: DiagnosticSwitches,
    ) -> Result<DiagnosticReport, HarvestError> {
        let mut report = DiagnosticReport::default();
        let navigator = PageNavigator::new(&self.config);
        let list = ListExtractor::new(&self.config.list);
        let items = ItemProcessor::new(
            &self.config,
            self.store.as_ref(),
            self.hooks.as_ref(),
            self.fetcher.as_ref(),
        );
        let driver = self.driver.as_mut();

        let mut current = 1;
        if switches.current_page {
            engine_info!("run test for getCurrentPage:");
            current = navigator.current_page(driver).await?;
            engine_info!("GetCurrentPage done: {current}");
            report.current_page = Some(current);
        }
        if switches.go_page {
            let target = current + 2;
            engine_info!("run test for goPage: {target}");
            navigator.go_to(driver, target).await?;
            engine_info!("goPage ok");
            report.went_to_page = Some(target);
            current = target;
        }
        if switches.page_count {
            engine_info!("run test for GetPages:");
            let total = navigator.total_pages(driver).await?;
            engine_info!("getPages ok: {total}");
            report.total_pages = Some(total);
        }

        let mut fetched: Option<Vec<Item>> = None;
        if switches.list {
            engine_info!("run test for getListData:");
            let found = list.fetch_items(driver).await?;
            engine_info!("getListData ok : {}", found.len());
            report.list_len = Some(found.len());
            fetched = Some(found);
        }
        if !(switches.item_id || switches.item_data) {
            return Ok(report);
        }

        let found = match fetched {
            Some(found) => found,
            None => list.fetch_items(driver).await?,
        };
        let first = found
            .first()
            .ok_or_else(|| HarvestError::Parse("list is empty".into()))?;
        let id = items.resolve_id(driver, first, current).await?;
        if switches.item_id {
            engine_info!("getItemId ok : {id}");
            report.first_item_id = Some(id.clone());
        }
        if switches.item_data {
            let data = items.fetch_payload(driver, first, &id).await?;
            engine_info!("getItemData ok : {data:?}");
            report.first_item_data = Some(data);
        }
        engine_info!("test end.");
        Ok(report)
    }
}

async fn navigate(
    session: &Session<'_>,
    driver: &mut dyn Driver,
    page: u32,
    reason: NavReason,
) -> Msg {
    if session.cancel.is_cancelled() {
        return Msg::StopRequested;
    }
    if let Err(err) = session.navigator.go_to(driver, page).await {
        engine_error!("listFetch -> goNext : page {page} ({reason:?}): {err}");
        return Msg::NavigationFailed { page };
    }
    if reason != NavReason::Resume && !pause(session.cancel, session.config.timing.list_interval()).await
    {
        return Msg::StopRequested;
    }
    Msg::NavigationSucceeded { page }
}

async fn process_items(
    session: &Session<'_>,
    driver: &mut dyn Driver,
    page: u32,
    mut items: Vec<Item>,
    summary: &mut RunSummary,
) -> Msg {
    let count = items.len();
    engine_info!("fetch list data : length {count}, page {page}");
    session.sink.emit(EngineEvent::PageStarted { page, items: count });

    let refetch = session
        .config
        .item_data
        .extra
        .as_ref()
        .is_some_and(|extra| extra.invalidates_list());
    let (mut saved, mut skipped, mut unresolved) = (0, 0, 0);

    for index in 0..count {
        if session.cancel.is_cancelled() {
            return Msg::StopRequested;
        }
        if refetch && index > 0 {
            match session.list.fetch_items(driver).await {
                Ok(fresh) => items = fresh,
                Err(err) => engine_warn!("Could not re-fetch list before item {index}: {err}"),
            }
        }
        let result = match items.get(index) {
            Some(item) => process_item(session, driver, item, page).await,
            None => Err(HarvestError::Session(format!(
                "item {index} disappeared from the list"
            ))),
        };
        match result {
            Ok(ItemOutcome::Saved(id)) => {
                saved += 1;
                session.sink.emit(EngineEvent::ItemSaved { page, id });
                if !pause(session.cancel, session.config.timing.item_interval()).await {
                    return Msg::StopRequested;
                }
            }
            Ok(ItemOutcome::Skipped(id)) => {
                engine_warn!("item data has saved : {id}");
                skipped += 1;
                session.sink.emit(EngineEvent::ItemSkipped { page, id });
            }
            Err(err) => {
                engine_error!("item {index} on page {page} unresolved: {err}");
                unresolved += 1;
                session.sink.emit(EngineEvent::ItemUnresolved {
                    page,
                    index,
                    reason: err.to_string(),
                });
            }
        }
    }

    if unresolved > 0 {
        engine_warn!("Page {page}: {unresolved} of {count} item(s) unresolved, queued for rework");
    }
    summary.pages_processed += 1;
    summary.items_saved += saved;
    summary.items_skipped += skipped;
    summary.items_unresolved += unresolved;
    session.sink.emit(EngineEvent::PageFinished {
        page,
        saved,
        skipped,
        unresolved,
    });
    Msg::PageProcessed {
        page,
        items: count,
        unresolved,
    }
}

async fn process_item(
    session: &Session<'_>,
    driver: &mut dyn Driver,
    item: &Item,
    page: u32,
) -> Result<ItemOutcome, HarvestError> {
    let id = session.items.resolve_id(driver, item, page).await?;
    if session.items.is_complete(&id).await? {
        return Ok(ItemOutcome::Skipped(id));
    }
    engine_debug!("Fetching payload for {id}");
    let fields = session.items.fetch_payload(driver, item, &id).await?;
    session.items.persist(&id, fields).await?;
    Ok(ItemOutcome::Saved(id))
}

/// Sleep for `duration`; `false` if cancelled first.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
