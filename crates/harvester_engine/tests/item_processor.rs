mod common;

use common::{fake_job, init_logging, DetailView, FakeDriver, FakeRow, MemoryStore, ITEM_URL};
use harvester_core::{
    ExtraContentSpec, ExtraSource, ItemIdSpec, JobConfig, Locator, RevealResult, RevealTrigger,
};
use harvester_engine::{
    Driver, FetchSettings, HarvestError, HarvestHooks, Item, ItemProcessor, ListExtractor,
    NoHooks, Record, ReqwestFetcher,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rows() -> FakeDriver {
    FakeDriver::new(vec![vec![
        FakeRow::ok("A", &["a1"]),
        FakeRow::ok("B", &["b1"]),
        FakeRow::ok("C", &["c1"]),
    ]])
}

async fn items(config: &JobConfig, driver: &mut FakeDriver) -> Vec<Item> {
    ListExtractor::new(&config.list)
        .fetch_items(driver)
        .await
        .unwrap()
}

fn fetcher() -> ReqwestFetcher {
    ReqwestFetcher::new(FetchSettings::default())
}

/// Declines ids, serves payloads for one id and treats short records as incomplete.
struct SiteHooks;

#[async_trait::async_trait]
impl HarvestHooks for SiteHooks {
    async fn item_id(
        &self,
        _driver: &mut dyn Driver,
        item: &Item,
    ) -> Result<Option<String>, HarvestError> {
        Ok((item.index == 0).then(|| "hooked".to_string()))
    }

    async fn item_data(
        &self,
        _driver: &mut dyn Driver,
        _item: &Item,
        id: &str,
    ) -> Result<Option<Vec<String>>, HarvestError> {
        Ok((id == "hooked").then(Vec::new))
    }

    fn is_complete(&self, record: &Record) -> bool {
        record.data.len() > 1
    }
}

#[tokio::test]
async fn merged_rows_form_one_item_with_joined_id() {
    init_logging();
    let mut config = fake_job();
    config.list.merge_group = Some(2);
    let mut driver = rows();
    let store = MemoryStore::default();
    let (hooks, fetcher) = (NoHooks, fetcher());
    let processor = ItemProcessor::new(&config, &store, &hooks, &fetcher);

    let items = items(&config, &mut driver).await;
    assert_eq!(items.len(), 1);
    assert!(items[0].is_group());

    let id = processor.resolve_id(&mut driver, &items[0], 1).await.unwrap();
    assert_eq!(id, "a1_b1");
    let payload = processor
        .fetch_payload(&mut driver, &items[0], &id)
        .await
        .unwrap();
    assert_eq!(payload, vec!["a1".to_string(), "b1".to_string()]);
}

#[tokio::test]
async fn index_prefix_counts_after_skipped_rows() {
    init_logging();
    let mut config = fake_job();
    config.list.skip_rows = 1;
    config.item_id = ItemIdSpec::ChildLocator {
        locator: Locator::css("a.id"),
        pattern: None,
        prefix_with_index: true,
    };
    let mut driver = rows();
    let store = MemoryStore::default();
    let (hooks, fetcher) = (NoHooks, fetcher());
    let processor = ItemProcessor::new(&config, &store, &hooks, &fetcher);

    let mut ids = Vec::new();
    for item in items(&config, &mut driver).await {
        ids.push(processor.resolve_id(&mut driver, &item, 1).await.unwrap());
    }

    assert_eq!(ids, vec!["0_B".to_string(), "1_C".to_string()]);
}

#[tokio::test]
async fn page_number_strategy_uses_the_page() {
    init_logging();
    let mut config = fake_job();
    config.item_id = ItemIdSpec::PageNumber;
    let mut driver = rows();
    let store = MemoryStore::default();
    let (hooks, fetcher) = (NoHooks, fetcher());
    let processor = ItemProcessor::new(&config, &store, &hooks, &fetcher);

    let items = items(&config, &mut driver).await;
    let id = processor.resolve_id(&mut driver, &items[2], 7).await.unwrap();
    assert_eq!(id, "7");
}

#[tokio::test]
async fn external_hook_strategy_needs_a_hook() {
    init_logging();
    let mut config = fake_job();
    config.item_id = ItemIdSpec::ExternalHook;
    let mut driver = rows();
    let store = MemoryStore::default();
    let fetcher = fetcher();
    let items = items(&config, &mut driver).await;

    let processor = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    let err = processor
        .resolve_id(&mut driver, &items[0], 1)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Hook(_)));

    let processor = ItemProcessor::new(&config, &store, &SiteHooks, &fetcher);
    let id = processor.resolve_id(&mut driver, &items[0], 1).await.unwrap();
    assert_eq!(id, "hooked");
}

#[tokio::test]
async fn hook_payload_without_fields_is_empty_content() {
    init_logging();
    let config = fake_job();
    let mut driver = rows();
    let store = MemoryStore::default();
    let fetcher = fetcher();
    let processor = ItemProcessor::new(&config, &store, &SiteHooks, &fetcher);
    let items = items(&config, &mut driver).await;

    let err = processor
        .fetch_payload(&mut driver, &items[0], "hooked")
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::EmptyContent { ref id } if id == "hooked"));
}

#[tokio::test]
async fn completeness_hook_can_reopen_stored_records() {
    init_logging();
    let config = fake_job();
    let store = MemoryStore::with_records(&[
        Record::new("A", vec!["A".into()]),
        Record::new("B", vec!["B".into(), "b1".into()]),
    ]);
    let fetcher = fetcher();

    let default = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    assert!(default.is_complete("A").await.unwrap());
    assert!(!default.is_complete("Z").await.unwrap());

    let strict = ItemProcessor::new(&config, &store, &SiteHooks, &fetcher);
    assert!(!strict.is_complete("A").await.unwrap());
    assert!(strict.is_complete("B").await.unwrap());
}

#[tokio::test]
async fn remote_fetch_appends_selected_markup() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/detail/A"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<div><p class=\"desc\">first</p><p class=\"desc\">second\nline</p></div>",
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let mut config = fake_job();
    config.item_data.extra = Some(ExtraContentSpec {
        source: ExtraSource::RemoteFetch {
            url_template: format!("{}/detail/#p", server.uri()),
            params: vec![0],
            markup_rule: Some(".desc".to_string()),
        },
        replace_fields: false,
    });
    let mut driver = rows();
    let store = MemoryStore::default();
    let fetcher = fetcher();
    let processor = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    let items = items(&config, &mut driver).await;

    let payload = processor
        .fetch_payload(&mut driver, &items[0], "A")
        .await
        .unwrap();
    assert_eq!(
        payload,
        vec![
            "A".to_string(),
            "a1".to_string(),
            "first".to_string(),
            "second\\nline".to_string(),
        ]
    );

    if let Some(extra) = config.item_data.extra.as_mut() {
        extra.replace_fields = true;
    }
    let processor = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    let payload = processor
        .fetch_payload(&mut driver, &items[0], "A")
        .await
        .unwrap();
    assert_eq!(
        payload,
        vec!["A".to_string(), "first".to_string(), "second\\nline".to_string()]
    );
}

#[tokio::test]
async fn remote_fetch_rejects_missing_parameter_field() {
    init_logging();
    let mut config = fake_job();
    config.item_data.extra = Some(ExtraContentSpec {
        source: ExtraSource::RemoteFetch {
            url_template: "http://127.0.0.1:9/#p".to_string(),
            params: vec![5],
            markup_rule: None,
        },
        replace_fields: false,
    });
    let mut driver = rows();
    let store = MemoryStore::default();
    let fetcher = fetcher();
    let processor = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    let items = items(&config, &mut driver).await;

    let err = processor
        .fetch_payload(&mut driver, &items[0], "A")
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Validation(_)));
}

#[tokio::test]
async fn self_text_id_is_the_row_text_unchanged() {
    init_logging();
    let mut config = fake_job();
    config.item_id = ItemIdSpec::SelfText;
    let mut driver = FakeDriver::new(vec![vec![FakeRow::ok("A", &["Acme Corp", "2024/05"])]]);
    let store = MemoryStore::default();
    let fetcher = fetcher();
    let processor = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    let items = items(&config, &mut driver).await;

    let id = processor.resolve_id(&mut driver, &items[0], 1).await.unwrap();
    assert_eq!(id, "Acme Corp 2024/05");
}

fn reveal(trigger: RevealTrigger, opens_new_tab: bool, attribute: Option<&str>) -> ExtraContentSpec {
    ExtraContentSpec {
        source: ExtraSource::InPageReveal {
            trigger,
            opens_new_tab,
            result: RevealResult::Elements {
                locator: Locator::css(".detail"),
                attribute: attribute.map(str::to_string),
            },
        },
        replace_fields: false,
    }
}

#[tokio::test]
async fn reveal_in_new_tab_collects_detail_and_closes_the_tab() {
    init_logging();
    let mut config = fake_job();
    config.item_data.extra = Some(reveal(
        RevealTrigger::Child(Locator::css("a.id")),
        true,
        None,
    ));
    let mut driver = rows().with_detail_view(DetailView::NewTab);
    let log = driver.log();
    let store = MemoryStore::default();
    let fetcher = fetcher();
    let processor = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    let items = items(&config, &mut driver).await;

    let payload = processor
        .fetch_payload(&mut driver, &items[0], "A")
        .await
        .unwrap();

    assert_eq!(
        payload,
        vec![
            "A".to_string(),
            "a1".to_string(),
            "about A".to_string(),
            format!("{ITEM_URL}A"),
        ]
    );
    assert_eq!(driver.tab_count().await.unwrap(), 1);
    let log = log.lock().unwrap();
    assert_eq!(log.tabs_closed, 1);
    assert_eq!(log.backs, 0);
    assert_eq!(log.clicks.len(), 1);
    assert!(log.clicks[0].starts_with("id:"), "{:?}", log.clicks);
}

#[tokio::test]
async fn reveal_in_same_tab_reads_attribute_and_navigates_back() {
    init_logging();
    let mut config = fake_job();
    config.item_data.extra = Some(reveal(RevealTrigger::SelfItem, false, Some("data-code")));
    let mut driver = rows().with_detail_view(DetailView::SameTab);
    let log = driver.log();
    let store = MemoryStore::default();
    let fetcher = fetcher();
    let processor = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    let before = items(&config, &mut driver).await;

    let payload = processor
        .fetch_payload(&mut driver, &before[0], "A")
        .await
        .unwrap();

    // Anchors still yield their href when an attribute is configured.
    assert_eq!(
        payload,
        vec![
            "A".to_string(),
            "a1".to_string(),
            "code-A".to_string(),
            format!("{ITEM_URL}A"),
        ]
    );
    assert_eq!(log.lock().unwrap().backs, 1);

    // Back on the listing, the old handles are gone and fresh ones work.
    assert!(processor.resolve_id(&mut driver, &before[1], 1).await.is_err());
    let after = items(&config, &mut driver).await;
    let id = processor.resolve_id(&mut driver, &after[1], 1).await.unwrap();
    assert_eq!(id, "B");
}

#[tokio::test(start_paused = true)]
async fn reveal_waiting_for_a_tab_that_never_opens_fails() {
    init_logging();
    let mut config = fake_job();
    config.item_data.extra = Some(reveal(RevealTrigger::SelfItem, true, None));
    let mut driver = rows();
    let store = MemoryStore::default();
    let fetcher = fetcher();
    let processor = ItemProcessor::new(&config, &store, &NoHooks, &fetcher);
    let items = items(&config, &mut driver).await;

    let err = processor
        .fetch_payload(&mut driver, &items[0], "A")
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Session(_)), "{err}");
}
