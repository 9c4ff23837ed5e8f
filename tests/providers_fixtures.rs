use ticker_news_sentiment::error::SourceFault;
use ticker_news_sentiment::ingest::providers::finnhub::FinnhubAdapter;
use ticker_news_sentiment::ingest::providers::newsapi::NewsApiAdapter;
use ticker_news_sentiment::ingest::providers::yahoo_rss::YahooRssAdapter;
use ticker_news_sentiment::ingest::SourceAdapter;
use ticker_news_sentiment::model::Published;

const YAHOO_XML: &str = include_str!("fixtures/yahoo_rss.xml");
const FINNHUB_JSON: &str = include_str!("fixtures/finnhub_company_news.json");
const NEWSAPI_JSON: &str = include_str!("fixtures/newsapi_everything.json");
const NEWSAPI_BAD_KEY: &str = include_str!("fixtures/newsapi_bad_key.json");

#[tokio::test]
async fn yahoo_fixture_maps_items_and_drops_untitled() {
    let a = YahooRssAdapter::from_fixture(YAHOO_XML);
    let batch = a.fetch("AAPL", 10).await.expect("fixture fetch");

    assert!(batch.fault.is_none());
    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.malformed, 1);

    let first = &batch.records[0];
    assert_eq!(first.ticker, "AAPL");
    assert_eq!(first.source, "Yahoo Finance");
    assert!(matches!(first.published_at, Some(Published::At(_))));
    let summary = first.summary.as_deref().unwrap_or_default();
    assert!(!summary.contains("<p>"), "markup should be stripped: {summary}");

    // relative link resolved, unparseable date kept verbatim
    let second = &batch.records[1];
    assert_eq!(
        second.url.as_deref(),
        Some("https://finance.yahoo.com/news/apple-antitrust-probe-093000456.html")
    );
    assert_eq!(
        second.published_at,
        Some(Published::Raw("sometime last week".into()))
    );
}

#[tokio::test]
async fn yahoo_fixture_respects_max_articles() {
    let a = YahooRssAdapter::from_fixture(YAHOO_XML);
    let batch = a.fetch("AAPL", 1).await.unwrap();
    assert_eq!(batch.records.len(), 1);
}

#[tokio::test]
async fn finnhub_fixture_isolates_bad_items() {
    let a = FinnhubAdapter::from_fixture(FINNHUB_JSON);
    let batch = a.fetch("AAPL", 10).await.unwrap();

    assert!(batch.fault.is_none());
    assert_eq!(batch.records.len(), 3);
    assert_eq!(batch.malformed, 1);
    assert!(batch.records.iter().all(|r| r.source == "Finnhub"));
    // epoch 0 means "unknown"
    assert_eq!(batch.records[2].published_at, None);
    // blank summary is absent, not empty
    assert_eq!(batch.records[1].summary, None);
}

#[tokio::test]
async fn newsapi_fixture_skips_removed_articles() {
    let a = NewsApiAdapter::from_fixture(NEWSAPI_JSON);
    let batch = a.fetch("AAPL", 10).await.unwrap();

    let titles: Vec<_> = batch.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Apple upgrades outlook as services growth accelerates",
            "Analysts split on Apple valuation"
        ]
    );
    assert_eq!(batch.malformed, 1);
    assert_eq!(batch.records[1].url, None);
    assert_eq!(batch.records[1].published_at, None);
}

#[tokio::test]
async fn newsapi_key_error_is_unauthenticated() {
    let a = NewsApiAdapter::from_fixture(NEWSAPI_BAD_KEY);
    let batch = a.fetch("AAPL", 10).await.unwrap();
    assert_eq!(batch.fault, Some(SourceFault::Unauthenticated));
    assert!(batch.records.is_empty());
}

#[tokio::test]
async fn garbage_payload_is_unavailable_not_an_error() {
    let a = FinnhubAdapter::from_fixture("<html>rate limited</html>");
    let batch = a.fetch("AAPL", 10).await.expect("fault is reported in-band");
    assert!(matches!(batch.fault, Some(SourceFault::Unavailable(_))));
}
