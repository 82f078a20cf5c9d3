//! Integration tests for the article discovery layer.
//!
//! HTTP-level behavior is exercised against mockito servers; trait-level
//! invariants use the mock engine.

use article_discovery::config::{Config, EbscoConfig, PrimoConfig, SummonConfig};
use article_discovery::engines::{mock::make_document, Engine, EngineRegistry, MockEngine};
use article_discovery::models::{compute_paging, Provider, Response, SearchParams};
use mockito::Matcher;

const CREATE_SESSION_XML: &str =
    r#"<CreateSessionResponse><SessionToken>tok-1</SessionToken></CreateSessionResponse>"#;

const EDS_SEARCH_XML: &str = r#"<SearchResponseMessageGet><SearchResult>
  <Statistics><TotalHits>2</TotalHits></Statistics>
  <Data><Records>
    <Record>
      <Header><DbId>edsmzh</DbId><An>1993066095</An></Header>
      <Items><Item><Name>Title</Name><Data>First</Data></Item></Items>
    </Record>
    <Record>
      <Header><DbId>a9h</DbId><An>8514775</An></Header>
      <Items><Item><Name>Title</Name><Data>Second</Data></Item></Items>
    </Record>
  </Records></Data>
</SearchResult></SearchResponseMessageGet>"#;

const EDS_RETRIEVE_XML: &str = r#"<RetrieveResponseMessage><Record>
  <Header><DbId>edsmzh</DbId><An>1993066095</An></Header>
  <Items><Item><Name>Title</Name><Data>First</Data></Item></Items>
</Record></RetrieveResponseMessage>"#;

const PRIMO_BRIEF_XML: &str = r#"<SEGMENTS><JAGROOT><RESULT>
  <DOCSET TOTALHITS="1">
    <DOC><PrimoNMBib><record>
      <control><recordid>TN_gale1234</recordid></control>
      <display><title>Primo record</title></display>
    </record></PrimoNMBib></DOC>
  </DOCSET>
</RESULT></JAGROOT></SEGMENTS>"#;

const SUMMON_JSON: &str = r#"{
  "recordCount": 120,
  "documents": [{"ID": ["FETCH-x1"], "Title": ["Summon record"], "PublicationYear": ["1942"]}]
}"#;

fn ebsco_engine(base_url: String) -> EngineRegistry {
    let config = Config {
        provider: Some(Provider::Ebsco),
        ebsco: Some(EbscoConfig {
            base_url,
            profile: "edsapi".into(),
            guest: true,
        }),
        ..Config::default()
    };
    EngineRegistry::from_config(&config).unwrap()
}

/// One logical search pairs exactly one createsession with exactly one
/// endsession, even when the search body fails mid-flight.
#[tokio::test]
async fn test_ebsco_session_discipline_on_failure() {
    let mut server = mockito::Server::new_async().await;

    let create = server
        .mock("POST", "/edsapi/rest/createsession")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(CREATE_SESSION_XML)
        .expect(1)
        .create_async()
        .await;
    let search = server
        .mock("GET", "/edsapi/rest/search")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .expect(1)
        .create_async()
        .await;
    let end = server
        .mock("GET", "/edsapi/rest/endsession")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<EndSessionResponse/>")
        .expect(1)
        .create_async()
        .await;

    let registry = ebsco_engine(format!("{}/edsapi/rest", server.url()));
    let engine = registry.active().unwrap();

    let response = engine.search(&SearchParams::new("anything")).await.unwrap();
    assert!(!response.is_ok());
    assert_eq!(response.error_code, 500);
    assert!(response.docs.is_empty());

    create.assert_async().await;
    search.assert_async().await;
    end.assert_async().await;
}

/// A successful search carries the session token on the search call and
/// still releases the session afterwards.
#[tokio::test]
async fn test_ebsco_search_end_to_end() {
    let mut server = mockito::Server::new_async().await;

    let create = server
        .mock("POST", "/edsapi/rest/createsession")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(CREATE_SESSION_XML)
        .expect(1)
        .create_async()
        .await;
    let search = server
        .mock("GET", "/edsapi/rest/search")
        .match_query(Matcher::Any)
        .match_header("x-sessionToken", "tok-1")
        .with_status(200)
        .with_body(EDS_SEARCH_XML)
        .expect(1)
        .create_async()
        .await;
    let end = server
        .mock("GET", "/edsapi/rest/endsession")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<EndSessionResponse/>")
        .expect(1)
        .create_async()
        .await;

    let registry = ebsco_engine(format!("{}/edsapi/rest", server.url()));
    let engine = registry.active().unwrap();

    let response = engine.search(&SearchParams::new("printing")).await.unwrap();
    assert!(response.is_ok());
    assert_eq!(response.total, 2);
    assert_eq!(response.docs.len(), 2);
    assert_eq!(response.docs[0].doc_id, "edsmzh:1993066095");

    create.assert_async().await;
    search.assert_async().await;
    end.assert_async().await;
}

/// A document id coming out of a successful search is accepted unchanged
/// by the same provider's lookup path.
#[tokio::test]
async fn test_ebsco_id_roundtrips_through_lookup() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/edsapi/rest/createsession")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(CREATE_SESSION_XML)
        .create_async()
        .await;
    let retrieve = server
        .mock("GET", "/edsapi/rest/retrieve")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("dbid".into(), "edsmzh".into()),
            Matcher::UrlEncoded("an".into(), "1993066095".into()),
        ]))
        .with_status(200)
        .with_body(EDS_RETRIEVE_XML)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/edsapi/rest/endsession")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<EndSessionResponse/>")
        .create_async()
        .await;

    let registry = ebsco_engine(format!("{}/edsapi/rest", server.url()));
    let engine = registry.active().unwrap();

    let response = engine
        .lookup_by_id("edsmzh:1993066095", &SearchParams::default())
        .await
        .unwrap();
    assert!(response.is_ok());
    let doc = response.first().unwrap();
    assert_eq!(doc.doc_id, "edsmzh:1993066095");

    retrieve.assert_async().await;
}

/// An unusable Primo payload is re-issued exactly once — two hits on the
/// endpoint, then a degraded response, never a loop.
#[tokio::test]
async fn test_primo_single_retry_on_malformed_payload() {
    let mut server = mockito::Server::new_async().await;

    let brief = server
        .mock("GET", "/PrimoWebServices/xservice/search/brief")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<SEGMENTS><JAGROOT><RESULT></RESULT></JAGROOT></SEGMENTS>")
        .expect(2)
        .create_async()
        .await;

    let config = Config {
        provider: Some(Provider::Primo),
        primo: Some(PrimoConfig {
            base_url: format!("{}/PrimoWebServices", server.url()),
            institution: "TEST".into(),
        }),
        ..Config::default()
    };
    let registry = EngineRegistry::from_config(&config).unwrap();
    let engine = registry.active().unwrap();

    let response = engine.search(&SearchParams::new("anything")).await.unwrap();
    assert!(!response.is_ok());
    assert!(response.docs.is_empty());

    brief.assert_async().await;
}

#[tokio::test]
async fn test_primo_search_end_to_end() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/PrimoWebServices/xservice/search/brief")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("institution".into(), "TEST".into()),
            Matcher::UrlEncoded("indx".into(), "1".into()),
        ]))
        .with_status(200)
        .with_body(PRIMO_BRIEF_XML)
        .create_async()
        .await;

    let config = Config {
        provider: Some(Provider::Primo),
        primo: Some(PrimoConfig {
            base_url: format!("{}/PrimoWebServices", server.url()),
            institution: "TEST".into(),
        }),
        ..Config::default()
    };
    let registry = EngineRegistry::from_config(&config).unwrap();
    let engine = registry.active().unwrap();

    let response = engine.search(&SearchParams::new("printing")).await.unwrap();
    assert!(response.is_ok());
    assert_eq!(response.total, 1);
    assert_eq!(response.first().unwrap().doc_id, "TN_gale1234");
}

/// Position-based fetch: absolute index 73 resolves to page 2 of the
/// fixed 50-result pages and yields exactly one document.
#[tokio::test]
async fn test_summon_position_fetch() {
    let mut server = mockito::Server::new_async().await;

    let search = server
        .mock("GET", "/2.0.0/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("s.pn".into(), "2".into()),
            Matcher::UrlEncoded("s.ps".into(), "50".into()),
        ]))
        .match_header(
            "authorization",
            Matcher::Regex("^Summon example;.+".to_string()),
        )
        .with_status(200)
        .with_body(SUMMON_JSON)
        .expect(1)
        .create_async()
        .await;

    let config = Config {
        provider: Some(Provider::Summon),
        summon: Some(SummonConfig {
            base_url: format!("{}/2.0.0", server.url()),
            access_id: "example".into(),
            secret_key: "s3cret".into(),
        }),
        ..Config::default()
    };
    let registry = EngineRegistry::from_config(&config).unwrap();
    let engine = registry.active().unwrap();

    let response = engine
        .search(&SearchParams::new("gutenberg").index(73))
        .await
        .unwrap();
    assert!(response.is_ok());
    assert_eq!(response.docs.len(), 1);
    assert_eq!(response.paging.current_page, 2);

    search.assert_async().await;
}

/// Vendor reports more hits than it will serve: requesting a page beyond
/// the ceiling returns a valid, clamped response for every provider's
/// paging parameters.
#[test]
fn test_pagination_clamp_property() {
    for (total, per_page, max_accessible) in [(5000u64, 10u32, 2000u64), (5000, 50, 1000)] {
        let beyond = max_accessible + 500;
        let paging = compute_paging(total, per_page, beyond, max_accessible);
        let last = (max_accessible / u64::from(per_page)) as u32;
        assert_eq!(paging.current_page, last);
        assert_eq!(paging.total_pages, last);
    }
}

/// Trait-level invariant: a successful search response yields ids the same
/// engine's lookup accepts unchanged.
#[tokio::test]
async fn test_mock_engine_ids_roundtrip() {
    let engine = MockEngine::new();
    let mut seeded = Response::empty(Provider::Ebsco, 10);
    seeded.total = 2;
    seeded.docs = vec![
        make_document("edsmzh:1993066095", "First", Provider::Ebsco),
        make_document("a9h:8514775", "Second", Provider::Ebsco),
    ];
    engine.set_search_response(seeded);

    let response = engine.search(&SearchParams::new("q")).await.unwrap();
    assert!(response.is_ok());
    for doc in &response.docs {
        let looked_up = engine
            .lookup_by_id(&doc.doc_id, &SearchParams::default())
            .await
            .unwrap();
        assert_eq!(looked_up.first().unwrap().doc_id, doc.doc_id);
    }
}

/// Session lifecycle pairing is observable through the trait: every
/// started session is stopped even when the body in between fails.
#[tokio::test]
async fn test_session_pairing_with_failing_body() {
    let engine = MockEngine::new();
    engine.fail_searches(true);

    let session = engine.start_session(true).await.unwrap();
    let result = engine.search(&SearchParams::new("q")).await;
    engine.stop_session(session).await.unwrap();

    assert!(result.is_err());
    assert_eq!(engine.sessions_started(), 1);
    assert_eq!(engine.sessions_stopped(), 1);
}

#[test]
fn test_registry_selects_configured_providers() {
    let config = Config {
        provider: Some(Provider::Ebsco),
        ebsco: Some(EbscoConfig {
            base_url: "http://localhost/edsapi/rest".into(),
            profile: "edsapi".into(),
            guest: true,
        }),
        ..Config::default()
    };

    let registry = EngineRegistry::from_config(&config).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.has(Provider::Ebsco));
    assert!(!registry.has(Provider::Primo));
    assert_eq!(registry.active().unwrap().provider(), Provider::Ebsco);
}
