//! Full search conversation against fake OMDb and content-site servers, ending
//! with the issued link being followed through the redirect endpoint.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Duration as ChronoDuration;
use filmlink_bot::bot::state::State;
use filmlink_bot::bot::{
    ChatReplier, ConversationFlow, FlowOptions, MemberStatus, MembershipGate, MembershipLookup,
};
use filmlink_bot::catalog::{OmdbClient, SearchHit};
use filmlink_bot::config::TitleMatch;
use filmlink_bot::links::{LinkIssuer, LinkStore, ManualClock};
use filmlink_bot::scrape::SiteScraper;
use filmlink_bot::web::{self, EXPIRED_LINK_MESSAGE};
use http_body_util::BodyExt;
use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower::ServiceExt;

const START_MILLIS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text(String),
    Photo { url: String, caption: String },
    Results(Vec<String>),
}

#[derive(Default)]
struct RecordingReplier {
    sent: Mutex<Vec<Sent>>,
}

#[async_trait]
impl ChatReplier for RecordingReplier {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.sent.lock().await.push(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, photo_url: &str, caption: &str) -> Result<()> {
        self.sent.lock().await.push(Sent::Photo {
            url: photo_url.to_string(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn send_results(&self, _text: &str, hits: &[SearchHit], limit: usize) -> Result<()> {
        let ids = hits.iter().take(limit).map(|h| h.id.clone()).collect();
        self.sent.lock().await.push(Sent::Results(ids));
        Ok(())
    }
}

/// Every user is a member of every channel
struct AlwaysMember;

#[async_trait]
impl MembershipLookup for AlwaysMember {
    async fn member_status(&self, _channel_id: i64, _user_id: u64) -> Result<MemberStatus> {
        Ok(MemberStatus::Member)
    }
}

async fn omdb_server() -> ServerGuard {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("apikey".into(), "test-key".into()),
            Matcher::UrlEncoded("s".into(), "Inception".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"Search":[
                {"Title":"Inception","Year":"2010","imdbID":"tt1375666","Type":"movie","Poster":"N/A"},
                {"Title":"Inception: The Cobol Job","Year":"2010","imdbID":"tt5295894","Type":"movie","Poster":"N/A"}
            ],"totalResults":"2","Response":"True"}"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("apikey".into(), "test-key".into()),
            Matcher::UrlEncoded("i".into(), "tt1375666".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"Title":"Inception","Year":"2010","imdbID":"tt1375666",
                "Plot":"A thief who steals corporate secrets through dream-sharing technology.",
                "Poster":"https://img.example/inception.jpg","Response":"True"}"#,
        )
        .create_async()
        .await;
    server
}

async fn content_server() -> ServerGuard {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/")
        .match_query(Matcher::UrlEncoded("s".into(), "Inception".into()))
        .with_status(200)
        .with_body(
            r#"<html><body>
                 <h2 class="entry-title"><a href="/inception-2010/">Inception 2010</a></h2>
               </body></html>"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/inception-2010/")
        .with_status(200)
        .with_body(
            r#"<html><body>
                 <a href="/trailer">Trailer</a>
                 <a href="https://dl.example/Inception.2010.1080p.mkv">دانلود با کیفیت 1080</a>
               </body></html>"#,
        )
        .create_async()
        .await;
    server
}

async fn get(router: axum::Router, uri: &str) -> axum::response::Response {
    router
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response")
}

#[tokio::test]
async fn test_search_select_and_follow_link() {
    let omdb = omdb_server().await;
    let site = content_server().await;

    let clock = Arc::new(ManualClock::at_millis(START_MILLIS));
    let store = Arc::new(LinkStore::new(clock.clone(), 100));
    let issuer = Arc::new(LinkIssuer::new(store.clone(), "https://bot.example.app"));
    let timeout = Duration::from_secs(5);

    let flow = ConversationFlow::new(
        MembershipGate::new(Arc::new(AlwaysMember), vec![-1001]),
        Arc::new(OmdbClient::new(&format!("{}/", omdb.url()), "test-key", timeout)),
        Arc::new(
            SiteScraper::new(
                &format!("{}/", site.url()),
                "دانلود",
                TitleMatch::Loose,
                timeout,
            )
            .expect("scraper"),
        ),
        issuer,
        FlowOptions {
            link_ttl_secs: 600,
            result_limit: 10,
        },
    );
    let replier = RecordingReplier::default();

    let state = flow
        .handle_query(&replier, 7, "Inception")
        .await
        .expect("query");
    assert_eq!(state, State::ShowingResults);
    {
        let sent = replier.sent.lock().await;
        assert_eq!(
            sent.last(),
            Some(&Sent::Results(vec![
                "tt1375666".to_string(),
                "tt5295894".to_string()
            ]))
        );
    }

    let state = flow
        .handle_selection(&replier, 7, "tt1375666")
        .await
        .expect("selection");
    assert_eq!(state, State::AwaitingQuery);

    let link = {
        let sent = replier.sent.lock().await;
        let n = sent.len();
        match &sent[n - 2] {
            Sent::Photo { url, caption } => {
                assert_eq!(url, "https://img.example/inception.jpg");
                assert!(caption.contains("Inception (2010)"));
            }
            other => panic!("expected poster, got {other:?}"),
        }
        match &sent[n - 1] {
            Sent::Text(text) => text
                .split_whitespace()
                .find(|w| w.starts_with("https://bot.example.app/go?f="))
                .expect("link in message")
                .to_string(),
            other => panic!("expected link text, got {other:?}"),
        }
    };
    let path = link.trim_start_matches("https://bot.example.app");

    let router = web::build_router(store.clone());

    clock.advance(ChronoDuration::seconds(599));
    let response = get(router.clone(), path).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).expect("location"),
        "https://dl.example/Inception.2010.1080p.mkv"
    );

    clock.advance(ChronoDuration::seconds(1));
    let response = get(router, path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    assert_eq!(body, EXPIRED_LINK_MESSAGE.as_bytes());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_selection_without_download_link() {
    let omdb = omdb_server().await;
    let mut site = Server::new_async().await;
    site.mock("GET", "/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html><body><p>چیزی پیدا نشد</p></body></html>")
        .create_async()
        .await;

    let store = Arc::new(LinkStore::new(
        Arc::new(ManualClock::at_millis(START_MILLIS)),
        100,
    ));
    let timeout = Duration::from_secs(5);
    let flow = ConversationFlow::new(
        MembershipGate::new(Arc::new(AlwaysMember), Vec::new()),
        Arc::new(OmdbClient::new(&format!("{}/", omdb.url()), "test-key", timeout)),
        Arc::new(
            SiteScraper::new(
                &format!("{}/", site.url()),
                "دانلود",
                TitleMatch::Strict,
                timeout,
            )
            .expect("scraper"),
        ),
        Arc::new(LinkIssuer::new(store.clone(), "https://bot.example.app")),
        FlowOptions {
            link_ttl_secs: 600,
            result_limit: 10,
        },
    );
    let replier = RecordingReplier::default();

    flow.handle_selection(&replier, 7, "tt1375666")
        .await
        .expect("selection");

    let sent = replier.sent.lock().await;
    assert!(matches!(sent.first(), Some(Sent::Photo { .. })));
    assert!(matches!(sent.last(), Some(Sent::Text(t)) if t.starts_with("❌")));
    assert!(store.is_empty().await);
}
