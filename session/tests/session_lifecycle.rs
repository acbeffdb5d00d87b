//! End-to-end session lifecycle tests.
//!
//! Sessions run in a real store on paused tokio time, with mock script
//! loader, widget library and token fetcher. Every test uses private
//! storage so tests never see each other's cached tokens.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::TimeDelta;
use link_session::constants::effect_ids::{REFRESH_TIMER, TOKEN_REQUEST};
use link_session::mocks::{
    MockScriptLoader, MockTokenFetcher, MockWidgetFactory, MockWidgetLibrary, WidgetEvent,
};
use link_session::{
    CacheOptions, EmbedTarget, ErrorKind, ExitOptions, LinkSession, LinkTokenResponse,
    MemoryStorage, SessionConfig, SessionConfigBuilder, SessionEnvironment, SessionPhase,
    SubmissionData,
};
use link_session_testing::{ManualClock, manual_clock, test_time};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Test Fixtures
// ============================================================================

struct Harness {
    fetcher: MockTokenFetcher,
    factory: MockWidgetFactory,
    library: MockWidgetLibrary,
    scripts: MockScriptLoader,
    clock: ManualClock,
}

impl Harness {
    fn new(fetcher: MockTokenFetcher) -> Self {
        let factory = MockWidgetFactory::new();
        Self {
            fetcher,
            library: MockWidgetLibrary::present(factory.clone()),
            factory,
            scripts: MockScriptLoader::succeeding(),
            clock: manual_clock(),
        }
    }

    fn with_library(mut self, library: MockWidgetLibrary) -> Self {
        self.library = library;
        self
    }

    fn with_scripts(mut self, scripts: MockScriptLoader) -> Self {
        self.scripts = scripts;
        self
    }

    fn environment(&self) -> SessionEnvironment {
        SessionEnvironment::new(Arc::new(self.library.clone()), Arc::new(self.scripts.clone()))
            .with_clock(Arc::new(self.clock.clone()))
    }

    fn config(&self) -> SessionConfigBuilder {
        SessionConfig::builder(Arc::new(self.fetcher.clone()))
            .cache_options(CacheOptions::new().with_storage(Arc::new(MemoryStorage::new())))
    }

    async fn start(&self, config: SessionConfig) -> LinkSession {
        LinkSession::start(config, self.environment()).await.unwrap()
    }
}

fn token_expiring_in(token: &str, expires_in: TimeDelta) -> LinkTokenResponse {
    LinkTokenResponse::expiring_at(token, test_time() + expires_in)
}

fn four_hour_token() -> MockTokenFetcher {
    MockTokenFetcher::returning(token_expiring_in("tok", TimeDelta::hours(4)))
}

fn created(instance: usize, token: &str) -> WidgetEvent {
    WidgetEvent::Created {
        instance,
        token: token.to_string(),
        embedded: None,
    }
}

fn torn_down(instance: usize) -> [WidgetEvent; 2] {
    [
        WidgetEvent::Exited { instance, force: true },
        WidgetEvent::Destroyed { instance },
    ]
}

// ============================================================================
// Ready path
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_ready_then_refetch_reacquires() {
    link_session_testing::init_tracing();
    let harness = Harness::new(four_hour_token());
    let session = harness.start(harness.config().cache(false).build()).await;

    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();
    let status = session.status().await;
    assert!(status.ready);
    assert!(status.error.is_none());
    assert_eq!(harness.fetcher.calls(), 1);

    session.refetch_link_token().await.unwrap();
    let factory = harness.factory.clone();
    session
        .wait_for(move |phase| phase.is_ready() && factory.created() == 2, WAIT)
        .await
        .unwrap();

    assert_eq!(harness.fetcher.calls(), 2);
    let mut expected = vec![created(1, "tok")];
    expected.extend(torn_down(1));
    expected.push(created(2, "tok"));
    assert_eq!(harness.factory.events(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_refetch_with_cache_reuses_valid_token() {
    let harness = Harness::new(four_hour_token());
    let session = harness.start(harness.config().build()).await;
    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();

    session.refetch_link_token().await.unwrap();
    let factory = harness.factory.clone();
    session
        .wait_for(move |phase| phase.is_ready() && factory.created() == 2, WAIT)
        .await
        .unwrap();

    assert_eq!(harness.fetcher.calls(), 1);
    assert_eq!(harness.factory.live(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_script_url_is_requested_once() {
    let harness = Harness::new(four_hour_token());
    let session = LinkSession::start(
        harness.config().build(),
        harness.environment().with_script_url("https://cdn.example.com/link.js"),
    )
    .await
    .unwrap();

    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();
    session.refetch_link_token().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(harness.scripts.loads(), vec!["https://cdn.example.com/link.js".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_handler_forwards_when_ready() {
    let harness = Harness::new(four_hour_token());
    let session = harness.start(harness.config().build()).await;
    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();

    let handler = session.handler().await;
    handler.open();
    handler.submit(&SubmissionData {
        phone_number: Some("+14155550011".to_string()),
    });
    handler.exit(ExitOptions::default());

    assert_eq!(
        harness.factory.events(),
        vec![
            created(1, "tok"),
            WidgetEvent::Opened { instance: 1 },
            WidgetEvent::Submitted { instance: 1 },
            WidgetEvent::Exited { instance: 1, force: false },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_handler_before_ready_is_noop() {
    let harness = Harness::new(four_hour_token())
        .with_scripts(MockScriptLoader::succeeding().with_delay(Duration::from_secs(10)));
    let session = harness.start(harness.config().build()).await;

    let handler = session.handler().await;
    handler.open();
    handler.submit(&SubmissionData::default());
    handler.exit(ExitOptions::forced());

    assert!(!handler.is_ready());
    assert!(harness.factory.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_redirect_uri_reaches_factory() {
    let harness = Harness::new(four_hour_token());
    let session = harness
        .start(
            harness
                .config()
                .received_redirect_uri("https://app.example.com/oauth?oauth_state_id=42")
                .build(),
        )
        .await;
    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();

    let config = harness.factory.last_config().unwrap();
    assert_eq!(config.token, "tok");
    assert_eq!(
        config.received_redirect_uri.as_deref(),
        Some("https://app.example.com/oauth?oauth_state_id=42")
    );
}

// ============================================================================
// Error classification
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_empty_link_token_is_token_fetch_error() {
    let harness =
        Harness::new(MockTokenFetcher::returning(token_expiring_in("", TimeDelta::hours(4))));
    let session = harness.start(harness.config().build()).await;

    let phase = session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();
    let error = phase.error().unwrap();

    assert_eq!(error.kind(), ErrorKind::TokenFetch);
    assert_eq!(error.message(), "link_token missing from token fetch response.");
    assert_eq!(harness.factory.created(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_expiration_is_token_fetch_error() {
    let harness = Harness::new(MockTokenFetcher::returning(LinkTokenResponse::new("tok", "")));
    let session = harness.start(harness.config().build()).await;

    let phase = session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();
    let error = phase.error().unwrap();

    assert_eq!(error.kind(), ErrorKind::TokenFetch);
    assert_eq!(error.message(), "expiration missing from token fetch response.");
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_expiration_is_missing_token_data() {
    let harness =
        Harness::new(MockTokenFetcher::returning(LinkTokenResponse::new("tok", "in four hours")));
    let session = harness.start(harness.config().build()).await;

    let phase = session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();

    assert_eq!(phase.error().unwrap().kind(), ErrorKind::MissingTokenData);
}

#[tokio::test(start_paused = true)]
async fn test_fetcher_failure_keeps_its_message() {
    let harness = Harness::new(MockTokenFetcher::failing("FETCH_TOKEN_ERROR"));
    let session = harness.start(harness.config().build()).await;

    let phase = session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();

    assert_eq!(phase.name(), "token_error");
    let error = phase.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::TokenFetch);
    assert_eq!(error.message(), "FETCH_TOKEN_ERROR");
}

#[tokio::test(start_paused = true)]
async fn test_script_failure_skips_library_and_token() {
    let harness = Harness::new(four_hour_token())
        .with_scripts(MockScriptLoader::failing("SCRIPT_LOAD_ERROR"));
    let session = harness.start(harness.config().build()).await;

    let phase = session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();

    assert_eq!(phase.name(), "script_error");
    assert_eq!(phase.error().unwrap().kind(), ErrorKind::ScriptLoad);
    assert_eq!(harness.library.lookups(), 0);
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_absent_library_is_plaid_unavailable() {
    let harness = Harness::new(four_hour_token()).with_library(MockWidgetLibrary::absent());
    let session = harness.start(harness.config().build()).await;

    let phase = session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();

    assert_eq!(phase.name(), "widget_unavailable");
    assert_eq!(phase.error().unwrap().kind(), ErrorKind::PlaidUnavailable);
    assert!(!session.store().timers().is_pending(&REFRESH_TIMER));
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_library_wins_over_token_error() {
    let harness = Harness::new(MockTokenFetcher::failing("FETCH_TOKEN_ERROR"))
        .with_library(MockWidgetLibrary::non_browser());
    let session = harness.start(harness.config().build()).await;

    let phase = session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();

    assert_eq!(phase.error().unwrap().kind(), ErrorKind::NonBrowser);
}

#[tokio::test(start_paused = true)]
async fn test_error_callback_fires_once_per_error() {
    let harness = Harness::new(MockTokenFetcher::failing("FETCH_TOKEN_ERROR"));
    let reported = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reported);
    let session = harness
        .start(
            harness
                .config()
                .on_error(move |error| {
                    assert_eq!(error.kind(), ErrorKind::TokenFetch);
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
        )
        .await;

    session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(reported.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconfigure_recovers_from_token_error() {
    let harness = Harness::new(MockTokenFetcher::failing("FETCH_TOKEN_ERROR"));
    let session = harness.start(harness.config().build()).await;
    session.wait_for(SessionPhase::is_error, WAIT).await.unwrap();

    let recovered = SessionConfig::builder(Arc::new(four_hour_token()))
        .cache_options(CacheOptions::new().with_storage(Arc::new(MemoryStorage::new())))
        .build();
    session.reconfigure(recovered).await.unwrap();

    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();
    assert!(session.error().await.is_none());
}

// ============================================================================
// Teardown ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reconfigure_tears_down_before_setup() {
    let harness = Harness::new(four_hour_token());
    let session = harness.start(harness.config().build()).await;
    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();

    // A new callback alone counts as a new configuration.
    session
        .reconfigure(harness.config().on_success(|_, _| {}).build())
        .await
        .unwrap();

    let mut expected = vec![created(1, "tok")];
    expected.extend(torn_down(1));
    expected.push(created(2, "tok"));
    assert_eq!(harness.factory.events(), expected);
    assert_eq!(harness.factory.live(), 1);
    assert!(session.ready().await);
}

#[tokio::test(start_paused = true)]
async fn test_callbacks_of_torn_down_widget_go_quiet() {
    let harness = Harness::new(four_hour_token());
    let loads = Arc::new(AtomicUsize::new(0));
    let config = {
        let loads = Arc::clone(&loads);
        harness
            .config()
            .on_load(move || {
                loads.fetch_add(1, Ordering::SeqCst);
            })
            .build()
    };
    let session = harness.start(config.clone()).await;
    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    let first = harness.factory.callbacks(1).unwrap();
    session.reconfigure(config).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);

    first.load();
    assert_eq!(loads.load(Ordering::SeqCst), 2);

    harness.factory.callbacks(2).unwrap().load();
    assert_eq!(loads.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_embedded_widget_is_destroyed_without_exit() {
    let harness = Harness::new(four_hour_token());
    let session = harness
        .start(harness.config().embedded(EmbedTarget::new("link-container")).build())
        .await;
    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();

    let status = session.status().await;
    assert!(status.ready);
    assert!(!status.handler.is_ready());

    session.dispose().await.unwrap();

    assert_eq!(
        harness.factory.events(),
        vec![
            WidgetEvent::Created {
                instance: 1,
                token: "tok".to_string(),
                embedded: Some(EmbedTarget::new("link-container")),
            },
            WidgetEvent::Destroyed { instance: 1 },
        ]
    );
}

// ============================================================================
// Refresh and disposal
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_fires_ahead_of_expiry() {
    let harness = Harness::new(four_hour_token());
    harness
        .fetcher
        .push_response(token_expiring_in("tok", TimeDelta::hours(4)));
    harness
        .fetcher
        .push_response(token_expiring_in("tok-2", TimeDelta::hours(8)));
    let session = harness.start(harness.config().build()).await;
    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();
    assert!(session.store().timers().is_pending(&REFRESH_TIMER));

    // By the time the deadline fires the cached token is inside its buffer.
    harness.clock.advance(TimeDelta::hours(4) - TimeDelta::seconds(20));

    let factory = harness.factory.clone();
    session
        .wait_for(
            move |phase| phase.is_ready() && factory.created() == 2,
            Duration::from_secs(5 * 3600),
        )
        .await
        .unwrap();

    assert_eq!(harness.fetcher.calls(), 2);
    let mut expected = vec![created(1, "tok")];
    expected.extend(torn_down(1));
    expected.push(created(2, "tok-2"));
    assert_eq!(harness.factory.events(), expected);
    assert!(session.store().timers().is_pending(&REFRESH_TIMER));
}

#[tokio::test(start_paused = true)]
async fn test_token_inside_buffer_refreshes_immediately() {
    let harness = Harness::new(four_hour_token());
    harness
        .fetcher
        .push_response(token_expiring_in("soon", TimeDelta::seconds(10)));
    let session = harness.start(harness.config().build()).await;

    let factory = harness.factory.clone();
    session
        .wait_for(
            move |phase| phase.is_ready() && factory.created() == 2,
            Duration::from_millis(10),
        )
        .await
        .unwrap();

    assert_eq!(harness.fetcher.calls(), 2);
    let mut expected = vec![created(1, "soon")];
    expected.extend(torn_down(1));
    expected.push(created(2, "tok"));
    assert_eq!(harness.factory.events(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_pending_refresh() {
    let harness = Harness::new(four_hour_token());
    let session = harness.start(harness.config().build()).await;
    session.wait_for(SessionPhase::is_ready, WAIT).await.unwrap();
    assert!(session.store().timers().is_pending(&REFRESH_TIMER));

    session.dispose().await.unwrap();

    assert!(session.store().timers().is_empty());
    assert!(matches!(session.phase().await, SessionPhase::Disposed));
    assert!(!session.handler().await.is_ready());

    tokio::time::sleep(Duration::from_secs(5 * 3600)).await;

    assert_eq!(harness.fetcher.calls(), 1);
    let mut expected = vec![created(1, "tok")];
    expected.extend(torn_down(1));
    assert_eq!(harness.factory.events(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_completing_after_dispose_is_discarded() {
    let harness = Harness::new(four_hour_token().with_delay(Duration::from_secs(10)));
    let session = harness.start(harness.config().build()).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.fetcher.calls(), 1);
    assert!(session.store().timers().is_pending(&TOKEN_REQUEST));

    session.dispose().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(harness.factory.created(), 0);
    assert!(matches!(session.phase().await, SessionPhase::Disposed));
    assert!(session.error().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_refetch_supersedes_in_flight_request() {
    let fetcher = four_hour_token().with_delay(Duration::from_secs(10));
    fetcher.push_response(token_expiring_in("slow", TimeDelta::hours(4)));
    let harness = Harness::new(fetcher);
    let session = harness.start(harness.config().cache(false).build()).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    session.refetch_link_token().await.unwrap();

    session
        .wait_for(SessionPhase::is_ready, Duration::from_secs(60))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(harness.fetcher.calls(), 2);
    assert_eq!(harness.factory.events(), vec![created(1, "tok")]);
}
