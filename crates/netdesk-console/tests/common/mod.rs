//! Shared helpers for the console integration tests

#![allow(dead_code, unreachable_pub)]

use netdesk_console::{
    ApiClient, MemorySession, Navigator, Notifier, PageContext, RecordingNavigator,
    RecordingNotifier, SessionStore,
};
use netdesk_core::config::DisplayConfig;
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

/// Initialize test logging once per binary
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// Page context wired to a mock backend, with recording collaborators
pub struct TestContext {
    pub ctx: PageContext,
    pub session: Arc<MemorySession>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    /// Logged-in context for `base_url`
    pub fn logged_in(base_url: &str) -> Self {
        Self::with_session(base_url, MemorySession::with_token("test-token"))
    }

    /// Context without a stored token
    pub fn anonymous(base_url: &str) -> Self {
        Self::with_session(base_url, MemorySession::new())
    }

    fn with_session(base_url: &str, session: MemorySession) -> Self {
        let session = Arc::new(session);
        let navigator = Arc::new(RecordingNavigator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let api = ApiClient::new(
            base_url,
            Arc::clone(&session) as Arc<dyn SessionStore>,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );
        let ctx = PageContext::new(
            api,
            DisplayConfig::default(),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );

        Self {
            ctx,
            session,
            navigator,
            notifier,
        }
    }
}
