use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::cache::Cache;
use crate::config::AppConfig;
use crate::mail::Mailer;
use crate::metrics::HttpMetrics;
use crate::policy::PolicyEnforcer;
use crate::usecase::UseCase;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler can reach. Built once in `main` (or by the test
/// harness) and shared by reference across requests.
pub struct AppStateInner {
    pub config: AppConfig,
    pub usecase: UseCase,
    pub cache: Arc<dyn Cache>,
    pub mailer: Arc<dyn Mailer>,
    pub policy: Arc<PolicyEnforcer>,
    pub tokens: TokenIssuer,
    pub metrics: HttpMetrics,
}
