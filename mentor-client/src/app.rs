use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::AuthService;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::essays::EssayActions;
use crate::gateway::{EssayGateway, HttpGateway};
use crate::notify::Notifier;
use crate::poller::FeedbackPoller;
use crate::store::{AuthStore, EssayStore};

/// Everything a host wires once at startup. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppContextInner>,
}

struct AppContextInner {
    config: ClientConfig,
    notifier: Notifier,
    essays: EssayStore,
    client: ApiClient,
    gateway: HttpGateway,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("api_base_url", &self.inner.config.api_base_url)
            .finish()
    }
}

impl AppContext {
    /// Session is persisted to `config.session_file` when set.
    pub fn new(config: ClientConfig, notifier: Notifier) -> Result<Self, ApiError> {
        let auth = match &config.session_file {
            Some(path) => AuthStore::persistent(path.clone()),
            None => AuthStore::in_memory(),
        };
        let client = ApiClient::new(&config, auth, notifier.clone())?;
        let gateway = HttpGateway::new(client.clone());
        Ok(Self {
            inner: Arc::new(AppContextInner {
                config,
                notifier,
                essays: EssayStore::new(),
                client,
                gateway,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    pub fn auth_store(&self) -> &AuthStore {
        self.inner.client.auth()
    }

    pub fn essay_store(&self) -> &EssayStore {
        &self.inner.essays
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    pub fn gateway(&self) -> &HttpGateway {
        &self.inner.gateway
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.inner.client.clone())
    }

    pub fn profile(&self) -> crate::profile::ProfileService {
        crate::profile::ProfileService::new(self.inner.client.clone())
    }

    pub fn essays(&self) -> EssayActions {
        let gateway: Arc<dyn EssayGateway> = Arc::new(self.inner.gateway.clone());
        let lookups: Arc<dyn EssayGateway> = Arc::new(self.inner.gateway.silent());
        EssayActions::new(gateway, self.inner.essays.clone(), self.inner.notifier.clone())
            .with_lookup_gateway(lookups)
    }

    /// A poller over the silent gateway, reconciling into the essay cache.
    pub fn feedback_poller(&self) -> FeedbackPoller {
        FeedbackPoller::new(
            Arc::new(self.inner.gateway.silent()),
            self.inner.notifier.clone(),
            self.inner.config.poll,
        )
        .with_store(self.inner.essays.clone())
    }
}
