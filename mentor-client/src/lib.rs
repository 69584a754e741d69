//! Mentor de Redação client core
//!
//! Talks to the essay-analysis REST backend and keeps client-side caches in
//! sync: authentication, essay CRUD, submission for analysis and the
//! feedback poller that waits for the asynchronous analysis to finish.
//! Rendering is left to the host; user-facing notices go through the
//! [`notify`] bridge.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod essays;
pub mod gateway;
pub mod notify;
pub mod poller;
pub mod profile;
pub mod store;

pub use api::ApiClient;
pub use app::AppContext;
pub use auth::AuthService;
pub use config::{ClientConfig, PollPolicy};
pub use error::{ApiError, ErrorCategory, FieldError};
pub use essays::{DashboardSummary, EssayActions, ScoredEssay};
pub use gateway::{EssayGateway, HttpGateway};
pub use notify::{Notification, NotificationKind, NotificationSink, Notifier};
pub use poller::{FeedbackPoller, FeedbackView, PollPhase};
pub use profile::ProfileService;
pub use store::{AuthStore, EssayCache, EssayStore, Session};
