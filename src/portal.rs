//! Application context. The portal owns the session and every orchestrator,
//! and is the only place that writes the session.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::config::Config;
use crate::error::{ApiError, PortalError};
use crate::models::appointment::{Appointment, ApprovalForm, VisitForm};
use crate::models::property::{Property, RecommendationQuery};
use crate::models::user::{LoginRequest, Role, UserIdentity, UserRecord};
use crate::services::api::ApiClient;
use crate::services::appointments::{AppointmentBoard, CreateOutcome};
use crate::services::catalog::PropertyCatalog;
use crate::services::channel::{EventCallback, NotificationChannel};
use crate::services::notifications::NotificationCenter;
use crate::services::recommendations::{ClickOutcome, RecommendationService};
use crate::services::session::{FileTokenStorage, RestoreOutcome, SessionStore, TokenStorage};
use crate::tasks::refresh_task::Refreshable;

pub struct Portal {
    config: Config,
    session: SessionStore,
    api: ApiClient,
    appointments: AppointmentBoard<ApiClient>,
    notifications: NotificationCenter<ApiClient>,
    recommendations: RecommendationService<ApiClient>,
    catalog: PropertyCatalog<ApiClient>,
    channel: NotificationChannel,
    invalidations: Arc<Notify>,
    realtime: bool,
}

impl Portal {
    pub fn new(config: Config, storage: impl TokenStorage + 'static) -> Result<Self, ApiError> {
        let session = SessionStore::new(storage);
        let api = ApiClient::new(&config.api, session.subscribe())?;

        Ok(Self {
            appointments: AppointmentBoard::new(api.clone()),
            notifications: NotificationCenter::new(api.clone()),
            recommendations: RecommendationService::new(
                api.clone(),
                config.app.recommend_debounce(),
            ),
            catalog: PropertyCatalog::new(api.clone(), Some(config.app.property_cache_path())),
            channel: NotificationChannel::new(config.channel.clone()),
            invalidations: Arc::new(Notify::new()),
            realtime: false,
            session,
            api,
            config,
        })
    }

    /// Portal with the token kept in the data directory.
    pub fn from_config(config: Config) -> Result<Self, ApiError> {
        let storage = FileTokenStorage::new(config.app.token_path());
        Self::new(config, storage)
    }

    /// Opens the notification channel whenever a user is signed in.
    pub fn with_realtime(mut self, enabled: bool) -> Self {
        self.realtime = enabled;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn appointments(&self) -> &AppointmentBoard<ApiClient> {
        &self.appointments
    }

    pub fn notifications(&self) -> &NotificationCenter<ApiClient> {
        &self.notifications
    }

    pub fn recommendations(&self) -> &RecommendationService<ApiClient> {
        &self.recommendations
    }

    pub fn catalog(&self) -> &PropertyCatalog<ApiClient> {
        &self.catalog
    }

    pub fn channel(&self) -> &NotificationChannel {
        &self.channel
    }

    /// Wakes whoever refreshes the views; the channel fires it on every push.
    pub fn invalidations(&self) -> Arc<Notify> {
        self.invalidations.clone()
    }

    pub fn request_refresh(&self) {
        self.invalidations.notify_one();
    }

    /// Rehydrates the stored session at startup. A token that no longer
    /// decodes logs the user out.
    pub fn bootstrap(&self) -> RestoreOutcome {
        let outcome = self.session.restore();
        if matches!(outcome, RestoreOutcome::Invalidated(_)) {
            self.catalog.clear();
        }
        self.rebind();
        outcome
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<UserIdentity, PortalError> {
        let token = self.api.login(request).await?;
        let identity = match self.session.login(&token) {
            Ok(identity) => identity,
            Err(e) => {
                self.catalog.clear();
                self.rebind();
                return Err(e.into());
            }
        };
        self.catalog.clear();
        self.rebind();
        Ok(identity)
    }

    pub fn logout(&self) {
        self.session.logout();
        self.catalog.clear();
        self.rebind();
    }

    /// Tears down everything tied to the previous identity, then reconnects
    /// the channel for the current one.
    fn rebind(&self) {
        self.channel.disconnect();
        self.appointments.reset();
        self.notifications.reset();
        self.recommendations.reset_session();

        let Some(identity) = self.session.current() else {
            return;
        };
        if !self.realtime {
            return;
        }
        let Some(user_id) = identity.id.clone() else {
            log::warn!("Session for {} carries no user id, live updates disabled", identity.email);
            return;
        };

        let invalidations = self.invalidations.clone();
        let on_event: EventCallback = Arc::new(move || invalidations.notify_one());
        if let Err(e) = self
            .channel
            .connect(&user_id, Some(identity.token.clone()), on_event)
        {
            log::warn!("Live updates unavailable: {}", e);
        }
    }

    pub fn current_user(&self) -> Result<UserIdentity, PortalError> {
        self.session.current().ok_or(PortalError::NotSignedIn)
    }

    /// Gate for role-restricted actions.
    pub fn require_role(&self, allowed: &[Role], action: &str) -> Result<UserIdentity, PortalError> {
        let identity = self.current_user()?;
        if allowed.contains(&identity.role) {
            Ok(identity)
        } else {
            Err(PortalError::Forbidden {
                role: identity.role.to_string(),
                action: action.to_string(),
            })
        }
    }

    fn require_reviewer(&self) -> Result<UserIdentity, PortalError> {
        self.require_role(&[Role::Owner, Role::Secretary], "review appointments")
    }

    /// The signed-in user's record as the backend has it on file. `None`
    /// when the token carries no user id.
    async fn lookup_user(&self) -> Result<Option<UserRecord>, PortalError> {
        let identity = self.current_user()?;
        let Some(id) = identity.id.as_deref() else {
            return Ok(None);
        };
        Ok(Some(self.api.get_user(id).await?))
    }

    /// E-mail on file, falling back to the token subject.
    pub async fn lookup_email(&self) -> Result<String, PortalError> {
        let identity = self.current_user()?;
        let email = self.lookup_user().await?.and_then(|record| record.email);
        Ok(email.unwrap_or(identity.email))
    }

    pub async fn society_id(&self) -> Result<Option<String>, PortalError> {
        Ok(self.lookup_user().await?.and_then(|record| record.society_id))
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, PortalError> {
        self.require_role(&[Role::Owner], "manage users")?;
        Ok(self.api.get_users().await?)
    }

    pub async fn load_properties(&self, force: bool) -> Result<Vec<Property>, PortalError> {
        let token = self.session.current().map(|user| user.token);
        Ok(self.catalog.load(force, token.as_deref()).await?)
    }

    pub async fn recommend(&self, query: &RecommendationQuery) -> Result<Vec<Property>, PortalError> {
        let token = self.session.current().map(|user| user.token);
        Ok(self.recommendations.recommend(query, token.as_deref()).await?)
    }

    pub async fn record_click(&self, property_id: &str) -> Result<ClickOutcome, PortalError> {
        let token = self.session.current().map(|user| user.token);
        Ok(self
            .recommendations
            .record_click(property_id, token.as_deref())
            .await?)
    }

    /// Sends a visit request for a catalog property. A blank meeting point
    /// falls back to the property's area or location.
    pub async fn request_visit(&self, form: VisitForm) -> Result<CreateOutcome, PortalError> {
        self.current_user()?;
        let fallback = match self.catalog.get(form.property_id.trim()) {
            Some(property) => property.meeting_point().map(str::to_string),
            None => None,
        };
        Ok(self
            .appointments
            .request_appointment(form, fallback.as_deref())
            .await?)
    }

    pub async fn approve(&self, id: &str, form: ApprovalForm) -> Result<Appointment, PortalError> {
        self.require_reviewer()?;
        self.ensure_appointments_loaded().await?;
        Ok(self.appointments.approve(id, form).await?)
    }

    pub async fn reject(&self, id: &str) -> Result<(), PortalError> {
        self.require_reviewer()?;
        Ok(self.appointments.reject(id).await?)
    }

    pub async fn score(&self, id: &str) -> Result<Appointment, PortalError> {
        self.require_reviewer()?;
        self.ensure_appointments_loaded().await?;
        Ok(self.appointments.score(id).await?)
    }

    async fn ensure_appointments_loaded(&self) -> Result<(), ApiError> {
        if !self.appointments.is_loaded() {
            self.appointments.refresh().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Refreshable for Portal {
    async fn refresh_all(&self) {
        if !self.session.is_authenticated() {
            return;
        }
        if let Err(e) = self.notifications.refresh().await {
            log::error!("Notification load failed: {}", e);
        }
        if let Err(e) = self.appointments.refresh().await {
            log::error!("Failed to fetch requests: {}", e);
        }
    }
}
