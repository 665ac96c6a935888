//! Appointment lifecycle: create, approve, reject and score visit requests
//! against the backend while keeping a local read-through view.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use super::api::AppointmentApi;
use crate::error::{ApiError, AppointmentError};
use crate::models::appointment::{
    Appointment, AppointmentRecord, AppointmentStatus, ApprovalForm, RiskTier, VisitForm,
};

/// Result of the best-effort scoring pass that follows a create.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// The backend scored the request; `None` means it produced no score.
    Scored(Option<f64>),
    Failed(String),
    /// The create response carried no id to score.
    NoId,
}

#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub appointment: Option<Appointment>,
    pub scoring: ScoreOutcome,
}

impl CreateOutcome {
    /// Confirmation line for the requester. Always reports the request as sent.
    pub fn message(&self) -> String {
        match &self.scoring {
            ScoreOutcome::Scored(Some(score)) => {
                format!("Request sent. No-show risk: {}", RiskTier::label(*score))
            }
            ScoreOutcome::Scored(None) => "Request sent. Score unavailable.".to_string(),
            ScoreOutcome::Failed(_) => "Request sent. (scoring failed)".to_string(),
            ScoreOutcome::NoId => "Request sent. (no id returned for scoring)".to_string(),
        }
    }
}

#[derive(Default)]
struct BoardState {
    epoch: u64,
    loaded: bool,
    appointments: Vec<Appointment>,
}

impl BoardState {
    fn position(&self, id: &str) -> Option<usize> {
        self.appointments.iter().position(|a| a.id == id)
    }

    /// Replaces the record with the same id, or prepends a new one.
    fn upsert(&mut self, appointment: Appointment) {
        match self.position(&appointment.id) {
            Some(index) => self.appointments[index] = appointment,
            None => self.appointments.insert(0, appointment),
        }
    }
}

/// Holds an action key for as long as its request is outstanding.
struct InFlight<'a> {
    keys: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}

pub struct AppointmentBoard<A: AppointmentApi> {
    api: A,
    state: Mutex<BoardState>,
    in_flight: Mutex<HashSet<String>>,
}

impl<A: AppointmentApi> AppointmentBoard<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(BoardState::default()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn epoch(&self) -> u64 {
        self.state().epoch
    }

    /// Runs `f` against the state unless a reset happened since `epoch`.
    fn apply<T>(&self, epoch: u64, f: impl FnOnce(&mut BoardState) -> T) -> Option<T> {
        let mut state = self.state();
        if state.epoch != epoch {
            log::debug!("Dropping appointment response from a previous session");
            return None;
        }
        Some(f(&mut state))
    }

    fn begin(&self, key: String) -> Result<InFlight<'_>, AppointmentError> {
        let mut keys = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !keys.insert(key.clone()) {
            return Err(AppointmentError::InFlight(key));
        }
        Ok(InFlight {
            keys: &self.in_flight,
            key,
        })
    }

    pub fn is_busy(&self, id: &str) -> bool {
        let keys = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.iter().any(|key| key.ends_with(&format!(":{}", id)))
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.state().appointments.clone()
    }

    /// Appointments still waiting on an owner or secretary.
    pub fn pending(&self) -> Vec<Appointment> {
        self.state()
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Requested)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Appointment> {
        let state = self.state();
        state.position(id).map(|index| state.appointments[index].clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    /// Forgets everything and invalidates responses still in flight.
    pub fn reset(&self) {
        let mut state = self.state();
        state.epoch += 1;
        state.loaded = false;
        state.appointments.clear();
    }

    /// Replaces the local view with the server's. Returns false when the
    /// response arrived after a reset and was discarded.
    pub async fn refresh(&self) -> Result<bool, ApiError> {
        let epoch = self.epoch();
        let appointments = self.api.fetch_appointments().await?;
        let count = appointments.len();

        let applied = self
            .apply(epoch, |state| {
                state.appointments = appointments;
                state.loaded = true;
            })
            .is_some();
        if applied {
            log::debug!("Loaded {} appointment(s)", count);
        }
        Ok(applied)
    }

    /// Sends a visit request, then scores it. A scoring failure is reported
    /// in the outcome and never fails the request itself.
    pub async fn request_appointment(
        &self,
        form: VisitForm,
        fallback_location: Option<&str>,
    ) -> Result<CreateOutcome, AppointmentError> {
        let request = form.into_new_appointment(fallback_location)?;
        let _guard = self.begin(format!("create:{}", request.property_id))?;
        let epoch = self.epoch();

        let record = self.api.create_appointment(&request).await?;
        let mut created = Appointment::from_record(record);
        log::info!("Appointment requested for property {}", request.property_id);

        let created_id = created.as_ref().map(|a| a.id.clone());
        let scoring = match created_id {
            None => ScoreOutcome::NoId,
            Some(id) => match self.api.score_appointment(&id).await {
                Ok(patch) => {
                    let score = patch.no_show_score;
                    if let Some(appointment) = created.as_mut() {
                        appointment.merge(patch);
                    }
                    ScoreOutcome::Scored(score)
                }
                Err(e) => {
                    log::warn!("Scoring appointment {} failed: {}", id, e);
                    ScoreOutcome::Failed(e.message().to_string())
                }
            },
        };

        if let Some(appointment) = created.clone() {
            self.apply(epoch, |state| state.upsert(appointment));
        }

        Ok(CreateOutcome {
            appointment: created,
            scoring,
        })
    }

    /// Accepts a pending request, optionally with the approver's own date,
    /// time and meeting point. Status, time and place change together.
    pub async fn approve(
        &self,
        id: &str,
        form: ApprovalForm,
    ) -> Result<Appointment, AppointmentError> {
        let original = self
            .get(id)
            .ok_or_else(|| AppointmentError::Validation(format!("Unknown appointment {}", id)))?;
        if original.status.is_terminal() {
            return Err(AppointmentError::Validation(format!(
                "Appointment {} is already {}",
                id, original.status
            )));
        }

        let params = form.into_params(&original)?;
        let _guard = self.begin(format!("respond:{}", id))?;
        let epoch = self.epoch();

        self.api.respond_to_appointment(id, &params).await?;
        log::info!("Appointment {} accepted", id);

        let mut accepted = original;
        accepted.status = AppointmentStatus::Accepted;
        if let Some(date_time) = params.date_time {
            accepted.date_time = Some(date_time);
        }
        accepted.location = params.location;

        let applied = self.apply(epoch, |state| {
            state.position(id).map(|index| {
                let record = &mut state.appointments[index];
                record.status = AppointmentStatus::Accepted;
                record.date_time = accepted.date_time.clone();
                record.location = accepted.location.clone();
                record.clone()
            })
        });
        Ok(applied.flatten().unwrap_or(accepted))
    }

    /// Rejecting removes the request; there is no separate rejected record.
    pub async fn reject(&self, id: &str) -> Result<(), AppointmentError> {
        self.delete(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppointmentError> {
        let _guard = self.begin(format!("respond:{}", id))?;
        let epoch = self.epoch();

        self.api.delete_appointment(id).await?;
        log::info!("Appointment {} removed", id);

        self.apply(epoch, |state| state.appointments.retain(|a| a.id != id));
        Ok(())
    }

    /// Re-scores an appointment at any stage and spreads the returned fields
    /// over the local record.
    pub async fn score(&self, id: &str) -> Result<Appointment, AppointmentError> {
        let _guard = self.begin(format!("score:{}", id))?;
        let epoch = self.epoch();

        let mut patch: AppointmentRecord = self.api.score_appointment(id).await?;
        if patch.id.is_none() {
            patch.id = Some(id.to_string());
        }

        let merged = self.apply(epoch, |state| match state.position(id) {
            Some(index) => {
                state.appointments[index].merge(patch.clone());
                Some(state.appointments[index].clone())
            }
            None => None,
        });

        let appointment = match merged.flatten() {
            Some(appointment) => appointment,
            None => Appointment::from_record(patch).ok_or_else(|| {
                AppointmentError::Api(ApiError::transport("Scoring returned no appointment"))
            })?,
        };
        if let Some(score) = appointment.no_show_score {
            log::info!("Appointment {} scored {}", id, RiskTier::label(score));
        }
        Ok(appointment)
    }
}
