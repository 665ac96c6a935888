use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use super::api::NotificationApi;
use crate::error::ApiError;
use crate::models::notification::{Notification, ReadStatus};

#[derive(Default)]
struct Inbox {
    epoch: u64,
    notifications: Vec<Notification>,
    unread_count: u64,
    /// Ids this session has seen as READ. A later fetch never reverts them.
    read: HashSet<String>,
}

/// The signed-in user's notifications and their unread counter.
pub struct NotificationCenter<N: NotificationApi> {
    api: N,
    inbox: Mutex<Inbox>,
}

impl<N: NotificationApi> NotificationCenter<N> {
    pub fn new(api: N) -> Self {
        Self {
            api,
            inbox: Mutex::new(Inbox::default()),
        }
    }

    pub fn api(&self) -> &N {
        &self.api
    }

    fn inbox(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.inbox().notifications.clone()
    }

    pub fn unread(&self) -> Vec<Notification> {
        self.inbox()
            .notifications
            .iter()
            .filter(|n| n.is_unread())
            .cloned()
            .collect()
    }

    pub fn unread_count(&self) -> u64 {
        self.inbox().unread_count
    }

    pub fn reset(&self) {
        let mut inbox = self.inbox();
        let epoch = inbox.epoch + 1;
        *inbox = Inbox {
            epoch,
            ..Inbox::default()
        };
    }

    /// Fetches the count, then the list, and reconciles the two with what
    /// this session has already marked read. A failed count fetch falls back
    /// to counting the list.
    pub async fn refresh(&self) -> Result<bool, ApiError> {
        let epoch = self.inbox().epoch;

        let count = match self.api.fetch_unread_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                log::warn!("Notification count refresh failed: {}", e);
                None
            }
        };
        let mut fetched = self.api.fetch_notifications().await?;

        let mut inbox = self.inbox();
        if inbox.epoch != epoch {
            log::debug!("Dropping notification response from a previous session");
            return Ok(false);
        }

        let mut stale = 0u64;
        for notification in fetched.iter_mut() {
            match notification.read_status {
                ReadStatus::Read => {
                    inbox.read.insert(notification.id.clone());
                }
                ReadStatus::Unread if inbox.read.contains(&notification.id) => {
                    notification.read_status = ReadStatus::Read;
                    stale += 1;
                }
                ReadStatus::Unread => {}
            }
        }

        inbox.unread_count = match count {
            Some(count) => count.saturating_sub(stale),
            None => fetched.iter().filter(|n| n.is_unread()).count() as u64,
        };
        inbox.notifications = fetched;
        log::debug!(
            "Loaded {} notification(s), {} unread",
            inbox.notifications.len(),
            inbox.unread_count
        );
        Ok(true)
    }

    /// Marks one notification read. Returns whether it transitioned; an item
    /// already read locally is not sent again.
    pub async fn mark_read(&self, id: &str) -> Result<bool, ApiError> {
        let epoch = {
            let inbox = self.inbox();
            if inbox.read.contains(id) {
                return Ok(false);
            }
            inbox.epoch
        };

        self.api.mark_notification_read(id).await?;

        let mut inbox = self.inbox();
        if inbox.epoch != epoch {
            return Ok(false);
        }
        inbox.read.insert(id.to_string());

        let transitioned = match inbox.notifications.iter_mut().find(|n| n.id == id) {
            Some(notification) if notification.is_unread() => {
                notification.read_status = ReadStatus::Read;
                true
            }
            _ => false,
        };
        if transitioned {
            inbox.unread_count = inbox.unread_count.saturating_sub(1);
        }
        Ok(transitioned)
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        let epoch = self.inbox().epoch;
        self.api.mark_all_notifications_read().await?;

        let mut inbox = self.inbox();
        if inbox.epoch != epoch {
            return Ok(());
        }
        let Inbox {
            notifications,
            read,
            ..
        } = &mut *inbox;
        for notification in notifications.iter_mut() {
            notification.read_status = ReadStatus::Read;
            read.insert(notification.id.clone());
        }
        inbox.unread_count = 0;
        Ok(())
    }
}
