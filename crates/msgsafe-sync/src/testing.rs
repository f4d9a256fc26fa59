//! In-memory collaborator doubles.
//!
//! Shared by the unit tests here and the integration tests under
//! `tests/`; also handy for downstream consumers wiring the subsystem up
//! in a harness before the real services exist.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use msgsafe_core::document::{BackupContact, BackupGroup, BackupSettings, UserLink};
use msgsafe_core::{SafeError, SafeResult};

use crate::collaborators::{
    ContactRecord, DirectoryContact, DirectoryService, EntityStore, GroupManager, GroupRecord,
    IdentityProfile, IdentityStore, LinkPolicy, NotificationScheduler,
};

#[derive(Default)]
pub struct MockDirectory {
    pub template: Mutex<String>,
    pub known: Mutex<Vec<DirectoryContact>>,
    pub linked_phones: Mutex<Vec<String>>,
    pub linked_emails: Mutex<Vec<String>>,
    pub identity_updated: AtomicBool,
    pub fail_identity_update: AtomicBool,
    pub fail_links: AtomicBool,
}

impl MockDirectory {
    pub fn with_template(template: &str) -> Self {
        let dir = Self::default();
        *dir.template.lock().unwrap() = template.to_string();
        dir
    }

    pub fn add_known(&self, identity: &str, public_key: &[u8]) {
        self.known.lock().unwrap().push(DirectoryContact {
            identity: identity.to_string(),
            public_key: public_key.to_vec(),
        });
    }
}

#[async_trait]
impl DirectoryService for MockDirectory {
    async fn default_server_template(&self) -> SafeResult<String> {
        Ok(self.template.lock().unwrap().clone())
    }

    async fn bulk_lookup(&self, identities: &[String]) -> SafeResult<Vec<DirectoryContact>> {
        let known = self.known.lock().unwrap();
        Ok(known
            .iter()
            .filter(|c| identities.iter().any(|i| i.eq_ignore_ascii_case(&c.identity)))
            .cloned()
            .collect())
    }

    async fn update_identity(&self) -> SafeResult<()> {
        if self.fail_identity_update.load(Ordering::SeqCst) {
            return Err(SafeError::Transport("directory unavailable".into()));
        }
        self.identity_updated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn link_phone(&self, phone: &str) -> SafeResult<()> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(SafeError::Transport("link failed".into()));
        }
        self.linked_phones.lock().unwrap().push(phone.to_string());
        Ok(())
    }

    async fn link_email(&self, email: &str) -> SafeResult<()> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(SafeError::Transport("link failed".into()));
        }
        self.linked_emails.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockIdentity {
    pub profile: Mutex<Option<IdentityProfile>>,
    pub links: Mutex<Vec<UserLink>>,
    pub restored: Mutex<Option<(String, Vec<u8>)>>,
    pub nickname: Mutex<Option<String>>,
    pub picture: Mutex<Option<(Option<Vec<u8>>, Option<Vec<Option<String>>>)>>,
}

impl MockIdentity {
    pub fn with_profile(profile: IdentityProfile) -> Self {
        let identity = Self::default();
        *identity.profile.lock().unwrap() = Some(profile);
        identity
    }
}

#[async_trait]
impl IdentityStore for MockIdentity {
    async fn profile(&self) -> SafeResult<Option<IdentityProfile>> {
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn verified_links(&self) -> SafeResult<Vec<UserLink>> {
        Ok(self.links.lock().unwrap().clone())
    }

    async fn restore_identity(&self, identity: &str, private_key: &[u8]) -> SafeResult<()> {
        *self.restored.lock().unwrap() = Some((identity.to_string(), private_key.to_vec()));
        Ok(())
    }

    async fn set_nickname(&self, nickname: &str) -> SafeResult<()> {
        *self.nickname.lock().unwrap() = Some(nickname.to_string());
        Ok(())
    }

    async fn set_profile_picture(
        &self,
        picture: Option<Vec<u8>>,
        release: Option<Vec<Option<String>>>,
    ) -> SafeResult<()> {
        *self.picture.lock().unwrap() = Some((picture, release));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockEntities {
    pub contacts: Mutex<Vec<ContactRecord>>,
    pub groups: Mutex<Vec<GroupRecord>>,
    pub settings: Mutex<BackupSettings>,
    pub upserted: Mutex<Vec<(BackupContact, Option<Vec<u8>>)>>,
    pub conversations: Mutex<Vec<String>>,
    pub applied_settings: Mutex<Option<BackupSettings>>,
}

#[async_trait]
impl EntityStore for MockEntities {
    async fn contacts(&self) -> SafeResult<Vec<ContactRecord>> {
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn groups(&self) -> SafeResult<Vec<GroupRecord>> {
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn settings(&self) -> SafeResult<BackupSettings> {
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn upsert_contact(
        &self,
        contact: &BackupContact,
        public_key: Option<&[u8]>,
    ) -> SafeResult<()> {
        self.upserted
            .lock()
            .unwrap()
            .push((contact.clone(), public_key.map(<[u8]>::to_vec)));
        Ok(())
    }

    async fn create_conversation(&self, identity: &str) -> SafeResult<()> {
        self.conversations.lock().unwrap().push(identity.to_string());
        Ok(())
    }

    async fn apply_settings(&self, settings: &BackupSettings) -> SafeResult<()> {
        *self.applied_settings.lock().unwrap() = Some(settings.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockGroups {
    pub created: Mutex<Vec<BackupGroup>>,
    /// Group IDs (hex) whose creation should fail, to exercise the
    /// skip-and-continue path.
    pub fail_ids: Mutex<Vec<String>>,
}

#[async_trait]
impl GroupManager for MockGroups {
    async fn create_or_update(&self, group: &BackupGroup) -> SafeResult<()> {
        if let Some(id) = &group.id {
            if self.fail_ids.lock().unwrap().contains(id) {
                return Err(SafeError::InvalidData(format!("group {id} rejected")));
            }
        }
        self.created.lock().unwrap().push(group.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticLinkPolicy {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl LinkPolicy for StaticLinkPolicy {
    fn phone_override(&self) -> Option<String> {
        self.phone.clone()
    }

    fn email_override(&self) -> Option<String> {
        self.email.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Cancel,
    Schedule(u64),
    Overdue(u64),
    FailAlert,
}

#[derive(Default)]
pub struct RecordingNotifications {
    pub events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifications {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl NotificationScheduler for RecordingNotifications {
    fn cancel_reminder(&self) {
        self.events.lock().unwrap().push(NotificationEvent::Cancel);
    }

    fn schedule_reminder(&self, at_unix: u64) {
        self.events
            .lock()
            .unwrap()
            .push(NotificationEvent::Schedule(at_unix));
    }

    fn notify_overdue(&self, days_overdue: u64) {
        self.events
            .lock()
            .unwrap()
            .push(NotificationEvent::Overdue(days_overdue));
    }

    fn alert_backup_failing(&self) {
        self.events.lock().unwrap().push(NotificationEvent::FailAlert);
    }
}
