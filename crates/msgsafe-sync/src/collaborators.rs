//! Seams to the surrounding application.
//!
//! The backup subsystem never talks to the directory server, the contact
//! database or the notification system directly; it goes through these
//! traits. Production wires in real services, tests wire in the doubles
//! from [`crate::testing`].

use std::sync::Arc;

use async_trait::async_trait;

use msgsafe_api::TokenProvider;
use msgsafe_core::document::{BackupGroup, BackupSettings, UserLink};
use msgsafe_core::SafeResult;

/// The local user's own identity material, as needed for a backup.
#[derive(Debug, Clone, Default)]
pub struct IdentityProfile {
    pub identity: String,
    /// Raw identity secret key. Without it there is nothing worth backing
    /// up.
    pub private_key: Vec<u8>,
    pub nickname: Option<String>,
    pub profile_pic: Option<Vec<u8>>,
    /// `["*"]` = everyone, `[None]` = nobody, otherwise identities.
    pub profile_pic_release: Option<Vec<Option<String>>>,
}

/// A contact as known to the local database, before backup minimization.
#[derive(Debug, Clone, Default)]
pub struct ContactRecord {
    pub identity: String,
    pub public_key: Vec<u8>,
    pub created_at: Option<u64>,
    pub verification: i64,
    pub work_verified: bool,
    pub hidden: bool,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub nickname: Option<String>,
    pub read_receipts: Option<i64>,
    pub typing_indicators: Option<i64>,
    pub private_conversation: bool,
    pub last_update: Option<u64>,
}

/// A group as known to the local database.
#[derive(Debug, Clone, Default)]
pub struct GroupRecord {
    pub id: Vec<u8>,
    /// `None` means the local user created the group.
    pub creator: Option<String>,
    pub name: Option<String>,
    pub members: Vec<String>,
    pub private_conversation: bool,
    pub last_update: Option<u64>,
}

/// Directory lookup result for one identity.
#[derive(Debug, Clone)]
pub struct DirectoryContact {
    pub identity: String,
    pub public_key: Vec<u8>,
}

/// The identity directory server.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Default backup server URL template; may contain the
    /// `{backupIdPrefix}` placeholder.
    async fn default_server_template(&self) -> SafeResult<String>;

    /// Bulk-resolve identities to public keys. Unknown identities are
    /// simply absent from the result.
    async fn bulk_lookup(&self, identities: &[String]) -> SafeResult<Vec<DirectoryContact>>;

    /// Push the (restored) local identity to the directory. Failure here
    /// is fatal for a restore.
    async fn update_identity(&self) -> SafeResult<()>;

    async fn link_phone(&self, phone: &str) -> SafeResult<()>;
    async fn link_email(&self, email: &str) -> SafeResult<()>;
}

/// The local user's identity store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// `None` when no identity with a private key exists.
    async fn profile(&self) -> SafeResult<Option<IdentityProfile>>;

    /// Verified phone/email links, ready for the backup payload.
    async fn verified_links(&self) -> SafeResult<Vec<UserLink>>;

    /// Install a restored identity secret key.
    async fn restore_identity(&self, identity: &str, private_key: &[u8]) -> SafeResult<()>;

    async fn set_nickname(&self, nickname: &str) -> SafeResult<()>;

    async fn set_profile_picture(
        &self,
        picture: Option<Vec<u8>>,
        release: Option<Vec<Option<String>>>,
    ) -> SafeResult<()>;
}

/// Contact database and app settings.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn contacts(&self) -> SafeResult<Vec<ContactRecord>>;
    async fn groups(&self) -> SafeResult<Vec<GroupRecord>>;
    async fn settings(&self) -> SafeResult<BackupSettings>;

    /// Create or update a contact from a backup entry. `public_key` is the
    /// directory-resolved key when the backup omitted one.
    async fn upsert_contact(
        &self,
        contact: &msgsafe_core::document::BackupContact,
        public_key: Option<&[u8]>,
    ) -> SafeResult<()>;

    async fn create_conversation(&self, identity: &str) -> SafeResult<()>;

    async fn apply_settings(&self, settings: &BackupSettings) -> SafeResult<()>;
}

#[async_trait]
pub trait GroupManager: Send + Sync {
    async fn create_or_update(&self, group: &BackupGroup) -> SafeResult<()>;
}

/// Managed-deployment overrides for linked addresses.
///
/// When an override is present it wins over whatever the backup carries.
pub trait LinkPolicy: Send + Sync {
    fn phone_override(&self) -> Option<String>;
    fn email_override(&self) -> Option<String>;
}

/// Local notification surface for reminders and failure alerts.
pub trait NotificationScheduler: Send + Sync {
    fn cancel_reminder(&self);
    /// Schedule the "back up again" reminder for a future instant.
    fn schedule_reminder(&self, at_unix: u64);
    /// The backup is already overdue; tell the user now.
    fn notify_overdue(&self, days_overdue: u64);
    /// Interactive "backups keep failing" alert.
    fn alert_backup_failing(&self);
}

/// Everything the scheduler and restore need from the host application.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn DirectoryService>,
    pub identity: Arc<dyn IdentityStore>,
    pub entities: Arc<dyn EntityStore>,
    pub groups: Arc<dyn GroupManager>,
    pub links: Arc<dyn LinkPolicy>,
    pub notifications: Arc<dyn NotificationScheduler>,
    pub tokens: Option<Arc<dyn TokenProvider>>,
}
