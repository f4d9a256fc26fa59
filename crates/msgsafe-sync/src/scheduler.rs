//! Backup scheduling and execution.
//!
//! `SafeManager` runs the whole lifecycle: activation (key derivation and
//! server discovery), the debounced trigger task, the single-flight backup
//! body, reminder computation and deactivation.
//!
//! Locking: the single-flight `RunState` mutex is separate from the config
//! manager's lock and is only held for the go/no-go decision, never across
//! an await.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use secrecy::SecretString;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use msgsafe_api::{resolve_auth, Auth, SafeApiClient};
use msgsafe_core::config::result;
use msgsafe_core::{
    server, SafeError, SafeResult, ServerPolicy, DEFAULT_MAX_BACKUP_BYTES, DEFAULT_RETENTION_DAYS,
};
use msgsafe_crypto::{checksum, derive_master_key, encrypt, MasterKey};
use msgsafe_store::SafeConfigManager;

use crate::bus::EventBus;
use crate::collaborators::Collaborators;
use crate::payload::build_backup_document;

const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(5);
const DEFAULT_UPLOAD_BUDGET: Duration = Duration::from_secs(60);
const ONE_DAY_SECS: u64 = 24 * 60 * 60;
/// Repeated-failure alert kicks in once the last good backup is this old.
const FAILURE_ALERT_AFTER_SECS: u64 = 7 * ONE_DAY_SECS;

/// A user-entered server, credentials separate from the URL.
#[derive(Debug, Clone)]
pub struct CustomServer {
    pub server: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Default)]
struct RunState {
    running: bool,
}

enum Outcome {
    Success { size: u64, checksum: String },
    Skipped,
    MissingKey,
    MissingData,
    SizeExceeded { size: u64, max: u64 },
    Failed(String),
}

struct Inner {
    config: Arc<SafeConfigManager>,
    api: SafeApiClient,
    deps: Collaborators,
    bus: EventBus,
    run_state: StdMutex<RunState>,
    backgrounded: AtomicBool,
    trigger_started: AtomicBool,
    debounce: Duration,
    upload_budget: Duration,
    device: String,
}

#[derive(Clone)]
pub struct SafeManager {
    inner: Arc<Inner>,
}

impl SafeManager {
    pub fn new(config: Arc<SafeConfigManager>, deps: Collaborators) -> SafeResult<Self> {
        Self::with_upload_budget(config, deps, DEFAULT_UPLOAD_BUDGET)
    }

    /// Like [`SafeManager::new`] with a custom encrypt+upload time budget.
    pub fn with_upload_budget(
        config: Arc<SafeConfigManager>,
        deps: Collaborators,
        upload_budget: Duration,
    ) -> SafeResult<Self> {
        Ok(SafeManager {
            inner: Arc::new(Inner {
                config,
                api: SafeApiClient::new()?,
                deps,
                bus: EventBus::new(),
                run_state: StdMutex::new(RunState::default()),
                backgrounded: AtomicBool::new(false),
                trigger_started: AtomicBool::new(false),
                debounce: DEFAULT_DEBOUNCE,
                upload_budget,
                device: std::env::consts::OS.to_string(),
            }),
        })
    }

    pub fn config(&self) -> &Arc<SafeConfigManager> {
        &self.inner.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn is_activated(&self) -> SafeResult<bool> {
        Ok(self.inner.config.get()?.is_activated())
    }

    /// While backgrounded, incoming triggers are dropped instead of being
    /// scheduled.
    pub fn set_backgrounded(&self, backgrounded: bool) {
        self.inner.backgrounded.store(backgrounded, Ordering::SeqCst);
    }

    /// Queue a backup. `None` uses the default debounce, `Some(0)` forces
    /// an immediate run.
    pub fn trigger(&self, delay_secs: Option<u64>) {
        self.inner.bus.trigger(delay_secs);
    }

    // ── Activation ─────────────────────────────────────────────────────

    /// Turn backups on: derive the key, resolve and probe the server,
    /// persist everything, start the trigger task.
    ///
    /// With a custom server the entered URL must be https; credentials
    /// embedded in it are split out. Without one, the default server is
    /// discovered from the directory template and the BackupID.
    pub async fn activate(
        &self,
        password: &SecretString,
        custom: Option<CustomServer>,
    ) -> SafeResult<()> {
        let inner = &self.inner;
        let key = derive_master_key(inner.config.identity(), password)?;

        let (custom_server, server_url, user, pass) = match custom {
            Some(custom) => {
                let auth = server::extract_server_auth(&custom.server)?;
                let user = custom.user.or(auth.user);
                let pass = custom.password.or(auth.password);
                (
                    Some(auth.server.to_string()),
                    auth.server,
                    user,
                    pass,
                )
            }
            None => {
                let template = inner.deps.directory.default_server_template().await?;
                let url = server::expand_default_server(&template, key.backup_id())?;
                (None, url, None, None)
            }
        };

        let auth = self.resolve_auth(user.as_deref(), pass.as_deref()).await?;
        let body = inner.api.test_server(&server_url, &auth).await?;
        let policy = ServerPolicy::from_bytes(&body)?;
        info!(server = %server_url, max_bytes = policy.max_backup_bytes, "backup server accepted");

        inner.config.update(|data| {
            data.key = Some(key.as_bytes().to_vec());
            data.custom_server = custom_server;
            data.server = Some(server_url.to_string());
            data.server_user = user;
            data.server_password = pass;
            data.max_backup_bytes = Some(policy.max_backup_bytes);
            data.retention_days = Some(policy.retention_days);
            data.is_triggered = true;
        })?;

        self.init_trigger();
        self.set_backup_reminder()?;
        inner.bus.broadcast_refresh();
        Ok(())
    }

    /// Turn backups off. The remote blob delete is best effort: a dead
    /// server must not keep the user locked in.
    pub async fn deactivate(&self) -> SafeResult<()> {
        let inner = &self.inner;
        let data = inner.config.get()?;
        if let (Some(key), Some(server_str)) = (&data.key, &data.server) {
            match self.delete_remote(key, server_str, &data).await {
                Ok(()) => debug!("remote backup deleted"),
                Err(e) => warn!(error = %e, "could not delete remote backup"),
            }
        }
        inner.config.destroy()?;
        inner.deps.notifications.cancel_reminder();
        inner.bus.broadcast_refresh();
        Ok(())
    }

    async fn delete_remote(
        &self,
        key: &[u8],
        server_str: &str,
        data: &msgsafe_core::SafeData,
    ) -> SafeResult<()> {
        let key = MasterKey::from_slice(key)?;
        let server = Url::parse(server_str)
            .map_err(|e| SafeError::InvalidUrl(format!("{server_str}: {e}")))?;
        let auth = self
            .resolve_auth(data.server_user.as_deref(), data.server_password.as_deref())
            .await?;
        self.inner.api.delete(&server, key.backup_id(), &auth).await
    }

    /// Re-point an activated install at a (possibly managed) server.
    ///
    /// A change of server invalidates everything learned from the old
    /// one: policy, last result, checksum. The next backup re-probes and
    /// re-uploads.
    pub async fn apply_server(
        &self,
        new_server: Option<&str>,
        user: Option<&str>,
        password: Option<&str>,
    ) -> SafeResult<()> {
        let inner = &self.inner;
        let data = inner.config.get()?;
        let Some(key_bytes) = &data.key else {
            return Ok(());
        };

        let resolved = match new_server {
            Some(entered) => server::extract_server_auth(entered)?.server,
            None => {
                let key = MasterKey::from_slice(key_bytes)?;
                let template = inner.deps.directory.default_server_template().await?;
                server::expand_default_server(&template, key.backup_id())?
            }
        };

        if data.server.as_deref() == Some(resolved.as_str()) {
            return Ok(());
        }
        info!(server = %resolved, "backup server changed");
        inner.config.update(|d| {
            d.custom_server = new_server.map(|_| resolved.to_string());
            d.server = Some(resolved.to_string());
            d.server_user = user.map(str::to_string);
            d.server_password = password.map(str::to_string);
            d.max_backup_bytes = None;
            d.retention_days = None;
            d.last_result = None;
            d.last_checksum = None;
            d.is_triggered = true;
        })?;
        inner.bus.broadcast_refresh();
        Ok(())
    }

    // ── Trigger task ───────────────────────────────────────────────────

    /// Start the debounce task. Safe to call repeatedly; only the first
    /// call spawns.
    pub fn init_trigger(&self) {
        if self.inner.trigger_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(mut rx) = self.inner.bus.take_trigger_receiver() else {
            return;
        };
        let mgr = self.clone();
        tokio::spawn(async move {
            // Deadline plus whether any coalesced trigger was forced.
            let mut pending: Option<(Instant, bool)> = None;
            loop {
                let sleep_to = pending
                    .map(|(deadline, _)| deadline)
                    .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
                tokio::select! {
                    msg = rx.recv() => {
                        let Some(trigger) = msg else { break };
                        if mgr.inner.backgrounded.load(Ordering::SeqCst) {
                            debug!("backgrounded, dropping backup trigger");
                            continue;
                        }
                        if !mgr.is_activated().unwrap_or(false) {
                            continue;
                        }
                        let force = trigger.is_forced();
                        let delay = Duration::from_secs(
                            trigger.delay_secs.unwrap_or(mgr.inner.debounce.as_secs()),
                        );
                        // A new trigger replaces the pending deadline;
                        // forcedness sticks until the run happens.
                        let when = Instant::now() + delay;
                        pending = Some(match pending {
                            Some((_, forced)) => (when, forced || force),
                            None => (when, force),
                        });
                    }
                    _ = tokio::time::sleep_until(sleep_to), if pending.is_some() => {
                        if let Some((_, force)) = pending.take() {
                            mgr.backup_now(force).await;
                        }
                    }
                }
            }
            debug!("backup trigger task stopped");
        });
    }

    // ── Backup body ────────────────────────────────────────────────────

    /// Run a backup right now, subject to the single-flight rules.
    pub async fn backup_now(&self, force: bool) {
        let inner = &self.inner;

        // Go/no-go under the run-state lock; the lock is released before
        // any awaiting happens.
        {
            let Ok(mut run_state) = inner.run_state.lock() else {
                return;
            };
            if run_state.running {
                if force {
                    info!("backup already running, rejecting forced run");
                    let _ = inner.config.update(|d| {
                        d.last_result = Some(result::ALREADY_RUNNING.into());
                    });
                    inner.bus.broadcast_refresh();
                } else {
                    let _ = inner.config.update(|d| d.is_triggered = true);
                }
                return;
            }
            if !force {
                if let Ok(data) = inner.config.get() {
                    let recent = data
                        .last_backup
                        .map(|last| now_secs().saturating_sub(last) < ONE_DAY_SECS)
                        .unwrap_or(false);
                    if recent {
                        let _ = inner.config.update(|d| d.is_triggered = true);
                        return;
                    }
                }
            }
            run_state.running = true;
        }
        let _ = inner
            .config
            .update(|d| d.backup_started_at = Some(now_secs()));

        let outcome = self.run_backup(force).await;
        self.record_outcome(outcome);

        if let Ok(mut run_state) = inner.run_state.lock() {
            run_state.running = false;
        }
        // Completion always recomputes the reminder and pokes the UI,
        // success or not.
        if let Err(e) = self.set_backup_reminder() {
            warn!(error = %e, "could not update backup reminder");
        }
        inner.bus.broadcast_refresh();
    }

    async fn run_backup(&self, force: bool) -> Outcome {
        let inner = &self.inner;
        let data = match inner.config.get() {
            Ok(data) => data,
            Err(e) => return Outcome::Failed(e.to_string()),
        };
        let Some(key_bytes) = data.key.clone() else {
            return Outcome::MissingKey;
        };
        let key = match MasterKey::from_slice(&key_bytes) {
            Ok(key) => key,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        let document = match build_backup_document(
            &inner.device,
            inner.deps.identity.as_ref(),
            inner.deps.entities.as_ref(),
        )
        .await
        {
            Ok(Some(document)) => document,
            Ok(None) => return Outcome::MissingData,
            Err(e) => return Outcome::Failed(e.to_string()),
        };
        let payload = match document.to_bytes() {
            Ok(payload) => payload,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        // Unchanged content uploaded recently enough needs no new backup;
        // a forced run always uploads.
        let payload_checksum = checksum(&payload);
        if !force && data.last_checksum.as_deref() == Some(payload_checksum.as_str()) {
            let half_retention_secs =
                u64::from(data.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS)) / 2 * ONE_DAY_SECS;
            let recent_enough = data
                .last_backup
                .map(|last| now_secs().saturating_sub(last) < half_retention_secs)
                .unwrap_or(false);
            if recent_enough {
                debug!("backup content unchanged, skipping");
                return Outcome::Skipped;
            }
        }

        // Resolve the server, discovering the default one if needed.
        let server_str = match data.server.clone() {
            Some(server) => server,
            None => {
                let template = match inner.deps.directory.default_server_template().await {
                    Ok(template) => template,
                    Err(e) => return Outcome::Failed(e.to_string()),
                };
                match server::expand_default_server(&template, key.backup_id()) {
                    Ok(url) => {
                        let url = url.to_string();
                        let _ = inner.config.update(|d| d.server = Some(url.clone()));
                        url
                    }
                    Err(e) => return Outcome::Failed(e.to_string()),
                }
            }
        };
        let server_url = match Url::parse(&server_str) {
            Ok(url) => url,
            Err(e) => return Outcome::Failed(format!("{server_str}: {e}")),
        };
        let auth = match self
            .resolve_auth(data.server_user.as_deref(), data.server_password.as_deref())
            .await
        {
            Ok(auth) => auth,
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        // Probe the server and refresh its advertised policy.
        let max_backup_bytes = match inner.api.test_server(&server_url, &auth).await {
            Ok(body) => match ServerPolicy::from_bytes(&body) {
                Ok(policy) => {
                    let _ = inner.config.update(|d| {
                        d.max_backup_bytes = Some(policy.max_backup_bytes);
                        d.retention_days = Some(policy.retention_days);
                    });
                    policy.max_backup_bytes
                }
                Err(e) => {
                    warn!(error = %e, "unparseable server policy, keeping previous");
                    data.max_backup_bytes.unwrap_or(DEFAULT_MAX_BACKUP_BYTES)
                }
            },
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        // Encrypt and upload inside the execution budget.
        let upload = async {
            let blob = encrypt(&key, &payload)?;
            let size = blob.len() as u64;
            if size > max_backup_bytes {
                return Err(SafeError::SizeLimitExceeded {
                    size,
                    max: max_backup_bytes,
                });
            }
            inner
                .api
                .upload(&server_url, key.backup_id(), &auth, blob)
                .await?;
            Ok(size)
        };
        match tokio::time::timeout(inner.upload_budget, upload).await {
            Err(_) => Outcome::Failed("upload timed out".into()),
            Ok(Err(SafeError::SizeLimitExceeded { size, max })) => {
                Outcome::SizeExceeded { size, max }
            }
            Ok(Err(e)) if e.is_payload_too_large() => {
                let max = max_backup_bytes;
                Outcome::SizeExceeded { size: 0, max }
            }
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
            Ok(Ok(size)) => Outcome::Success {
                size,
                checksum: payload_checksum,
            },
        }
    }

    fn record_outcome(&self, outcome: Outcome) {
        let update = self.inner.config.update(|d| {
            d.backup_started_at = None;
            match &outcome {
                Outcome::Success { size, checksum } => {
                    d.last_backup = Some(now_secs());
                    d.backup_size = Some(*size);
                    d.last_checksum = Some(checksum.clone());
                    d.last_result = Some(result::SUCCESS.into());
                    d.is_triggered = false;
                }
                Outcome::Skipped => d.is_triggered = false,
                Outcome::MissingKey => d.last_result = Some(result::MISSING_KEY.into()),
                Outcome::MissingData => d.last_result = Some(result::MISSING_DATA.into()),
                Outcome::SizeExceeded { .. } => {
                    d.last_result = Some(result::SIZE_EXCEEDED.into());
                }
                Outcome::Failed(detail) => {
                    d.last_result = Some(format!("{}: {detail}", result::FAILED));
                }
            }
        });
        if let Err(e) = update {
            warn!(error = %e, "could not record backup outcome");
        }
        match outcome {
            Outcome::Success { size, .. } => info!(size, "backup uploaded"),
            Outcome::SizeExceeded { size, max } => {
                warn!(size, max, "backup exceeds server size limit")
            }
            Outcome::Failed(detail) => warn!(detail = %detail, "backup failed"),
            _ => {}
        }
    }

    // ── Reminders ──────────────────────────────────────────────────────

    /// Recompute the backup reminder from the current state.
    ///
    /// Pending reminders are always cancelled first. Activated installs
    /// get the next reminder at half the retention window, then at the
    /// full window; past that the user is told immediately how overdue
    /// they are. Separately, an install whose backups keep failing gets
    /// an interactive alert at most once a day.
    pub fn set_backup_reminder(&self) -> SafeResult<()> {
        let inner = &self.inner;
        let notifications = &inner.deps.notifications;
        notifications.cancel_reminder();

        let data = inner.config.get()?;
        if !data.is_activated() {
            return Ok(());
        }
        let Some(last_backup) = data.last_backup else {
            return Ok(());
        };
        let now = now_secs();
        let retention_secs =
            u64::from(data.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS)) * ONE_DAY_SECS;
        let half_due = last_backup + retention_secs / 2;
        let full_due = last_backup + retention_secs;

        if half_due > now {
            notifications.schedule_reminder(half_due);
        } else if full_due > now {
            notifications.schedule_reminder(full_due);
        } else {
            notifications.notify_overdue((now - full_due) / ONE_DAY_SECS);
        }

        if !data.last_result_is_success()
            && now.saturating_sub(last_backup) > FAILURE_ALERT_AFTER_SECS
        {
            let alerted_recently = data
                .last_alert_backup_failed
                .map(|at| now.saturating_sub(at) < ONE_DAY_SECS)
                .unwrap_or(false);
            if !alerted_recently {
                notifications.alert_backup_failing();
                inner
                    .config
                    .update(|d| d.last_alert_backup_failed = Some(now))?;
            }
        }
        Ok(())
    }

    async fn resolve_auth(&self, user: Option<&str>, password: Option<&str>) -> SafeResult<Auth> {
        resolve_auth(
            user,
            password,
            self.inner.deps.tokens.as_deref(),
        )
        .await
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::IdentityProfile;
    use crate::testing::{
        MockDirectory, MockEntities, MockGroups, MockIdentity, NotificationEvent,
        RecordingNotifications, StaticLinkPolicy,
    };
    use msgsafe_store::{MemorySecretStore, SecretStore};

    struct Fixture {
        manager: SafeManager,
        notifications: Arc<RecordingNotifications>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
        let config = Arc::new(SafeConfigManager::new(
            store,
            dir.path().join("safe-config.json"),
            "ECHOECHO",
        ));
        let notifications = Arc::new(RecordingNotifications::default());
        let deps = Collaborators {
            directory: Arc::new(MockDirectory::with_template(
                "https://safe-{backupIdPrefix}.example.com",
            )),
            identity: Arc::new(MockIdentity::with_profile(IdentityProfile {
                identity: "ECHOECHO".into(),
                private_key: vec![1u8; 32],
                ..Default::default()
            })),
            entities: Arc::new(MockEntities::default()),
            groups: Arc::new(MockGroups::default()),
            links: Arc::new(StaticLinkPolicy::default()),
            notifications: notifications.clone(),
            tokens: None,
        };
        Fixture {
            manager: SafeManager::new(config, deps).unwrap(),
            notifications,
            _dir: dir,
        }
    }

    fn activate_locally(manager: &SafeManager) {
        manager
            .config()
            .update(|d| {
                d.key = Some(vec![7u8; 64]);
                d.server = Some("https://server.example.com/".into());
            })
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn backup_without_key_records_missing_key() {
        let fx = fixture();
        fx.manager.backup_now(true).await;
        let data = fx.manager.config().get().unwrap();
        assert_eq!(data.last_result.as_deref(), Some(result::MISSING_KEY));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_reason_is_persisted_with_the_result() {
        let fx = fixture();
        fx.manager
            .config()
            .update(|d| {
                d.key = Some(vec![7u8; 64]);
                // Nothing listens on port 1, so the probe fails fast.
                d.server = Some("http://127.0.0.1:1/".into());
            })
            .unwrap();

        fx.manager.backup_now(true).await;
        let last_result = fx.manager.config().get().unwrap().last_result.unwrap();
        assert!(
            last_result.starts_with(&format!("{}: ", result::FAILED)),
            "{last_result}"
        );
        assert!(last_result.len() > result::FAILED.len() + 2, "{last_result}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unforced_backup_defers_when_last_backup_is_fresh() {
        let fx = fixture();
        activate_locally(&fx.manager);
        fx.manager
            .config()
            .update(|d| {
                d.last_backup = Some(now_secs() - 60);
                d.last_result = Some(result::SUCCESS.into());
            })
            .unwrap();

        fx.manager.backup_now(false).await;
        let data = fx.manager.config().get().unwrap();
        assert!(data.is_triggered);
        // The fresh-backup gate returned before anything ran.
        assert!(data.last_result_is_success());
    }

    #[test]
    fn reminder_schedules_at_half_retention() {
        let fx = fixture();
        activate_locally(&fx.manager);
        let now = now_secs();
        fx.manager
            .config()
            .update(|d| {
                d.last_backup = Some(now - ONE_DAY_SECS);
                d.retention_days = Some(30);
                d.last_result = Some(result::SUCCESS.into());
            })
            .unwrap();

        fx.manager.set_backup_reminder().unwrap();
        let events = fx.notifications.events();
        assert_eq!(events[0], NotificationEvent::Cancel);
        match events[1] {
            NotificationEvent::Schedule(at) => {
                assert_eq!(at, now - ONE_DAY_SECS + 15 * ONE_DAY_SECS);
            }
            ref other => panic!("expected Schedule, got {other:?}"),
        }
    }

    #[test]
    fn reminder_reports_overdue_backups_immediately() {
        let fx = fixture();
        activate_locally(&fx.manager);
        let now = now_secs();
        fx.manager
            .config()
            .update(|d| {
                d.last_backup = Some(now - 40 * ONE_DAY_SECS);
                d.retention_days = Some(30);
                d.last_result = Some(result::SUCCESS.into());
            })
            .unwrap();

        fx.manager.set_backup_reminder().unwrap();
        assert!(fx
            .notifications
            .events()
            .iter()
            .any(|e| matches!(e, NotificationEvent::Overdue(10))));
    }

    #[test]
    fn repeated_failures_alert_once_per_day() {
        let fx = fixture();
        activate_locally(&fx.manager);
        let now = now_secs();
        fx.manager
            .config()
            .update(|d| {
                d.last_backup = Some(now - 10 * ONE_DAY_SECS);
                d.retention_days = Some(180);
                d.last_result = Some(result::FAILED.into());
            })
            .unwrap();

        fx.manager.set_backup_reminder().unwrap();
        fx.manager.set_backup_reminder().unwrap();
        let alerts = fx
            .notifications
            .events()
            .iter()
            .filter(|e| matches!(e, NotificationEvent::FailAlert))
            .count();
        assert_eq!(alerts, 1);
    }

    #[test]
    fn reminder_does_nothing_when_deactivated() {
        let fx = fixture();
        fx.manager.set_backup_reminder().unwrap();
        assert_eq!(fx.notifications.events(), vec![NotificationEvent::Cancel]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_server_resets_server_derived_state() {
        let fx = fixture();
        activate_locally(&fx.manager);
        fx.manager
            .config()
            .update(|d| {
                d.max_backup_bytes = Some(1000);
                d.last_checksum = Some("abc".into());
                d.last_result = Some(result::SUCCESS.into());
            })
            .unwrap();

        fx.manager
            .apply_server(Some("https://managed.example.com"), None, None)
            .await
            .unwrap();

        let data = fx.manager.config().get().unwrap();
        assert_eq!(data.server.as_deref(), Some("https://managed.example.com/"));
        assert_eq!(data.max_backup_bytes, None);
        assert_eq!(data.last_checksum, None);
        assert_eq!(data.last_result, None);
        assert!(data.is_triggered);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_server_with_same_server_is_a_no_op() {
        let fx = fixture();
        activate_locally(&fx.manager);
        fx.manager
            .config()
            .update(|d| d.last_checksum = Some("abc".into()))
            .unwrap();

        fx.manager
            .apply_server(Some("https://server.example.com"), None, None)
            .await
            .unwrap();
        let data = fx.manager.config().get().unwrap();
        assert_eq!(data.last_checksum.as_deref(), Some("abc"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_server_ignores_deactivated_installs() {
        let fx = fixture();
        fx.manager
            .apply_server(Some("https://managed.example.com"), None, None)
            .await
            .unwrap();
        assert_eq!(fx.manager.config().get().unwrap().server, None);
    }
}
