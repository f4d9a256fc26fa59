//! Restore orchestration.
//!
//! Rebuilds a client from a downloaded backup: derive the key, find the
//! server, download, decrypt, decode, then walk the document. Identity
//! restoration and its directory propagation are fatal; everything after
//! that (links, individual contacts, individual groups) is restored best
//! effort with a `warn!` per failure, because a half-restored address book
//! beats an aborted restore.

use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secrecy::SecretString;
use tracing::{info, warn};
use url::Url;

use msgsafe_api::{resolve_auth, Auth, SafeApiClient};
use msgsafe_core::document::{BackupGroup, UserLink};
use msgsafe_core::{server, BackupDocument, SafeError, SafeResult};
use msgsafe_crypto::{decrypt, derive_master_key, MasterKey};
use msgsafe_store::SafeConfigManager;

use crate::blocking;
use crate::collaborators::Collaborators;
use crate::scheduler::CustomServer;

/// File name for the decrypted-but-undecodable payload dump.
const DIAGNOSTICS_FILE: &str = "safe-backup.json";

pub struct RestoreRequest {
    pub identity: String,
    pub password: SecretString,
    pub custom_server: Option<CustomServer>,
    /// Restore only the identity, skipping contacts, groups and settings.
    pub identity_only: bool,
    /// Re-activate backups afterwards even for an identity-only restore.
    pub activate_anyway: bool,
}

pub struct RestoreOrchestrator {
    config: Arc<SafeConfigManager>,
    api: SafeApiClient,
    deps: Collaborators,
    diagnostics_dir: PathBuf,
}

impl RestoreOrchestrator {
    pub fn new(
        config: Arc<SafeConfigManager>,
        deps: Collaborators,
        diagnostics_dir: impl Into<PathBuf>,
    ) -> SafeResult<Self> {
        Ok(RestoreOrchestrator {
            config,
            api: SafeApiClient::new()?,
            deps,
            diagnostics_dir: diagnostics_dir.into(),
        })
    }

    /// Bridge for synchronous call sites; multi-thread runtime only.
    pub fn restore_blocking(&self, request: RestoreRequest) -> SafeResult<()> {
        blocking::run_blocking(self.restore(request))
    }

    pub async fn restore(&self, request: RestoreRequest) -> SafeResult<()> {
        let key = derive_master_key(&request.identity, &request.password)?;

        let (server_url, user, pass) = self.resolve_server(&request, &key).await?;
        let auth = resolve_auth(user.as_deref(), pass.as_deref(), self.deps.tokens.as_deref())
            .await?;

        let blob = self.download(&server_url, &key, &auth).await?;
        let payload = decrypt(&key, &blob)
            .map_err(|_| SafeError::RestoreFailed("could not decrypt backup".into()))?;
        let document = self.decode_or_dump(&payload)?;

        self.restore_identity(&request, &document).await?;
        if !request.identity_only {
            self.restore_data(&request, &document).await?;
        }

        if !request.identity_only || request.activate_anyway {
            self.reactivate(&request, &key, server_url, user, pass)?;
        }
        info!(identity = %request.identity, "restore finished");
        Ok(())
    }

    async fn resolve_server(
        &self,
        request: &RestoreRequest,
        key: &MasterKey,
    ) -> SafeResult<(Url, Option<String>, Option<String>)> {
        match &request.custom_server {
            Some(custom) => {
                let auth = server::extract_server_auth(&custom.server)?;
                let user = custom.user.clone().or(auth.user);
                let pass = custom.password.clone().or(auth.password);
                Ok((auth.server, user, pass))
            }
            None => {
                let template = self.deps.directory.default_server_template().await?;
                let url = server::expand_default_server(&template, key.backup_id())?;
                Ok((url, None, None))
            }
        }
    }

    async fn download(&self, server_url: &Url, key: &MasterKey, auth: &Auth) -> SafeResult<Vec<u8>> {
        match self.api.download(server_url, key.backup_id(), auth).await {
            Ok(blob) => Ok(blob),
            Err(SafeError::Server { status: 404, .. }) => Err(SafeError::RestoreFailed(
                "no backup found for this identity and password".into(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Decode the payload; an undecodable one is persisted for support
    /// diagnosis before the restore fails.
    fn decode_or_dump(&self, payload: &[u8]) -> SafeResult<BackupDocument> {
        match BackupDocument::from_bytes(payload) {
            Ok(document) => Ok(document),
            Err(e) => {
                let path = self.diagnostics_dir.join(DIAGNOSTICS_FILE);
                match std::fs::create_dir_all(&self.diagnostics_dir)
                    .and_then(|()| std::fs::write(&path, payload))
                {
                    Ok(()) => warn!(path = %path.display(), "undecodable backup payload saved"),
                    Err(io) => warn!(error = %io, "could not save undecodable backup payload"),
                }
                match e {
                    SafeError::VersionMismatch(v) => Err(SafeError::VersionMismatch(v)),
                    other => Err(SafeError::RestoreFailed(format!("invalid backup: {other}"))),
                }
            }
        }
    }

    async fn restore_identity(
        &self,
        request: &RestoreRequest,
        document: &BackupDocument,
    ) -> SafeResult<()> {
        let user = document
            .user
            .as_ref()
            .ok_or_else(|| SafeError::RestoreFailed("backup has no identity".into()))?;
        let encoded = user
            .privatekey
            .as_deref()
            .ok_or_else(|| SafeError::RestoreFailed("backup has no identity key".into()))?;
        let private_key = BASE64
            .decode(encoded)
            .map_err(|_| SafeError::RestoreFailed("malformed identity key in backup".into()))?;

        self.deps
            .identity
            .restore_identity(&request.identity, &private_key)
            .await?;
        self.deps
            .directory
            .update_identity()
            .await
            .map_err(|e| SafeError::RestoreError(format!("identity propagation failed: {e}")))?;

        if let Some(nickname) = user.nickname.as_deref() {
            if let Err(e) = self.deps.identity.set_nickname(nickname).await {
                warn!(error = %e, "could not restore nickname");
            }
        }
        let picture = match user.profile_pic.as_deref() {
            Some(encoded) => match BASE64.decode(encoded) {
                Ok(picture) => Some(picture),
                Err(_) => {
                    warn!("malformed profile picture in backup, skipping");
                    None
                }
            },
            None => None,
        };
        if picture.is_some() || user.profile_pic_release.is_some() {
            if let Err(e) = self
                .deps
                .identity
                .set_profile_picture(picture, user.profile_pic_release.clone())
                .await
            {
                warn!(error = %e, "could not restore profile picture");
            }
        }

        // Linked addresses: managed overrides beat the backup, and a
        // failed link never aborts the restore.
        let (phone, email) = choose_links(&self.deps, user.links.as_deref().unwrap_or(&[]));
        if let Some(phone) = phone {
            if let Err(e) = self.deps.directory.link_phone(&phone).await {
                warn!(error = %e, "could not re-link phone number");
            }
        }
        if let Some(email) = email {
            if let Err(e) = self.deps.directory.link_email(&email).await {
                warn!(error = %e, "could not re-link email address");
            }
        }
        Ok(())
    }

    async fn restore_data(
        &self,
        request: &RestoreRequest,
        document: &BackupDocument,
    ) -> SafeResult<()> {
        if let Some(settings) = &document.settings {
            self.deps.entities.apply_settings(settings).await?;
        }
        if let Some(contacts) = &document.contacts {
            self.restore_contacts(request, contacts).await?;
        }
        if let Some(groups) = &document.groups {
            self.restore_groups(groups).await;
        }
        Ok(())
    }

    async fn restore_contacts(
        &self,
        request: &RestoreRequest,
        contacts: &[msgsafe_core::document::BackupContact],
    ) -> SafeResult<()> {
        let identities: Vec<String> = contacts
            .iter()
            .filter_map(|c| c.identity.clone())
            .filter(|i| !i.eq_ignore_ascii_case(&request.identity))
            .collect();
        let resolved = self.deps.directory.bulk_lookup(&identities).await?;

        for contact in contacts {
            let Some(identity) = contact.identity.as_deref() else {
                warn!("contact without identity in backup, skipping");
                continue;
            };
            if identity.eq_ignore_ascii_case(&request.identity) {
                continue;
            }
            let public_key = match contact.publickey.as_deref() {
                Some(encoded) => match BASE64.decode(encoded) {
                    Ok(key) => Some(key),
                    Err(_) => {
                        warn!(identity, "malformed public key in backup, skipping contact");
                        continue;
                    }
                },
                None => resolved
                    .iter()
                    .find(|r| r.identity.eq_ignore_ascii_case(identity))
                    .map(|r| r.public_key.clone()),
            };
            let Some(public_key) = public_key else {
                warn!(identity, "identity unknown to the directory, skipping contact");
                continue;
            };

            if let Err(e) = self
                .deps
                .entities
                .upsert_contact(contact, Some(&public_key))
                .await
            {
                warn!(identity, error = %e, "could not restore contact");
                continue;
            }
            // Only contacts the user actually talked to get a conversation.
            if contact.private == Some(true) || contact.last_update.is_some() {
                if let Err(e) = self.deps.entities.create_conversation(identity).await {
                    warn!(identity, error = %e, "could not restore conversation");
                }
            }
        }
        Ok(())
    }

    async fn restore_groups(&self, groups: &[BackupGroup]) {
        for group in groups {
            if !group_is_restorable(group) {
                warn!(id = group.id.as_deref(), "incomplete group in backup, skipping");
                continue;
            }
            if let Err(e) = self.deps.groups.create_or_update(group).await {
                warn!(id = group.id.as_deref(), error = %e, "could not restore group");
            }
        }
    }

    fn reactivate(
        &self,
        request: &RestoreRequest,
        key: &MasterKey,
        server_url: Url,
        user: Option<String>,
        pass: Option<String>,
    ) -> SafeResult<()> {
        let custom = request
            .custom_server
            .as_ref()
            .map(|_| server_url.to_string());
        self.config.update(|d| {
            d.key = Some(key.as_bytes().to_vec());
            d.custom_server = custom;
            d.server = Some(server_url.to_string());
            d.server_user = user;
            d.server_password = pass;
            d.is_triggered = true;
        })?;
        Ok(())
    }
}

/// Pick the addresses to re-link: managed overrides first, then the
/// backup's verified links.
fn choose_links(deps: &Collaborators, links: &[UserLink]) -> (Option<String>, Option<String>) {
    let backup_phone = links
        .iter()
        .find(|l| l.kind == "mobile" || l.kind == "phone")
        .and_then(|l| l.value.clone());
    let backup_email = links
        .iter()
        .find(|l| l.kind == "email")
        .and_then(|l| l.value.clone());
    (
        deps.links.phone_override().or(backup_phone),
        deps.links.email_override().or(backup_email),
    )
}

fn group_is_restorable(group: &BackupGroup) -> bool {
    group.id.is_some() && group.creator.is_some() && group.members.is_some()
}
