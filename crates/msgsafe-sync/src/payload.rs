//! Backup payload assembly.
//!
//! Turns the local state exposed by the collaborators into a
//! [`BackupDocument`]. Minimization happens here: the own identity is
//! never written as a contact, and a contact's public key is only
//! included while its verification is still low enough that the directory
//! would not re-supply it on restore.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use msgsafe_core::document::{BackupContact, BackupGroup, BackupUser};
use msgsafe_core::{BackupDocument, SafeResult};

use crate::collaborators::{ContactRecord, EntityStore, GroupRecord, IdentityStore};

/// Verification levels at or above this re-resolve their public key from
/// the directory on restore, so it is left out of the backup.
const VERIFICATION_DIRECTORY_RESOLVED: i64 = 2;

/// Build the backup document, or `None` when there is no identity with a
/// private key to back up.
pub async fn build_backup_document(
    device: &str,
    identity: &dyn IdentityStore,
    entities: &dyn EntityStore,
) -> SafeResult<Option<BackupDocument>> {
    let Some(profile) = identity.profile().await? else {
        return Ok(None);
    };
    if profile.private_key.is_empty() {
        return Ok(None);
    }
    let own_identity = profile.identity.clone();

    let links = identity.verified_links().await?;
    let user = BackupUser {
        privatekey: Some(BASE64.encode(&profile.private_key)),
        nickname: profile.nickname,
        profile_pic: profile.profile_pic.as_deref().map(|p| BASE64.encode(p)),
        profile_pic_release: profile.profile_pic_release,
        links: if links.is_empty() { None } else { Some(links) },
    };

    let contacts: Vec<BackupContact> = entities
        .contacts()
        .await?
        .into_iter()
        .filter(|c| !c.identity.eq_ignore_ascii_case(&own_identity))
        .map(backup_contact)
        .collect();

    let groups: Vec<BackupGroup> = entities
        .groups()
        .await?
        .into_iter()
        .map(|g| backup_group(g, &own_identity))
        .collect();

    let mut document = BackupDocument::with_device(device);
    document.user = Some(user);
    document.contacts = if contacts.is_empty() { None } else { Some(contacts) };
    document.groups = if groups.is_empty() { None } else { Some(groups) };
    document.settings = Some(entities.settings().await?);
    Ok(Some(document))
}

fn backup_contact(record: ContactRecord) -> BackupContact {
    let publickey = (record.verification < VERIFICATION_DIRECTORY_RESOLVED)
        .then(|| BASE64.encode(&record.public_key));
    BackupContact {
        identity: Some(record.identity),
        publickey,
        created_at: record.created_at,
        verification: Some(record.verification),
        work_verified: Some(record.work_verified),
        hidden: Some(record.hidden),
        firstname: record.firstname,
        lastname: record.lastname,
        nickname: record.nickname,
        private: record.private_conversation.then_some(true),
        read_receipts: record.read_receipts,
        typing_indicators: record.typing_indicators,
        last_update: record.last_update,
    }
}

fn backup_group(record: GroupRecord, own_identity: &str) -> BackupGroup {
    BackupGroup {
        id: Some(hex::encode(&record.id)),
        creator: Some(record.creator.unwrap_or_else(|| own_identity.to_string())),
        groupname: record.name,
        members: Some(record.members),
        deleted: None,
        private: record.private_conversation.then_some(true),
        last_update: record.last_update,
    }
}
