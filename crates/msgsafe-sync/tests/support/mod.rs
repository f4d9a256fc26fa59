//! Shared fixtures: a loopback backup server and wired-up collaborator
//! doubles.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::Router;

use msgsafe_store::{MemorySecretStore, SafeConfigManager, SecretStore};
use msgsafe_sync::testing::{
    MockDirectory, MockEntities, MockGroups, MockIdentity, RecordingNotifications,
    StaticLinkPolicy,
};
use msgsafe_sync::{Collaborators, IdentityProfile, SafeManager};

#[derive(Clone)]
pub struct BackupServer {
    pub blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub uploads: Arc<AtomicUsize>,
    pub max_backup_bytes: u64,
    pub upload_delay: Duration,
}

impl BackupServer {
    pub fn blob(&self, id_hex: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(id_hex).cloned()
    }

    pub fn put_blob(&self, id_hex: &str, blob: Vec<u8>) {
        self.blobs.lock().unwrap().insert(id_hex.to_string(), blob);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

pub async fn spawn_backup_server(
    max_backup_bytes: u64,
    upload_delay: Duration,
) -> (BackupServer, String) {
    let server = BackupServer {
        blobs: Arc::new(Mutex::new(HashMap::new())),
        uploads: Arc::new(AtomicUsize::new(0)),
        max_backup_bytes,
        upload_delay,
    };

    let app = Router::new()
        .route(
            "/config",
            get(|State(s): State<BackupServer>| async move {
                format!(
                    r#"{{"maxBackupBytes":{},"retentionDays":180}}"#,
                    s.max_backup_bytes
                )
            }),
        )
        .route(
            "/backups/{id}",
            put(
                |State(s): State<BackupServer>, Path(id): Path<String>, body: axum::body::Bytes| async move {
                    tokio::time::sleep(s.upload_delay).await;
                    if body.len() as u64 > s.max_backup_bytes {
                        return StatusCode::PAYLOAD_TOO_LARGE;
                    }
                    s.blobs.lock().unwrap().insert(id, body.to_vec());
                    s.uploads.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                },
            )
            .get(
                |State(s): State<BackupServer>, Path(id): Path<String>| async move {
                    match s.blobs.lock().unwrap().get(&id) {
                        Some(blob) => Ok(blob.clone()),
                        None => Err(StatusCode::NOT_FOUND),
                    }
                },
            )
            .delete(
                |State(s): State<BackupServer>, Path(id): Path<String>| async move {
                    s.blobs.lock().unwrap().remove(&id);
                    StatusCode::OK
                },
            ),
        )
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (server, base)
}

pub struct Fixture {
    pub manager: SafeManager,
    pub config: Arc<SafeConfigManager>,
    pub deps: Collaborators,
    pub directory: Arc<MockDirectory>,
    pub identity: Arc<MockIdentity>,
    pub entities: Arc<MockEntities>,
    pub groups: Arc<MockGroups>,
    pub notifications: Arc<RecordingNotifications>,
    pub secret_store: Arc<MemorySecretStore>,
    pub dir: tempfile::TempDir,
}

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Wire a manager against the given server template, with an ECHOECHO
/// identity that has something to back up.
pub fn fixture(server_template: &str) -> Fixture {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let secret_store = Arc::new(MemorySecretStore::new());
    let config = Arc::new(SafeConfigManager::new(
        secret_store.clone() as Arc<dyn SecretStore>,
        dir.path().join("safe-config.json"),
        "ECHOECHO",
    ));

    let directory = Arc::new(MockDirectory::with_template(server_template));
    let identity = Arc::new(MockIdentity::with_profile(IdentityProfile {
        identity: "ECHOECHO".into(),
        private_key: vec![1u8; 32],
        nickname: Some("nicki".into()),
        ..Default::default()
    }));
    let entities = Arc::new(MockEntities::default());
    let groups = Arc::new(MockGroups::default());
    let notifications = Arc::new(RecordingNotifications::default());

    let deps = Collaborators {
        directory: directory.clone(),
        identity: identity.clone(),
        entities: entities.clone(),
        groups: groups.clone(),
        links: Arc::new(StaticLinkPolicy::default()),
        notifications: notifications.clone(),
        tokens: None,
    };

    Fixture {
        manager: SafeManager::new(config.clone(), deps.clone()).unwrap(),
        config,
        deps,
        directory,
        identity,
        entities,
        groups,
        notifications,
        secret_store,
        dir,
    }
}
