// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::{
    AuthError, AuthGate, FileRoleStore, GoTrueIdentityProvider, IdentityProvider,
    LocalIdentityProvider, RoleResolver, SessionStore, ADMIN_ROLE,
};
use crate::config::{AppConfig, IdentityProviderConfig};
use crate::journal::{JournalRepository, UploadPipeline, UrlPolicy};
use crate::storage::{
    FileStorage, FsObjectStore, ObjectStore, RecordStore, RecordStoreError, RedbRecordStore,
    RoleAssignmentRepository, StorageError, StoragePaths, UrlSigner,
};

/// Failures while wiring the application at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("data directory: {0}")]
    Storage(#[from] StorageError),
    #[error("record store: {0}")]
    Records(#[from] RecordStoreError),
    #[error("identity provider: {0}")]
    Provider(#[from] AuthError),
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<FileStorage>,
    pub auth: AuthGate,
    pub roles: RoleResolver,
    pub objects: Arc<dyn ObjectStore>,
    pub pipeline: Arc<UploadPipeline>,
    pub repo: Arc<JournalRepository>,
    /// Present when signed image URLs can be minted and verified
    pub signer: Option<UrlSigner>,
    pub bucket: String,
    pub policy: UrlPolicy,
    /// Cancelled when the server begins shutting down. Long-lived responses
    /// such as the live feed end on it so graceful shutdown can finish.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Open storage under `config.data_dir` and wire every component.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let storage = open_storage(config)?;

        if let Some(user_id) = config.seed_admin_user_id.as_deref() {
            RoleAssignmentRepository::new(&storage).provision(user_id, ADMIN_ROLE)?;
            tracing::info!(user_id, "Admin role provisioned");
        }

        let provider: Arc<dyn IdentityProvider> = match &config.identity_provider {
            IdentityProviderConfig::Local {
                require_email_verification,
            } => Arc::new(LocalIdentityProvider::new(
                storage.clone(),
                *require_email_verification,
            )),
            IdentityProviderConfig::GoTrue { url, api_key } => Arc::new(
                GoTrueIdentityProvider::new(url.clone(), api_key.clone())?,
            ),
        };
        tracing::info!(provider = provider.name(), "Identity provider configured");

        let sessions = SessionStore::new(config.session_secret.as_bytes(), config.session_ttl);
        let records: Arc<dyn RecordStore> =
            Arc::new(RedbRecordStore::open(&storage.paths().records_db())?);
        let signer = config.url_signing_secret.as_deref().map(UrlSigner::new);

        Ok(Self::assemble(
            storage,
            AuthGate::new(provider, sessions),
            records,
            signer,
            &config.bucket,
            &config.public_base_url,
            config.url_policy,
        ))
    }

    fn assemble(
        storage: Arc<FileStorage>,
        auth: AuthGate,
        records: Arc<dyn RecordStore>,
        signer: Option<UrlSigner>,
        bucket: &str,
        public_base_url: &url::Url,
        policy: UrlPolicy,
    ) -> Self {
        let mut objects = FsObjectStore::new(storage.clone(), bucket, public_base_url);
        if let Some(signer) = signer.clone() {
            objects = objects.with_signer(signer);
        }
        let objects: Arc<dyn ObjectStore> = Arc::new(objects);

        let roles = RoleResolver::new(Arc::new(FileRoleStore::new(storage.clone())));
        let pipeline = Arc::new(UploadPipeline::new(objects.clone(), records.clone(), policy));
        let repo = Arc::new(JournalRepository::new(objects.clone(), records, policy));

        Self {
            storage,
            auth,
            roles,
            objects,
            pipeline,
            repo,
            signer,
            bucket: bucket.to_string(),
            policy,
            shutdown: CancellationToken::new(),
        }
    }
}

fn open_storage(config: &AppConfig) -> Result<Arc<FileStorage>, StartupError> {
    let mut storage = FileStorage::new(StoragePaths::new(&config.data_dir));
    storage.initialize()?;
    Ok(Arc::new(storage))
}

/// Confirm a local identity's email out-of-band (`confirm-email` command).
///
/// Only meaningful for the local provider; a hosted provider confirms
/// addresses itself.
pub fn confirm_local_email(config: &AppConfig, identity_id: &str) -> Result<(), StartupError> {
    if !matches!(config.identity_provider, IdentityProviderConfig::Local { .. }) {
        return Err(StartupError::Provider(AuthError::Validation(
            "Email confirmation is handled by the hosted identity provider".into(),
        )));
    }

    let storage = open_storage(config)?;
    LocalIdentityProvider::new(storage, true).confirm_email(identity_id)?;
    tracing::info!(identity_id, "Email confirmed");
    Ok(())
}
