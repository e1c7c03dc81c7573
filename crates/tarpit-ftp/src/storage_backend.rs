//! The libunftp `StorageBackend` implementation: every operation
//! resolves against synthetic state only. Writes succeed and discard
//! their input, reads stream a paced synthetic file, listings are
//! generated per client. Nothing is ever persisted, matching
//! `protocol/ftp/driver/*.go`'s stub contract and spec.md section 4.8.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use libunftp::auth::UserDetail;
use libunftp::storage::{Error, ErrorKind, Fileinfo, Metadata, Result as StorageResult, StorageBackend};
use tokio::io::AsyncRead;

use crate::file_staller::FtpFileStallerFactory;
use crate::filesystem;
use crate::throttle::{FtpThrottle, ThrottleError};

#[derive(Debug, Clone, Copy)]
pub struct SyntheticMetadata {
    len: u64,
    is_dir: bool,
}

impl Metadata for SyntheticMetadata {
    fn len(&self) -> u64 {
        self.len
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn is_file(&self) -> bool {
        !self.is_dir
    }

    fn is_symlink(&self) -> bool {
        false
    }

    fn modified(&self) -> StorageResult<SystemTime> {
        Ok(SystemTime::now())
    }

    fn gid(&self) -> u32 {
        0
    }

    fn uid(&self) -> u32 {
        0
    }
}

fn throttle_error(err: ThrottleError) -> Error {
    match err {
        ThrottleError::TooManyPending => Error::new(ErrorKind::TransientFileNotAvailable, err),
        ThrottleError::ThrottleEnded => Error::new(ErrorKind::TransientFileNotAvailable, err),
    }
}

/// One instance per connected client, identified by `client_id`
/// (derived from the session's connection id) so its throttle queue,
/// directory listings and file reads are all keyed consistently.
pub struct TarpitFtpBackend {
    client_id: u64,
    throttle: Arc<FtpThrottle>,
    staller_factory: Arc<FtpFileStallerFactory>,
}

impl TarpitFtpBackend {
    pub fn new(client_id: u64, throttle: Arc<FtpThrottle>, staller_factory: Arc<FtpFileStallerFactory>) -> Self {
        Self { client_id, throttle, staller_factory }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    async fn throttled(&self) -> StorageResult<()> {
        self.throttle.throttle(self.client_id).await.map_err(throttle_error)
    }
}

#[async_trait]
impl<User: UserDetail> StorageBackend<User> for TarpitFtpBackend {
    type Metadata = SyntheticMetadata;

    async fn metadata<P: AsRef<Path> + Send>(&self, _user: &User, path: P) -> StorageResult<Self::Metadata> {
        self.throttled().await?;
        let path = path.as_ref().to_string_lossy();
        Ok(SyntheticMetadata {
            len: self.staller_factory.advertised_file_size(),
            is_dir: filesystem::looks_like_directory(&path),
        })
    }

    async fn list<P>(&self, _user: &User, path: P) -> StorageResult<Vec<Fileinfo<PathBuf, Self::Metadata>>>
    where
        P: AsRef<Path> + Send,
        Self::Metadata: Metadata + 'static,
    {
        self.throttled().await?;
        let path = path.as_ref().to_string_lossy().to_string();
        let entries = filesystem::list_directory(self.client_id, &path, self.staller_factory.advertised_file_size());

        Ok(entries
            .into_iter()
            .map(|entry| Fileinfo {
                path: PathBuf::from(entry.name),
                metadata: SyntheticMetadata { len: entry.size, is_dir: entry.is_dir },
            })
            .collect())
    }

    async fn get<P: AsRef<Path> + Send>(
        &self,
        _user: &User,
        path: P,
        _start_pos: u64,
    ) -> StorageResult<Box<dyn AsyncRead + Send + Sync + Unpin>> {
        self.throttled().await?;
        let path = path.as_ref().to_string_lossy().to_string();
        let ctx_id = self.client_id;
        let reader = self
            .staller_factory
            .open_for_read(ctx_id, self.client_id, &path)
            .map_err(|err| Error::new(ErrorKind::LocalError, err))?;
        Ok(Box::new(reader))
    }

    async fn put<P, R>(&self, _user: &User, mut input: R, _path: P, _start_pos: u64) -> StorageResult<u64>
    where
        P: AsRef<Path> + Send,
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        self.throttled().await?;
        // Discard the upload entirely: nothing is ever persisted.
        let mut sink = tokio::io::sink();
        let copied = tokio::io::copy(&mut input, &mut sink)
            .await
            .map_err(|err| Error::new(ErrorKind::LocalError, err))?;
        Ok(copied)
    }

    async fn del<P: AsRef<Path> + Send>(&self, _user: &User, _path: P) -> StorageResult<()> {
        self.throttled().await
    }

    async fn mkd<P: AsRef<Path> + Send>(&self, _user: &User, _path: P) -> StorageResult<()> {
        self.throttled().await
    }

    async fn rename<P: AsRef<Path> + Send>(&self, _user: &User, _from: P, _to: P) -> StorageResult<()> {
        self.throttled().await
    }

    async fn rmd<P: AsRef<Path> + Send>(&self, _user: &User, _path: P) -> StorageResult<()> {
        self.throttled().await
    }

    async fn cwd<P: AsRef<Path> + Send>(&self, _user: &User, _path: P) -> StorageResult<()> {
        self.throttled().await
    }
}

