//! FTP authenticator: spec.md section 6 names the contract plainly --
//! "All auth accepted" -- so every username/password pair succeeds.

use async_trait::async_trait;
use libunftp::auth::{AuthenticationError, Authenticator, Credentials, DefaultUser};

pub struct AcceptAllAuthenticator;

#[async_trait]
impl Authenticator<DefaultUser> for AcceptAllAuthenticator {
    async fn authenticate(&self, _username: &str, _creds: &Credentials) -> Result<DefaultUser, AuthenticationError> {
        Ok(DefaultUser)
    }
}
