use russh::client;
use russh_keys::key::PublicKey;

/// SSH client handler used for the SFTP transport.
///
/// The server key is accepted as is; it is only logged.
pub(crate) struct Client {
    host: String,
}

impl Client {
    pub(crate) fn new(host: &str) -> Self {
        Self {
            host: host.to_owned(),
        }
    }
}

#[async_trait]
impl client::Handler for Client {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "accepting {} host key of {}",
            server_public_key.name(),
            self.host
        );
        Ok(true)
    }
}
