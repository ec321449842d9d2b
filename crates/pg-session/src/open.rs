use crate::Result;
use pgcsv_core::ConnectionParams;
use postgres::{Client, Config, NoTls};
use tracing::debug;

/// One PostgreSQL connection, owned for the duration of a single transfer.
pub struct Session {
    pub client: Client,
}

impl Session {
    pub fn open(params: &ConnectionParams) -> Result<Self> {
        debug!(host = %params.host, port = params.port, db = %params.db_name, "connecting");
        let client = Config::new()
            .host(&params.host)
            .port(params.port)
            .user(&params.user)
            .password(&params.password)
            .dbname(&params.db_name)
            .application_name(concat!("pgcsv/", env!("CARGO_PKG_VERSION")))
            .connect(NoTls)?;
        Ok(Session { client })
    }

    /// Terminates the connection and reports a failed shutdown. Dropping a
    /// session also closes it, silently.
    pub fn close(self) -> Result<()> {
        self.client.close()?;
        debug!("connection closed");
        Ok(())
    }
}
