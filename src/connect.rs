use fixture_sink::{Connection, MySqlConnection, PostgresConnection};

/// Database flavors the CLI can load fixtures into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    PostgreSQL,
    MySQL,
}

impl Backend {
    /// Pick the backend from the URL scheme.
    pub fn from_url(database_url: &str) -> anyhow::Result<Self> {
        let scheme = database_url.split("://").next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Ok(Self::PostgreSQL),
            "mysql" => Ok(Self::MySQL),
            _ => anyhow::bail!(
                "Unsupported database URL scheme '{scheme}' (expected postgresql:// or mysql://)"
            ),
        }
    }
}

// Connect to the database named by the URL
pub async fn connect_to_database(database_url: &str) -> anyhow::Result<Box<dyn Connection>> {
    let conn: Box<dyn Connection> = match Backend::from_url(database_url)? {
        Backend::PostgreSQL => Box::new(PostgresConnection::connect(database_url).await?),
        Backend::MySQL => Box::new(MySqlConnection::connect(database_url).await?),
    };
    Ok(conn)
}
