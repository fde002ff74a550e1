//! Connection management: configuration plus a thin wrapper that turns
//! it into a verified [`mongodb::Database`] handle.

use crate::error::{OdmError, OdmResult};
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Database;

const ENV_URI: &str = "MONGODB_URI";
const ENV_DATABASE: &str = "MONGODB_DATABASE";
const ENV_APP_NAME: &str = "MONGODB_APP_NAME";

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub uri: String,
    pub database: String,
    pub app_name: Option<String>,
}

impl ClientConfig {
    pub fn new(uri: &str, database: &str) -> ClientConfig {
        ClientConfig {
            uri: uri.to_string(),
            database: database.to_string(),
            app_name: None,
        }
    }

    pub fn app_name(mut self, name: &str) -> ClientConfig {
        self.app_name = Some(name.to_string());
        self
    }

    /// Reads `MONGODB_URI` and `MONGODB_DATABASE` (required) and
    /// `MONGODB_APP_NAME` (optional) from the environment.
    pub fn from_env() -> OdmResult<ClientConfig> {
        let uri =
            std::env::var(ENV_URI).map_err(|_| OdmError::MissingEnv(ENV_URI.to_string()))?;
        let database = std::env::var(ENV_DATABASE)
            .map_err(|_| OdmError::MissingEnv(ENV_DATABASE.to_string()))?;
        Ok(ClientConfig {
            uri,
            database,
            app_name: std::env::var(ENV_APP_NAME).ok(),
        })
    }
}

/// Entry point for opening a database handle that models operate on.
#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Client {
        Client { config }
    }

    pub fn from_env() -> OdmResult<Client> {
        Ok(Client {
            config: ClientConfig::from_env()?,
        })
    }

    /// Connects, verifies the deployment with a `ping` and returns the
    /// configured database handle.
    pub async fn connect(&self) -> OdmResult<Database> {
        let mut options = ClientOptions::parse(&self.config.uri).await?;
        if let Some(name) = &self.config.app_name {
            options.app_name = Some(name.clone());
        }
        let client = mongodb::Client::with_options(options)?;
        let db = client.database(&self.config.database);
        db.run_command(doc! {"ping": 1}).await?;
        log::debug!("connected to database `{}`", self.config.database);
        Ok(db)
    }
}
