use zenoh::Session;

use crate::config::ZenohConfig;
use crate::error::{Error, Result};

/// Build the native Zenoh configuration from a [`ZenohConfig`].
pub fn zenoh_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    ZenohConfig::validate_mode(&config.mode)?;

    let mut zenoh_config = zenoh::Config::default();

    zenoh_config
        .insert_json5("mode", &format!("\"{}\"", config.mode))
        .map_err(|e| Error::Config(format!("Failed to set mode: {}", e)))?;

    // Cached (retained) publishers sequence samples by timestamp.
    zenoh_config
        .insert_json5("timestamping/enabled", "true")
        .map_err(|e| Error::Config(format!("Failed to enable timestamping: {}", e)))?;

    if !config.connect.is_empty() {
        let endpoints_json = serde_json::to_string(&config.connect)?;
        zenoh_config
            .insert_json5("connect/endpoints", &endpoints_json)
            .map_err(|e| Error::Config(format!("Failed to set connect endpoints: {}", e)))?;
    }

    if !config.listen.is_empty() {
        let endpoints_json = serde_json::to_string(&config.listen)?;
        zenoh_config
            .insert_json5("listen/endpoints", &endpoints_json)
            .map_err(|e| Error::Config(format!("Failed to set listen endpoints: {}", e)))?;
    }

    if let Some(creds) = &config.credentials {
        zenoh_config
            .insert_json5(
                "transport/auth/usrpwd/user",
                &serde_json::to_string(&creds.username)?,
            )
            .map_err(|e| Error::Config(format!("Failed to set username: {}", e)))?;
        zenoh_config
            .insert_json5(
                "transport/auth/usrpwd/password",
                &serde_json::to_string(&creds.password)?,
            )
            .map_err(|e| Error::Config(format!("Failed to set password: {}", e)))?;
    }

    Ok(zenoh_config)
}

/// Connect to Zenoh using the provided configuration.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = zenoh_config(config)?;

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        auth = config.credentials.is_some(),
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config).await?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}
