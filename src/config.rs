use std::env;

use tracing::info;

/// Runtime configuration, loaded from the environment (a `.env` file is
/// honored via dotenvy in main). Defaults suit local development.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: String,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: var_or("HOOD_HIVE_ADDR", "0.0.0.0:8080"),
            data_dir: var_or("HOOD_HIVE_DATA_DIR", "hood_hive_data"),
            jwt_secret: var_or("HOOD_HIVE_JWT_SECRET", "dev_only_secret"),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}
