use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// Process-wide settings, read once from the INI file and passed to every
/// component that needs them.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(alias = "CLUSTER")]
    pub cluster: ClusterConfig,
    #[serde(alias = "IAM_ROLE")]
    pub iam_role: IamRoleConfig,
    #[serde(alias = "S3")]
    pub s3: S3Config,
    #[serde(alias = "PIPELINE", default)]
    pub pipeline: PipelineConfig,
    #[serde(alias = "STORAGE", default)]
    pub storage: StorageConfig,
}

#[derive(Deserialize, Clone)]
pub struct ClusterConfig {
    #[serde(alias = "HOST")]
    pub host: String,
    #[serde(alias = "DB_NAME")]
    pub db_name: String,
    #[serde(alias = "DB_USER")]
    pub db_user: String,
    #[serde(alias = "DB_PASSWORD")]
    pub db_password: String,
    #[serde(alias = "DB_PORT", default = "default_db_port")]
    pub db_port: u16,
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("host", &self.host)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_port", &self.db_port)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IamRoleConfig {
    #[serde(alias = "ARN")]
    pub arn: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    #[serde(alias = "LOG_DATA")]
    pub log_data: String,
    #[serde(alias = "LOG_JSONPATH")]
    pub log_jsonpath: String,
    #[serde(alias = "SONG_DATA")]
    pub song_data: String,
    #[serde(alias = "REGION", default = "default_s3_region")]
    pub region: String,
}

/// Warehouse flavour the SQL is rendered for.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Redshift,
    Postgres,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Redshift => write!(f, "redshift"),
            Backend::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// BEGIN/COMMIT around every step; a failure leaves earlier steps applied.
    #[default]
    PerStatement,
    /// One transaction for the whole plan, rolled back on failure.
    SingleTransaction,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(alias = "BACKEND", default)]
    pub backend: Backend,
    #[serde(alias = "COMMIT_MODE", default)]
    pub commit_mode: CommitMode,
    #[serde(alias = "REPORT_ROW_COUNTS", default = "default_true")]
    pub report_row_counts: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            commit_mode: CommitMode::default(),
            report_row_counts: true,
        }
    }
}

/// Object storage access for the client-side staging fetch.
#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(alias = "ENDPOINT", default)]
    pub endpoint: Option<String>,
    #[serde(alias = "ACCESS_KEY", default)]
    pub access_key: Option<String>,
    #[serde(alias = "SECRET_KEY", default)]
    pub secret_key: Option<String>,
    #[serde(alias = "FETCH_CONCURRENCY", default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_key: None,
            secret_key: None,
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish()
    }
}

fn default_db_port() -> u16 {
    5439
}

fn default_s3_region() -> String {
    "us-west-2".to_string()
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_true() -> bool {
    true
}

/// Strips one pair of matching single or double quotes around a value.
///
/// Older config files quote S3 paths and role ARNs because the values used to
/// be spliced straight into SQL text.
pub fn unquote(value: &str) -> &str {
    let trimmed = value.trim();
    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

fn unquote_in_place(value: &mut String) {
    let stripped = unquote(value).to_string();
    *value = stripped;
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::new(path, FileFormat::Ini))
            .add_source(
                Environment::with_prefix("DWH")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = builder.build()?;

        let mut settings: Settings = config.try_deserialize()?;
        settings.normalize();
        settings.validate()?;

        debug!(
            host = %settings.cluster.host,
            db_name = %settings.cluster.db_name,
            backend = %settings.pipeline.backend,
            commit_mode = ?settings.pipeline.commit_mode,
            "Loaded warehouse settings"
        );

        Ok(settings)
    }

    fn normalize(&mut self) {
        for value in [
            &mut self.cluster.host,
            &mut self.cluster.db_name,
            &mut self.cluster.db_user,
            &mut self.cluster.db_password,
            &mut self.iam_role.arn,
            &mut self.s3.log_data,
            &mut self.s3.log_jsonpath,
            &mut self.s3.song_data,
            &mut self.s3.region,
        ] {
            unquote_in_place(value);
        }
        for value in [
            &mut self.storage.endpoint,
            &mut self.storage.access_key,
            &mut self.storage.secret_key,
        ]
        .into_iter()
        .flatten()
        {
            unquote_in_place(value);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.fetch_concurrency == 0 {
            return Err(ConfigError::Message(
                "STORAGE.FETCH_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
