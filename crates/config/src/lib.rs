//! 统一配置中心
//!
//! 加载顺序：内置默认值 → `MESSENGER_CONFIG_FILE` 指定的文件（按扩展名识别
//! TOML / YAML / JSON）→ `MESSENGER_` 前缀的环境变量，嵌套字段用 `__` 分隔，
//! 例如 `MESSENGER_SERVER__PORT=9000`。

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

pub const CONFIG_FILE_ENV: &str = "MESSENGER_CONFIG_FILE";
pub const ENV_PREFIX: &str = "MESSENGER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        ConfigError::Load(Box::new(value))
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    /// 单个请求的超时时间
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// 数据库配置，未设置 `url` 时使用内存存储
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[serde(default)]
    #[validate(url)]
    pub url: Option<String>,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

/// 图片存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    pub photo_dir: PathBuf,
    #[validate(range(min = 1))]
    pub max_photo_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// `EnvFilter` 指令，`RUST_LOG` 存在时以其为准
    #[validate(length(min = 1))]
    pub filter: String,
}

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub storage: StorageConfig,
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
                request_timeout_secs: 30,
                cors_origins: vec!["*".into()],
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
            },
            storage: StorageConfig {
                photo_dir: PathBuf::from("data/photos"),
                max_photo_bytes: 5 * 1024 * 1024,
            },
            logging: LoggingConfig {
                filter: "info".into(),
            },
        }
    }
}

impl AppConfig {
    /// 按默认值、配置文件、环境变量的顺序合并出的配置源
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            fig = if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig.merge(Yaml::file(path))
            } else if path.ends_with(".json") {
                fig.merge(Json::file(path))
            } else {
                fig.merge(Toml::file(path))
            };
        }
        fig.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(fig: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = fig.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 用于日志输出的副本，数据库密码被替换
    pub fn sanitized(&self) -> Self {
        let mut copy = self.clone();
        copy.database.url = copy.database.url.as_deref().map(redact_url);
        copy
    }
}

fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.rfind('@') else {
        return url.to_owned();
    };
    let user = rest[..at].split(':').next().unwrap_or_default();
    format!(
        "{}://{}:[REDACTED]@{}",
        &url[..scheme_end],
        user,
        &rest[at + 1..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.database.url.is_none());
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "messenger.toml",
                r#"
                [server]
                port = 9000

                [storage]
                max_photo_bytes = 1024
                "#,
            )?;
            jail.set_env(CONFIG_FILE_ENV, "messenger.toml");
            jail.set_env("MESSENGER_SERVER__PORT", "9100");
            jail.set_env("MESSENGER_DATABASE__URL", "postgres://chat:secret@db:5432/chat");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.storage.max_photo_bytes, 1024);
            assert_eq!(config.server.host, "127.0.0.1");
            assert_eq!(
                config.database.url.as_deref(),
                Some("postgres://chat:secret@db:5432/chat")
            );
            Ok(())
        });
    }

    #[test]
    fn yaml_file_is_recognised() {
        Jail::expect_with(|jail| {
            jail.create_file("messenger.yaml", "logging:\n  filter: debug\n")?;
            jail.set_env(CONFIG_FILE_ENV, "messenger.yaml");

            let config = AppConfig::load().expect("config should load");
            assert_eq!(config.logging.filter, "debug");
            Ok(())
        });
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.max_photo_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_database_url_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("MESSENGER_DATABASE__URL", "not a url");
            let err = AppConfig::load().unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn sanitized_hides_database_password() {
        let mut config = AppConfig::default();
        config.database.url = Some("postgres://chat:hunter2@db:5432/chat".into());

        let sanitized = config.sanitized();
        assert_eq!(
            sanitized.database.url.as_deref(),
            Some("postgres://chat:[REDACTED]@db:5432/chat")
        );
        assert!(!format!("{sanitized:?}").contains("hunter2"));
    }
}
