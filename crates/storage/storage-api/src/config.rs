//! Configuration for opening a [`crate::engine::StorageEngine`], loaded
//! from TOML.

use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO Error")]
    Io {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying filesystem error.
        source: std::io::Error,
    },
    /// The config file's contents were not valid TOML for this shape.
    #[error("Parse Error")]
    ParseToml {
        /// The path that failed to parse.
        path: PathBuf,
        /// The underlying TOML error.
        source: toml::de::Error,
    },
    /// The config parsed but failed a semantic check.
    #[error("Invalid TOML error")]
    Invalid {
        /// A human-readable description of what was invalid.
        message: String,
    },
}

/// Top-level configuration, the `[storage]` table of a TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Storage-engine settings.
    pub storage: StorageConfig,
}

/// Settings that govern how a [`crate::engine::StorageEngine`] opens its
/// data file, log file, and buffer pool.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `data.db`, `wal.log`, and (if a password-derived
    /// key is used) the key-derivation salt file.
    pub data_dir: PathBuf,
    /// Directory for rolling log files.
    pub logs_dir: PathBuf,
    /// Number of pages the buffer pool holds resident at once.
    pub buffer_pages: NonZeroUsize,
    /// Which disk-manager implementation backs the data file.
    #[serde(default)]
    pub disk_manager: DiskManagerKind,
    /// Compression and encryption settings for pages and log records.
    #[serde(default)]
    pub codec: CodecConfig,
}

/// Which [`file::manager::DiskManager`] implementation to use.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiskManagerKind {
    /// `pread`/`pwrite`-backed I/O.
    #[default]
    Positional,
    /// Memory-mapped I/O.
    Mapped,
}

/// Compression and encryption settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodecConfig {
    /// Page and log compression settings.
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Page and log encryption settings.
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

/// Compression algorithm selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum CompressionConfig {
    /// No compression.
    None,
    /// Snappy.
    Snappy,
    /// Zstandard.
    Zstd {
        /// Compression level, 1-19.
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
    /// Gzip.
    Gzip {
        /// Compression level, 0-9.
        #[serde(default = "default_deflate_level")]
        level: u32,
    },
    /// Raw zlib.
    Zlib {
        /// Compression level, 0-9.
        #[serde(default = "default_deflate_level")]
        level: u32,
    },
}

fn default_zstd_level() -> i32 {
    codec::compression::DEFAULT_ZSTD_LEVEL
}

fn default_deflate_level() -> u32 {
    6
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self::None
    }
}

impl From<&CompressionConfig> for codec::CompressionAlgorithm {
    fn from(value: &CompressionConfig) -> Self {
        match *value {
            CompressionConfig::None => codec::CompressionAlgorithm::None,
            CompressionConfig::Snappy => codec::CompressionAlgorithm::Snappy,
            CompressionConfig::Zstd { level } => codec::CompressionAlgorithm::Zstd(level),
            CompressionConfig::Gzip { level } => codec::CompressionAlgorithm::Gzip(level),
            CompressionConfig::Zlib { level } => codec::CompressionAlgorithm::Zlib(level),
        }
    }
}

/// Encryption algorithm selection and key source.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum EncryptionConfig {
    /// No encryption.
    None,
    /// AES-256-GCM.
    Aes256Gcm {
        /// A 64-character hex-encoded 32-byte key, if not password-derived.
        #[serde(default)]
        key_hex: Option<String>,
        /// A password to derive a key from via PBKDF2, if `key_hex` is absent.
        #[serde(default)]
        password: Option<String>,
    },
    /// AES-256-CTR.
    Aes256Ctr {
        /// A 64-character hex-encoded 32-byte key, if not password-derived.
        #[serde(default)]
        key_hex: Option<String>,
        /// A password to derive a key from via PBKDF2, if `key_hex` is absent.
        #[serde(default)]
        password: Option<String>,
    },
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self::None
    }
}

const SALT_FILE_NAME: &str = "key.salt";

/// Resolves an [`EncryptionConfig`] to the algorithm and key the codec
/// layer needs. A `key_hex` is used as-is; a `password` is stretched via
/// PBKDF2 against a salt persisted at `<data_dir>/key.salt`, generated on
/// first use so the same password re-derives the same key on reopen.
pub fn resolve_encryption(
    data_dir: &Path,
    config: &EncryptionConfig,
) -> Result<(codec::EncryptionAlgorithm, Option<codec::EncryptionKey>), ConfigError> {
    use codec::{EncryptionAlgorithm, EncryptionKey};

    let (algorithm, key_hex, password) = match config {
        EncryptionConfig::None => return Ok((EncryptionAlgorithm::None, None)),
        EncryptionConfig::Aes256Gcm { key_hex, password } => {
            (EncryptionAlgorithm::Aes256Gcm, key_hex, password)
        }
        EncryptionConfig::Aes256Ctr { key_hex, password } => {
            (EncryptionAlgorithm::Aes256Ctr, key_hex, password)
        }
    };

    if let Some(hex) = key_hex {
        let bytes = decode_hex_key(hex)?;
        return Ok((algorithm, Some(EncryptionKey(bytes))));
    }

    let Some(password) = password else {
        return Err(ConfigError::Invalid {
            message: "encryption algorithm configured without key_hex or password".to_string(),
        });
    };

    let salt_path = data_dir.join(SALT_FILE_NAME);
    let salt = match std::fs::read(&salt_path) {
        Ok(bytes) => {
            let array: [u8; codec::key::SALT_LEN] = bytes.try_into().map_err(|_| ConfigError::Invalid {
                message: format!("{} does not hold a {}-byte salt", salt_path.display(), codec::key::SALT_LEN),
            })?;
            array
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let salt = codec::key::generate_salt();
            std::fs::create_dir_all(data_dir).map_err(|e| ConfigError::Io {
                path: data_dir.to_path_buf(),
                source: e,
            })?;
            std::fs::write(&salt_path, salt).map_err(|e| ConfigError::Io {
                path: salt_path.clone(),
                source: e,
            })?;
            salt
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: salt_path,
                source: e,
            })
        }
    };

    Ok((algorithm, Some(codec::key::derive_key(password, &salt))))
}

fn decode_hex_key(hex: &str) -> Result<[u8; 32], ConfigError> {
    if hex.len() != 64 {
        return Err(ConfigError::Invalid {
            message: "key_hex must be exactly 64 hex characters (32 bytes)".to_string(),
        });
    }
    let mut bytes = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk).unwrap();
        bytes[i] = u8::from_str_radix(byte_str, 16).map_err(|_| ConfigError::Invalid {
            message: format!("key_hex contains a non-hex byte at position {}", i * 2),
        })?;
    }
    Ok(bytes)
}

impl EngineConfig {
    /// Reads, parses, and validates a config file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        let cfg: EngineConfig = toml::from_str(&text).map_err(|e| ConfigError::ParseToml {
            path: path.clone(),
            source: e,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                message: "storage.data_dir must not be empty".to_string(),
            });
        }
        if self.storage.logs_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                message: "storage.logs_dir must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_file_parses_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("laura.toml");
        std::fs::write(
            &config_path,
            format!(
                "[storage]\ndata_dir = \"{}\"\nlogs_dir = \"{}\"\nbuffer_pages = 256\n",
                dir.path().join("data").display(),
                dir.path().join("logs").display()
            ),
        )
        .unwrap();

        let config = EngineConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.storage.buffer_pages.get(), 256);
        assert_eq!(config.storage.disk_manager, DiskManagerKind::Positional);
        assert!(matches!(config.storage.codec.compression, CompressionConfig::None));
    }

    #[test]
    fn load_from_file_rejects_missing_file() {
        let err = EngineConfig::load_from_file("/nonexistent/laura.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn password_derived_key_persists_salt_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let config = EncryptionConfig::Aes256Gcm {
            key_hex: None,
            password: Some("hunter2".to_string()),
        };
        let (_, first) = resolve_encryption(dir.path(), &config).unwrap();
        let (_, second) = resolve_encryption(dir.path(), &config).unwrap();
        assert_eq!(first.unwrap().0, second.unwrap().0);
        assert!(dir.path().join(SALT_FILE_NAME).exists());
    }

    #[test]
    fn hex_key_is_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let config = EncryptionConfig::Aes256Ctr {
            key_hex: Some("ab".repeat(32)),
            password: None,
        };
        let (algo, key) = resolve_encryption(dir.path(), &config).unwrap();
        assert_eq!(algo, codec::EncryptionAlgorithm::Aes256Ctr);
        assert_eq!(key.unwrap().0, [0xabu8; 32]);
    }

    #[test]
    fn missing_key_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = EncryptionConfig::Aes256Gcm {
            key_hex: None,
            password: None,
        };
        assert!(matches!(
            resolve_encryption(dir.path(), &config),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
