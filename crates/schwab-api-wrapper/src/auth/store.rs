use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{TokenCipher, TokenSet, TokenStoreError};
use crate::config::{TokenStoreConfig, TokenStoreKind};
use crate::UtcDateTime;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TokenStoreError>> + Send + 'a>>;

/// Persistent home of the OAuth token set, shared between processes.
pub trait TokenStore: Send + Sync {
    fn load<'a>(&'a self) -> StoreFuture<'a, Option<TokenSet>>;

    fn save<'a>(&'a self, tokens: &'a TokenSet) -> StoreFuture<'a, ()>;

    fn clear<'a>(&'a self) -> StoreFuture<'a, ()>;

    /// Short label for logs, e.g. `file:/path` or `redis:schwab:tokens:id`.
    fn describe(&self) -> String;
}

fn encode(tokens: &TokenSet, cipher: Option<&TokenCipher>) -> Result<String, TokenStoreError> {
    let json = serde_json::to_string_pretty(tokens)?;
    match cipher {
        Some(cipher) => cipher.encrypt(json.as_bytes()),
        None => Ok(json),
    }
}

fn decode(payload: &str, cipher: Option<&TokenCipher>) -> Result<TokenSet, TokenStoreError> {
    match cipher {
        Some(cipher) => Ok(serde_json::from_slice(&cipher.decrypt(payload)?)?),
        None => Ok(serde_json::from_str(payload)?),
    }
}

/// Process-local store; tokens disappear on exit.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Option<TokenSet>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenSet) -> Self {
        Self {
            tokens: RwLock::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load<'a>(&'a self) -> StoreFuture<'a, Option<TokenSet>> {
        Box::pin(async move { Ok(self.tokens.read().await.clone()) })
    }

    fn save<'a>(&'a self, tokens: &'a TokenSet) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            *self.tokens.write().await = Some(tokens.clone());
            Ok(())
        })
    }

    fn clear<'a>(&'a self) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            *self.tokens.write().await = None;
            Ok(())
        })
    }

    fn describe(&self) -> String {
        String::from("memory")
    }
}

/// JSON file store. Writes go to a sibling temp file that is renamed over
/// the target, so readers never observe a partial file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    cipher: Option<TokenCipher>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cipher: None,
        }
    }

    pub fn encrypted(path: impl Into<PathBuf>, cipher: TokenCipher) -> Self {
        Self {
            path: path.into(),
            cipher: Some(cipher),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("tokens"));
        self.path
            .with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
    }
}

impl TokenStore for FileTokenStore {
    fn load<'a>(&'a self) -> StoreFuture<'a, Option<TokenSet>> {
        Box::pin(async move {
            let payload = match tokio::fs::read_to_string(&self.path).await {
                Ok(payload) => payload,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(error) => return Err(error.into()),
            };
            if payload.trim().is_empty() {
                return Ok(None);
            }
            decode(&payload, self.cipher.as_ref()).map(Some)
        })
    }

    fn save<'a>(&'a self, tokens: &'a TokenSet) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let payload = encode(tokens, self.cipher.as_ref())?;
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }

            let temp = self.temp_path();
            let written = match write_private(&temp, payload.as_bytes()).await {
                Ok(()) => tokio::fs::rename(&temp, &self.path).await,
                Err(error) => Err(error),
            };
            if let Err(error) = written {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(error.into());
            }

            debug!(path = %self.path.display(), "token file written");
            Ok(())
        })
    }

    fn clear<'a>(&'a self) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(error) => Err(error.into()),
            }
        })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Creates `path` readable by the owner only (0600 on unix) and writes
/// `payload` to it. The file never exists with wider permissions.
async fn write_private(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(payload).await?;
    file.sync_all().await
}

/// Redis store at `{prefix}:{client_id}`, expiring with the refresh token.
#[derive(Clone)]
pub struct RedisTokenStore {
    conn: ConnectionManager,
    key: String,
    cipher: Option<TokenCipher>,
}

impl RedisTokenStore {
    pub async fn connect(
        redis_url: &str,
        key_prefix: &str,
        client_id: &str,
        cipher: Option<TokenCipher>,
    ) -> Result<Self, TokenStoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        let key = Self::key_for(key_prefix, client_id);
        info!(key = %key, "redis token store connected");
        Ok(Self { conn, key, cipher })
    }

    pub fn key_for(prefix: &str, client_id: &str) -> String {
        format!("{}:{client_id}", prefix.trim_end_matches(':'))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Seconds until the refresh token dies, at least one.
    pub fn ttl_secs(tokens: &TokenSet, now: UtcDateTime) -> u64 {
        u64::try_from(now.until(tokens.refresh_expires_at).whole_seconds())
            .unwrap_or(0)
            .max(1)
    }
}

impl TokenStore for RedisTokenStore {
    fn load<'a>(&'a self) -> StoreFuture<'a, Option<TokenSet>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let payload: Option<String> = conn.get(&self.key).await?;
            payload
                .map(|payload| decode(&payload, self.cipher.as_ref()))
                .transpose()
        })
    }

    fn save<'a>(&'a self, tokens: &'a TokenSet) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let payload = encode(tokens, self.cipher.as_ref())?;
            let ttl = Self::ttl_secs(tokens, UtcDateTime::now());
            let mut conn = self.conn.clone();
            conn.set_ex::<_, _, ()>(&self.key, payload, ttl).await?;
            debug!(ttl_secs = ttl, "tokens cached in redis");
            Ok(())
        })
    }

    fn clear<'a>(&'a self) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            conn.del::<_, ()>(&self.key).await?;
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("redis:{}", self.key)
    }
}

impl std::fmt::Debug for RedisTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTokenStore")
            .field("key", &self.key)
            .field("encrypted", &self.cipher.is_some())
            .finish()
    }
}

/// Opens the store described by `config`. Redis stores are keyed by
/// `client_id`.
pub async fn open_store(
    config: &TokenStoreConfig,
    client_id: &str,
) -> Result<Arc<dyn TokenStore>, TokenStoreError> {
    let cipher = config
        .encryption_key
        .as_deref()
        .map(TokenCipher::from_passphrase)
        .transpose()?;

    match config.kind {
        TokenStoreKind::Memory => Ok(Arc::new(MemoryTokenStore::new())),
        TokenStoreKind::File => {
            let path = config.path.clone().ok_or_else(|| {
                TokenStoreError::Misconfigured(String::from("file token store needs a path"))
            })?;
            Ok(Arc::new(match cipher {
                Some(cipher) => FileTokenStore::encrypted(path, cipher),
                None => FileTokenStore::new(path),
            }))
        }
        TokenStoreKind::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                TokenStoreError::Misconfigured(String::from("redis token store needs a url"))
            })?;
            let store = RedisTokenStore::connect(url, &config.key_prefix, client_id, cipher).await?;
            Ok(Arc::new(store))
        }
    }
}
