use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Git command error: {0}")]
    Git(#[from] GitError),
    #[error("Review server error: {0}")]
    Review(#[from] ReviewError),
    #[error("License manifest error: {0}")]
    License(#[from] LicenseError),
    #[error("I/O error while {0}: {1}")]
    IO(String, #[source] std::io::Error),
    #[error("Giving up on {operation} after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: GitError,
    },
}

#[derive(Debug)]
pub enum GitError {
    CommandFailed {
        command: String,
        status_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// git 可执行文件本身无法启动
    Spawn(String, std::io::Error),
    /// `ls-remote` 没有返回所需的引用
    RefNotFound { url: String, reference: String },
    /// 声明文件遍历失败
    Walk(String),
    /// 写回声明文件失败
    FileWrite(PathBuf, std::io::Error),
    NotARepository(PathBuf),
}

/// 标准错误输出中出现这些片段时，认为是可以重试的网络类故障
const TRANSIENT_MARKERS: &[&str] = &[
    "could not resolve host",
    "connection timed out",
    "connection reset",
    "connection refused",
    "operation timed out",
    "the remote end hung up unexpectedly",
    "early eof",
    "rpc failed",
    "http 502",
    "http 503",
    "http 504",
    "502 bad gateway",
    "503 service",
    "504 gateway",
    "unable to access",
    "failed to connect",
    "tls connection was non-properly terminated",
];

/// 出现这些片段时无论如何都不重试
const PERMANENT_MARKERS: &[&str] = &[
    "authentication failed",
    "access denied",
    "permission denied",
    "returned error: 401",
    "returned error: 403",
    "returned error: 404",
    "http 401",
    "http 403",
    "403 forbidden",
    "protected branch",
    "pre-receive hook declined",
    "[rejected]",
    "repository not found",
];

impl GitError {
    /// 判断该错误是否值得重试
    pub fn is_transient(&self) -> bool {
        match self {
            GitError::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_lowercase();
                if PERMANENT_MARKERS.iter().any(|m| stderr.contains(m)) {
                    return false;
                }
                TRANSIENT_MARKERS.iter().any(|m| stderr.contains(m))
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed {
                command,
                status_code,
                stdout,
                stderr,
            } => {
                write!(f, "Git command '{}' failed", command)?;
                if let Some(c) = status_code {
                    write!(f, " with exit code {}", c)?;
                }
                if !stdout.is_empty() {
                    write!(f, "\nStdout:\n{}", stdout)?;
                }
                if !stderr.is_empty() {
                    write!(f, "\nStderr:\n{}", stderr)?;
                }
                Ok(())
            }
            GitError::Spawn(command, e) => write!(f, "Failed to run '{}': {}", command, e),
            GitError::RefNotFound { url, reference } => {
                write!(f, "Remote {} did not advertise {}", url, reference)
            }
            GitError::Walk(msg) => write!(f, "Failed to walk declaration tree: {}", msg),
            GitError::FileWrite(path, e) => {
                write!(f, "Failed to write {}: {}", path.display(), e)
            }
            GitError::NotARepository(path) => {
                write!(f, "{} is not a git working copy", path.display())
            }
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::Spawn(_, e) | GitError::FileWrite(_, e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Authentication failed: Invalid token")]
    AuthenticationError,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API rate limit exceeded, please try again later")]
    RateLimitExceeded,

    #[error("Server error: {status_code}: {message}")]
    ServerError { status_code: u16, message: String },

    #[error("Response data parsing failed: {0}")]
    ParseError(#[source] reqwest::Error),

    #[error("Request timed out")]
    TimeoutError,

    #[error("Invalid server url: {0}")]
    InvalidUrl(String),
}

impl ReviewError {
    /// 仅对幂等请求有意义：超时、限流以及 5xx
    pub fn is_retryable(&self) -> bool {
        match self {
            ReviewError::TimeoutError | ReviewError::RateLimitExceeded => true,
            ReviewError::ServerError { status_code, .. } => *status_code >= 500,
            ReviewError::NetworkError(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Required configuration field '{0}' is missing or invalid")]
    FieldMissing(String),
    #[error("Wrong url format: {0}")]
    InvalidUrl(String),
    #[error("Empty token")]
    EmptyToken,
}

#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("Failed to read '{0}': {1}")]
    Read(String, #[source] std::io::Error),
    #[error("Failed to write '{0}': {1}")]
    Write(String, #[source] std::io::Error),
    #[error("Expected exactly one json:table block in '{path}', found {count}")]
    MultipleTables { path: String, count: usize },
    #[error("Malformed license table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("License table has no 'items' array")]
    MissingItems,
}

pub type AppResult<T> = Result<T, AppError>;

pub fn io_error(action: impl Into<String>, e: std::io::Error) -> AppError {
    AppError::IO(action.into(), e)
}
