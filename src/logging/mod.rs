use std::collections::HashMap;
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志格式配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人类可读格式
    Pretty,
    /// 紧凑格式，适合 CI 日志
    Compact,
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 存在时以其为准
    pub level: Level,
    /// 输出格式
    pub format: LogFormat,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否输出 ANSI 颜色
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            show_target: false,
            ansi: false,
        }
    }
}

impl LoggingConfig {
    /// `--verbose` 时输出 DEBUG 级别
    pub fn for_verbosity(verbose: bool) -> Self {
        if verbose {
            Self::development()
        } else {
            Self::default()
        }
    }

    /// 创建调试配置
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            show_target: true,
            ansi: true,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }
}

/// 初始化日志系统
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = config.env_filter();
    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_ansi(config.ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_ansi(config.ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    tracing::debug!(
        level = ?config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

/// 操作计时器
pub struct OperationTimer {
    start: Instant,
    operation: String,
    metadata: HashMap<String, String>,
}

impl OperationTimer {
    /// 创建新的计时器
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// 完成计时并记录日志
    pub fn finish(self) {
        let duration = self.start.elapsed();

        tracing::info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            metadata = ?self.metadata,
            "Operation completed"
        );
    }

    /// 获取当前经过时间
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
