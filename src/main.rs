use anyhow::Context;
use clap::Parser;
use ossync_lib::config::{default_config_file, AppConfig};
use ossync_lib::logging::{get_log_dir, LogConfig, SizeRotatingWriter};
use ossync_lib::storage::create_storage;
use ossync_lib::{SyncConfig, SyncEngine, SyncReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 以 git 状态差异为依据，把本地目录同步到对象存储
#[derive(Parser, Debug)]
#[command(name = "ossync", version, about)]
struct Cli {
    /// 源目录
    source: PathBuf,

    /// 目标 key 前缀，开头的 `/` 会被去掉
    dest: String,

    /// 丢弃 .sync 状态目录，重新上传全部文件
    #[arg(short = 'f', long)]
    force_upload: bool,

    /// 增量模式：保留暂存区，只复制有变化的文件
    #[arg(short = 'i', long = "incremental")]
    incremental: bool,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 每个阶段的最大并发对象操作数
    #[arg(long)]
    concurrency: Option<usize>,

    /// git 可执行文件
    #[arg(long)]
    git: Option<String>,

    /// 日志级别: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,
}

/// 初始化日志系统
fn init_logging(config: &LogConfig) {
    if !config.enabled {
        // 日志已禁用，只初始化一个空的 subscriber
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let mut env_filter = EnvFilter::from_default_env().add_directive(config.tracing_level().into());
    for directive in ["opendal=warn", "hyper=warn", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    // 文件日志层，创建失败时只输出到控制台
    let file_layer = SizeRotatingWriter::new(&get_log_dir(), config.max_size_mb)
        .ok()
        .map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
        });

    // stdout 留给阶段耗时输出
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn run(cli: Cli, app_config: AppConfig) -> anyhow::Result<SyncReport> {
    let storage_config = app_config
        .storage
        .as_ref()
        .context("no `storage` section in configuration")?;
    let storage = create_storage(storage_config)
        .await
        .context("failed to create storage")?;

    let source = std::fs::canonicalize(&cli.source)
        .with_context(|| format!("invalid source directory {}", cli.source.display()))?;

    let mut config = SyncConfig::with_settings(source, &cli.dest, &app_config.sync);
    config.force_upload = cli.force_upload;
    config.incremental_mode = cli.incremental;
    if let Some(n) = cli.concurrency {
        config.max_concurrent_transfers = n;
    }
    if let Some(git) = cli.git {
        config.git_binary = git;
    }

    let report = SyncEngine::new(config, storage).exec().await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_file = cli.config.clone().unwrap_or_else(default_config_file);
    let mut app_config = match AppConfig::load(&config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(level) = &cli.log_level {
        app_config.log.level = level.clone();
    }

    init_logging(&app_config.log);

    match run(cli, app_config).await {
        Ok(report) => {
            println!(
                "Sync complete ({}): {} uploaded, {} deleted, {} bytes in {}ms",
                report.state,
                report.files_uploaded,
                report.files_deleted,
                report.bytes_transferred,
                report.duration
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
