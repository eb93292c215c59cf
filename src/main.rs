//! Chips Orchestrator 命令行入口
//!
//! 读取模块清单文件，检查依赖关系、打印启动顺序，或按依赖顺序演练一次完整的启停流程。
//!
//! # 命令概览
//!
//! - `run` - 注册清单中的模块并启动，等待关闭信号后按逆序停止
//! - `validate` - 校验清单中的依赖关系
//! - `order` - 打印启动顺序与关闭顺序
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 校验依赖关系
//! chips-orchestrator validate -m modules.yaml
//!
//! # 查看启动顺序
//! chips-orchestrator order -m modules.yaml
//!
//! # 使用自定义配置文件演练启停
//! chips-orchestrator -c orchestrator.yaml run -m modules.yaml
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use chips_orchestrator::module::{load_manifests, ManifestFileSource};
use chips_orchestrator::{
    CoreError, DependencyResolver, LifecycleManager, LogGuard, Logger, LoggerConfig,
    OrchestratorConfig, ShutdownHook,
};

/// Chips Orchestrator - 薯片模块编排引擎
///
/// 解析模块依赖关系，并按确定的顺序启动和停止模块。
#[derive(Parser)]
#[command(name = "chips-orchestrator")]
#[command(version, about = "薯片生态的模块编排引擎", long_about = None)]
#[command(author = "Chips Team")]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "orchestrator.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 开发模式（显示线程 ID 与源码位置）
    #[arg(long, global = true)]
    dev: bool,

    /// 子命令
    #[command(subcommand)]
    command: Option<Commands>,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 启动清单中的全部模块
    ///
    /// 按依赖顺序启动，打印健康汇总后等待关闭信号。
    /// 按 Ctrl+C 按逆序停止全部模块。
    Run {
        /// 模块清单文件（不指定则使用配置文件中的 manifest_path）
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// 校验依赖关系
    ///
    /// 报告缺失依赖、循环依赖和冲突，存在缺陷时以非零状态退出。
    Validate {
        /// 模块清单文件
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// 打印启动顺序与关闭顺序
    Order {
        /// 模块清单文件
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// 验证配置文件
    ///
    /// 检查配置文件是否有效，并显示解析后的配置内容。
    CheckConfig {
        /// 配置文件路径（不指定则使用全局 -c 选项）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 查看版本信息
    Version,
}

/// 初始化日志系统
fn init_logging(config: &OrchestratorConfig) -> Result<LogGuard, CoreError> {
    let mut logger_config = LoggerConfig::from_log_config(&config.logging)?;
    if config.dev_mode {
        logger_config.show_thread_ids = true;
        logger_config.show_file_line = true;
    }
    Logger::init(logger_config)
}

/// 选择清单文件：命令行参数优先，其次是配置文件
fn manifest_path(
    arg: Option<PathBuf>,
    config: &OrchestratorConfig,
) -> Result<PathBuf, CoreError> {
    arg.or_else(|| config.manifest_path.clone()).ok_or_else(|| {
        CoreError::InvalidConfigValue {
            key: "manifest_path".to_string(),
            reason: "未指定模块清单文件（使用 -m 或在配置文件中设置 manifest_path）".to_string(),
        }
    })
}

/// 由清单文件构建依赖解析器
fn build_resolver(path: &Path) -> Result<DependencyResolver, CoreError> {
    let mut resolver = DependencyResolver::new();
    for manifest in load_manifests(path)? {
        resolver.register_module(manifest)?;
    }
    Ok(resolver)
}

/// 校验依赖关系
fn run_validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = build_resolver(path)?;
    let result = resolver.validate_dependencies();

    println!("检查模块清单: {}", path.display());
    println!("  模块数量: {}", resolver.len());
    println!();

    for conflict in &result.conflicts {
        println!("⚠️  冲突: {} 与 {}", conflict.module, conflict.conflicts_with);
    }

    if result.is_valid {
        println!("✅ 依赖关系有效");
        return Ok(());
    }

    for missing in &result.missing {
        println!("❌ 缺失依赖: {} -> {}", missing.module, missing.dependency);
    }
    for cycle in &result.cycles {
        println!("❌ 循环依赖: {}", cycle);
    }
    Err(Box::new(CoreError::ValidationFailed(Box::new(result))))
}

/// 打印启动顺序与关闭顺序
fn run_order(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = build_resolver(path)?;
    let startup = resolver.get_startup_order()?;
    let shutdown = resolver.get_shutdown_order()?;

    println!("启动顺序:");
    for (i, name) in startup.iter().enumerate() {
        let priority = resolver.manifest(name).map(|m| m.priority).unwrap_or_default();
        println!("  {:>3}. {} (priority {})", i + 1, name, priority);
    }
    println!();
    println!("关闭顺序:");
    for (i, name) in shutdown.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, name);
    }
    Ok(())
}

/// 启动全部模块并等待关闭信号
async fn run_modules(
    path: &Path,
    config: &OrchestratorConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = Arc::new(LifecycleManager::with_config(config.lifecycle.clone()));
    let count = manager
        .register_source(&ManifestFileSource::passive(path))
        .await?;
    info!(count, path = %path.display(), "模块注册完成");

    let token = CancellationToken::new();
    let hook = Arc::new(ShutdownHook::new(manager.clone()));

    if let Err(e) = manager.start_all_modules(token.child_token()).await {
        error!(error = %e, code = e.error_code(), "启动失败，停止已启动的模块");
        hook.trigger(token).await;
        return Err(Box::new(e));
    }

    let report = manager.check_all_health(token.child_token()).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_healthy() {
        warn!(modules = ?report.unhealthy_modules(), "存在非健康模块");
    }

    println!();
    println!("全部模块已启动，按 Ctrl+C 停止");

    hook.install(token).await?;
    info!("全部模块已停止");
    Ok(())
}

/// 检查配置文件
async fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("检查配置文件: {}", path.display());
    println!();

    if !path.exists() {
        println!("⚠️  警告: 配置文件不存在，将使用默认配置");
        println!();
        print_config(&OrchestratorConfig::default());
        return Ok(());
    }

    match OrchestratorConfig::from_file(path).await {
        Ok(config) => {
            println!("✅ 配置文件有效！");
            println!();
            print_config(&config);
            Ok(())
        }
        Err(e) => {
            println!("❌ 配置文件无效: {}", e);
            Err(Box::new(e))
        }
    }
}

/// 打印配置内容
fn print_config(config: &OrchestratorConfig) {
    let yes_no = |b: bool| if b { "是" } else { "否" };

    println!("配置内容:");
    println!("────────────────────────────────────────");
    println!("  [生命周期配置]");
    println!("    默认启动超时:   {} 秒", config.lifecycle.default_startup_timeout_secs);
    println!("    停止超时:       {} 秒", config.lifecycle.stop_timeout_secs);
    println!("    健康检查超时:   {} 秒", config.lifecycle.health_check_timeout_secs);
    println!("    事件通道容量:   {}", config.lifecycle.event_capacity);
    println!();
    println!("  [日志配置]");
    println!("    日志级别:       {}", config.logging.level);
    println!("    文件输出:       {}", yes_no(config.logging.file_output));
    println!("    JSON 格式:      {}", yes_no(config.logging.json_format));
    println!("    轮转策略:       {}", config.logging.rotation);
    println!();
    println!("  [其他]");
    println!("    开发模式:       {}", yes_no(config.dev_mode));
    if let Some(ref manifest) = config.manifest_path {
        println!("    模块清单:       {}", manifest.display());
    }
    println!("────────────────────────────────────────");
}

/// 打印版本信息
fn print_version() {
    println!();
    println!("Chips Orchestrator - 薯片模块编排引擎");
    println!("═══════════════════════════════════════");
    println!("  版本:             {}", chips_orchestrator::VERSION);
    println!();
    println!("构建信息:");
    println!("  目标平台:         {}", std::env::consts::ARCH);
    println!("  操作系统:         {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            print_version();
            return Ok(());
        }
        Some(Commands::CheckConfig { config }) => {
            let config_path = config.unwrap_or(cli.config);
            return check_config(&config_path).await;
        }
        _ => {}
    }

    let config = load_config(&cli.config, cli.log_level, cli.dev).await?;
    let _guard = init_logging(&config)?;
    if let Some(ref path) = config.config_path {
        info!("已加载配置文件: {}", path.display());
    }

    match cli.command {
        Some(Commands::Validate { manifest }) => {
            run_validate(&manifest_path(manifest, &config)?)?;
        }
        Some(Commands::Order { manifest }) => {
            run_order(&manifest_path(manifest, &config)?)?;
        }
        Some(Commands::Run { manifest }) => {
            run_modules(&manifest_path(manifest, &config)?, &config).await?;
        }
        None => {
            run_modules(&manifest_path(None, &config)?, &config).await?;
        }
        Some(Commands::Version) | Some(Commands::CheckConfig { .. }) => {}
    }

    Ok(())
}

/// 加载配置文件
///
/// 文件不存在时使用默认配置；命令行参数覆盖文件中的值。
async fn load_config(
    config_path: &Path,
    log_level: Option<String>,
    dev_mode: bool,
) -> Result<OrchestratorConfig, Box<dyn std::error::Error>> {
    let mut config = if config_path.exists() {
        OrchestratorConfig::from_file(config_path).await?
    } else {
        OrchestratorConfig::default()
    };

    if let Some(level) = log_level {
        config.logging.level = level;
    }
    if dev_mode {
        config.dev_mode = true;
    }
    config.validate()?;

    Ok(config)
}
