use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use swb_stream_monitor::{Config, MonitorService, StatusServer, TICK_PERIOD};
use tokio_util::sync::CancellationToken;

/// 流式监控服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 服务器绑定地址 (默认: ::，支持 IPv4 和 IPv6)
    #[arg(short, long, default_value = "::")]
    address: String,

    /// 服务器端口 (默认: 7777)
    #[arg(short, long, default_value_t = 7777)]
    port: u16,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    init_logger(&args.log_level);

    info!("流式监控服务启动中...");

    let config = Config {
        bind_address: args.address,
        port: args.port,
    };
    let addr = config.address().inspect_err(|e| error!("{e}"))?;

    info!(
        "配置信息 - 地址: {}, 端口: {}, 推送周期: {} 秒",
        config.bind_address,
        config.port,
        TICK_PERIOD.as_secs()
    );

    // 关闭信号：Ctrl-C 时通知所有会话结束
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到中断信号，正在关闭...");
                    shutdown.cancel();
                }
                Err(e) => warn!("无法监听中断信号: {e}"),
            }
        }
    });

    let server = StatusServer::new(MonitorService::new(shutdown));
    info!("服务器实例创建完成");

    if let Err(e) = server.run(addr).await {
        error!("服务器异常退出: {e:#}");
        return Err(e);
    }

    Ok(())
}

/// 初始化日志系统
fn init_logger(level: &str) {
    match env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .try_init()
    {
        Ok(_) => info!("日志系统初始化成功，级别: {level}"),
        Err(e) => eprintln!("日志系统初始化失败: {e}，使用默认设置"),
    }
}
