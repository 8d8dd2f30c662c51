use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chess_peer::{PeerConfig, PeerNode};

/// 通过 TCP 与另一名玩家对弈的国际象棋节点
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// 配置文件路径
    #[arg(long)]
    config: Option<PathBuf>,
    /// 启动后监听的端口
    #[arg(long)]
    listen: Option<u16>,
    /// 启动后连接的对端地址 (host:port)
    #[arg(long, conflicts_with = "listen")]
    connect: Option<String>,
    /// 玩家名
    #[arg(long)]
    name: Option<String>,
    /// 把命令行给出的玩家名写回配置文件
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("chess_peer=debug".parse()?))
        .init();

    let args = Args::parse();

    let mut config = PeerConfig::load(args.config.as_deref());
    if let Some(name) = &args.name {
        config.set_player_name(name);
    }
    if args.save_config {
        config.save(args.config.as_deref())?;
    }

    info!("国际象棋节点启动中，玩家: {}", config.player_name);

    let mut startup = Vec::new();
    if let Some(port) = args.listen {
        startup.push(format!("ChessListen port={port}"));
    }
    if let Some(address) = &args.connect {
        startup.push(format!("ChessConnect ip={address}"));
    }
    if startup.is_empty() {
        println!("Local match ready. Type ChessMove from=e2 to=e4, ChessListen, ChessConnect ip=host:port or quit");
    }

    PeerNode::new(&config).run(startup).await
}
