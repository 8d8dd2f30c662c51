//! 节点运行循环
//!
//! 一个 tokio 任务在控制台输入、对端命令、监听连接与定时校验之间 `select!`，
//! 会话状态只在这个任务里修改。对端读取放在独立任务中，经 mpsc 送回。

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use protocol::{
    Command, CommandWriter, Connection, Connector, Listener, TcpConnection, TcpConnector,
    TcpListener,
};

use crate::config::PeerConfig;
use crate::session::{NetworkAction, Outbox, PeerSession};
use crate::storage::StorageManager;

/// 对端事件通道容量
const INBOUND_CAPACITY: usize = 64;

/// 读取任务送回的事件
#[derive(Debug)]
enum PeerEvent {
    Command(Command),
    Closed(String),
}

/// 带连接代号的事件，旧连接的残留事件会被丢弃
#[derive(Debug)]
struct Inbound {
    generation: u64,
    event: PeerEvent,
}

/// 当前的对端连接
struct PeerLink {
    writer: CommandWriter<OwnedWriteHalf>,
    reader_task: JoinHandle<()>,
    generation: u64,
}

/// 对局节点
pub struct PeerNode {
    session: PeerSession,
    storage: Option<StorageManager>,
    listener: Option<TcpListener>,
    link: Option<PeerLink>,
    generation: u64,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    validate_interval: Option<Duration>,
}

impl PeerNode {
    pub fn new(config: &PeerConfig) -> Self {
        let storage = if config.save_records {
            let storage = match &config.records_dir {
                Some(dir) => StorageManager::with_dir(dir.clone()),
                None => StorageManager::new(),
            };
            match storage {
                Ok(storage) => Some(storage),
                Err(e) => {
                    tracing::warn!("无法初始化记录存储，对局记录不会保存: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        Self {
            session: PeerSession::new(config),
            storage,
            listener: None,
            link: None,
            generation: 0,
            inbound_tx,
            inbound_rx,
            validate_interval: config.validate_interval(),
        }
    }

    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    /// 先执行启动命令，再读取标准输入直到 EOF 或 `quit`
    pub async fn run(self, startup: Vec<String>) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin()).lines();
        self.run_lines(startup, stdin).await?;
        Ok(())
    }

    async fn run_lines<R>(mut self, startup: Vec<String>, mut lines: Lines<R>) -> Result<Self>
    where
        R: AsyncBufRead + Unpin,
    {
        for line in startup {
            let out = self.session.handle_line(&line);
            self.flush(out).await;
        }

        let mut ticker = self.validate_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if is_quit(&line) {
                        break;
                    }
                    let out = self.session.handle_line(&line);
                    self.flush(out).await;
                }
                Some(inbound) = self.inbound_rx.recv() => {
                    self.on_inbound(inbound).await;
                }
                accepted = accept_next(&mut self.listener) => {
                    self.on_accept(accepted).await;
                }
                _ = tick(&mut ticker) => {
                    let out = self.session.validation_tick();
                    self.flush(out).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("收到中断信号");
                    break;
                }
            }
        }

        if self.session.is_connected() {
            let out = self.session.handle_line("ChessDisconnect reason=\"Peer quit\"");
            self.flush(out).await;
        }
        self.close_link().await;
        tracing::info!("节点已退出");
        Ok(self)
    }

    /// 执行待办：输出、发送、保存，再执行网络动作
    async fn flush(&mut self, out: Outbox) {
        let mut pending = VecDeque::from([out]);

        while let Some(out) = pending.pop_front() {
            for line in &out.console {
                println!("{line}");
            }
            for cmd in &out.to_peer {
                if let Some(next) = self.send(cmd).await {
                    pending.push_back(next);
                }
            }
            for record in &out.finished {
                self.save_record(record);
            }
            for action in out.actions {
                if let Some(next) = self.perform(action).await {
                    pending.push_back(next);
                }
            }
        }
    }

    async fn send(&mut self, cmd: &Command) -> Option<Outbox> {
        let link = self.link.as_mut()?;
        match link.writer.write_command(cmd).await {
            Ok(()) => {
                tracing::debug!("发送: {}", cmd);
                None
            }
            Err(e) => {
                tracing::warn!("发送失败: {}", e);
                Some(self.session.on_connection_lost(&e.to_string()))
            }
        }
    }

    async fn perform(&mut self, action: NetworkAction) -> Option<Outbox> {
        match action {
            NetworkAction::Listen { port } => {
                match TcpListener::bind(&format!("0.0.0.0:{port}")).await {
                    Ok(listener) => {
                        tracing::info!("监听地址: {:?}", listener.local_addr());
                        self.listener = Some(listener);
                        None
                    }
                    Err(e) => {
                        tracing::warn!("监听端口 {} 失败: {}", port, e);
                        Some(self.session.on_listen_failed(&e.to_string()))
                    }
                }
            }
            NetworkAction::Connect { address } => match TcpConnector.connect(&address).await {
                Ok(conn) => Some(self.attach(conn, false).await),
                Err(e) => {
                    tracing::warn!("连接 {} 失败: {}", address, e);
                    Some(self.session.on_connect_failed(&e.to_string()))
                }
            },
            NetworkAction::Close => {
                self.close_link().await;
                None
            }
        }
    }

    /// 接管新连接：读端交给独立任务，写端留在节点
    async fn attach(&mut self, conn: TcpConnection, is_host: bool) -> Outbox {
        self.close_link().await;

        let peer_address = conn.peer_addr().unwrap_or_else(|| "unknown".to_string());
        self.generation += 1;
        let generation = self.generation;

        let (mut reader, writer) = conn.split();
        let tx = self.inbound_tx.clone();
        let reader_task = tokio::spawn(async move {
            loop {
                match reader.read_command().await {
                    Ok(cmd) => {
                        let event = PeerEvent::Command(cmd);
                        if tx.send(Inbound { generation, event }).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let event = PeerEvent::Closed(e.to_string());
                        let _ = tx.send(Inbound { generation, event }).await;
                        break;
                    }
                }
            }
        });

        self.link = Some(PeerLink {
            writer,
            reader_task,
            generation,
        });
        self.session.on_connected(is_host, peer_address)
    }

    async fn on_accept(&mut self, accepted: protocol::Result<TcpConnection>) {
        let mut conn = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("接受连接失败: {}", e);
                return;
            }
        };

        // 只支持两名玩家
        if self.link.is_some() {
            tracing::warn!("已有对端，拒绝连接 {:?}", conn.peer_addr());
            let _ = conn.close().await;
            return;
        }

        let out = self.attach(conn, true).await;
        self.flush(out).await;
    }

    async fn on_inbound(&mut self, inbound: Inbound) {
        let current = self.link.as_ref().map(|link| link.generation);
        if current != Some(inbound.generation) {
            tracing::debug!("丢弃旧连接的事件: {:?}", inbound.event);
            return;
        }

        let out = match inbound.event {
            PeerEvent::Command(cmd) => self.session.handle_peer(cmd),
            PeerEvent::Closed(reason) => self.session.on_connection_lost(&reason),
        };
        self.flush(out).await;
    }

    async fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.writer.shutdown().await;
            link.reader_task.abort();
        }
    }

    fn save_record(&self, record: &protocol::MatchRecord) {
        let Some(storage) = &self.storage else {
            return;
        };
        match storage.save_record(record) {
            Ok(record_id) => println!("Saved match record {record_id}"),
            Err(e) => tracing::error!("保存对局记录失败: {:#}", e),
        }
    }
}

fn is_quit(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "quit" | "exit")
}

/// 没有监听器时永远等待
async fn accept_next(listener: &mut Option<TcpListener>) -> protocol::Result<TcpConnection> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

/// 未启用定时校验时永远等待
async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
