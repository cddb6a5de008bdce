use crate::service::MonitorService;
use crate::session::{StreamSink, WriteError};
use anyhow::{Context, Result};
use futures::stream;
use hyper::body::Bytes;
use hyper::http::StatusCode;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server};
use log::{error, info, warn};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::mpsc;

/// 硬件监控流路径
pub const HARDWARE_MONITOR_PATH: &str = "/monitoring.HardwareMonitor/Monitor";
/// 库存事件流路径
pub const INVENTORY_STATUS_PATH: &str = "/monitoring.InventoryMonitor/Status";

/// 每个流的出站缓冲（消息条数）
const STREAM_BUFFER: usize = 4;

/// 基于有界通道的出站流，每条消息编码为一行 JSON
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// 创建出站流以及对应的响应体
    pub fn channel() -> (Self, Body) {
        let (tx, rx) = mpsc::channel::<Bytes>(STREAM_BUFFER);
        let body = Body::wrap_stream(stream::unfold(rx, |mut rx| async move {
            rx.recv()
                .await
                .map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        }));
        (Self { tx }, body)
    }
}

/// 编码为一行 NDJSON
pub fn encode_line<T: Serialize>(item: &T) -> std::result::Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(item)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

impl<T: Serialize + Send> StreamSink<T> for ChannelSink {
    async fn send(&mut self, item: T) -> std::result::Result<(), WriteError> {
        let line = encode_line(&item)?;
        self.tx
            .send(line)
            .await
            .map_err(|_| WriteError::Disconnected)
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// 流式服务器
pub struct StatusServer {
    service: MonitorService,
}

impl StatusServer {
    /// 创建新的服务器实例
    #[inline]
    pub fn new(service: MonitorService) -> Self {
        Self { service }
    }

    /// 运行服务器，直到关闭信号触发
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let service = self.service;
        let shutdown = service.shutdown_token().clone();

        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let service = service.clone();
            let peer = conn.remote_addr();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    Self::handle_request(req, service.clone(), peer)
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .with_context(|| format!("无法绑定监听地址 {addr}"))?
            .http1_keepalive(true)
            .tcp_keepalive(Some(std::time::Duration::from_secs(10)))
            .tcp_nodelay(true)
            .serve(make_svc)
            .with_graceful_shutdown(async move { shutdown.cancelled().await });

        info!("服务器运行在: http://{addr}");
        info!("硬件监控流: {HARDWARE_MONITOR_PATH}，库存事件流: {INVENTORY_STATUS_PATH}");

        server.await.map_err(|e| {
            error!("服务器错误: {e}");
            anyhow::anyhow!("服务器运行错误: {e}")
        })?;

        info!("服务器正常关闭");
        Ok(())
    }

    /// 处理 HTTP 请求
    async fn handle_request(
        req: Request<Body>,
        service: MonitorService,
        peer: SocketAddr,
    ) -> std::result::Result<Response<Body>, Infallible> {
        let streaming = *req.method() == Method::GET || *req.method() == Method::POST;

        match (req.uri().path(), streaming) {
            (HARDWARE_MONITOR_PATH, true) => Ok(Self::open_hardware_stream(service, peer)),
            (INVENTORY_STATUS_PATH, true) => Ok(Self::open_inventory_stream(service, peer)),
            (HARDWARE_MONITOR_PATH | INVENTORY_STATUS_PATH, false) => Ok(Self::serve_error(
                "不支持的请求方法".to_string(),
                StatusCode::METHOD_NOT_ALLOWED,
            )),
            ("/health", _) if *req.method() == Method::GET => Ok(Self::serve_health()),
            _ => Ok(Self::serve_404()),
        }
    }

    /// 打开硬件监控流，会话在独立任务中运行
    fn open_hardware_stream(service: MonitorService, peer: SocketAddr) -> Response<Body> {
        let (sink, body) = ChannelSink::channel();
        let cancel = service.request_token();
        tokio::spawn(async move {
            service.monitor(&peer.to_string(), sink, cancel).await;
        });
        Self::serve_stream(body)
    }

    /// 打开库存事件流
    fn open_inventory_stream(service: MonitorService, peer: SocketAddr) -> Response<Body> {
        let (sink, body) = ChannelSink::channel();
        let cancel = service.request_token();
        tokio::spawn(async move {
            service.status(&peer.to_string(), sink, cancel).await;
        });
        Self::serve_stream(body)
    }

    #[inline]
    fn serve_stream(body: Body) -> Response<Body> {
        Self::respond(
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/x-ndjson")
                .header("Cache-Control", "no-cache")
                .body(body),
        )
    }

    /// 提供健康检查端点
    #[inline]
    fn serve_health() -> Response<Body> {
        Self::respond(
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "text/plain")
                .header("Cache-Control", "no-cache")
                .body(Body::from("OK")),
        )
    }

    /// 提供 404 页面
    #[inline]
    fn serve_404() -> Response<Body> {
        warn!("请求了不存在的路径");
        Self::serve_error("路径未找到".to_string(), StatusCode::NOT_FOUND)
    }

    /// 提供错误页面
    #[inline]
    fn serve_error(message: String, status: StatusCode) -> Response<Body> {
        Self::respond(
            Response::builder()
                .status(status)
                .header("content-type", "text/plain; charset=utf-8")
                .body(Body::from(message)),
        )
    }

    /// 构建响应失败时退化为空的 500 响应
    fn respond(built: hyper::http::Result<Response<Body>>) -> Response<Body> {
        built.unwrap_or_else(|e| {
            error!("构建响应失败: {e}");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
    }
}

/// 配置错误类型
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无效的地址格式: {0}")]
    InvalidAddress(String),
}

/// 配置结构
#[derive(Debug, Clone)]
pub struct Config {
    /// 服务端绑定地址
    pub bind_address: String,
    /// 服务端端口
    pub port: u16,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            bind_address: "::".to_string(),
            port: 7777,
        }
    }
}

impl Config {
    /// 构建服务器地址，IPv6 地址会自动加上方括号
    pub fn address(&self) -> std::result::Result<SocketAddr, ConfigError> {
        let host = if self.bind_address.contains(':') && !self.bind_address.starts_with('[') {
            format!("[{}]", self.bind_address)
        } else {
            self.bind_address.clone()
        };
        format!("{host}:{}", self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{host}:{}", self.port)))
    }
}
