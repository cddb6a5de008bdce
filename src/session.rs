//! 周期推送会话
//!
//! 每个客户端流对应一个会话：按固定周期产生一条消息并写入该客户端的出站流，
//! 直到取消信号触发或客户端离开。硬件与库存两种流共用同一套计时与取消逻辑，
//! 只在消息的产生方式上不同（见 [`Produce`]）。

use crate::inventory::{InventoryError, InventoryGenerator, InventoryRecord};
use crate::stats::{MetricSource, StatsError};
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// 推送周期，固定为 2 秒
pub const TICK_PERIOD: Duration = Duration::from_secs(2);

/// 线上格式的硬件统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HardwareStats {
    pub cpu: i32,
    pub memory_free: i32,
    pub memory_used: i32,
}

/// 单个周期内数据来源失败
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("指标不可用: {0}")]
    MetricUnavailable(#[from] StatsError),
    #[error("库存生成失败: {0}")]
    Inventory(#[from] InventoryError),
}

/// 写入客户端流失败
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("客户端已断开")]
    Disconnected,
    #[error("消息编码失败: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 每个周期产生一条消息，失败时本周期跳过
pub trait Produce: Send {
    type Output: Send;

    fn produce(&mut self) -> Result<Self::Output, SourceError>;
}

/// 会话的出站流
pub trait StreamSink<T>: Send {
    /// 写入一条消息
    fn send(&mut self, item: T) -> impl Future<Output = Result<(), WriteError>> + Send;

    /// 客户端离开时完成
    fn closed(&self) -> impl Future<Output = ()> + Send;
}

/// 单个周期的结果
#[derive(Debug)]
pub enum TickOutcome<'a> {
    Sent,
    Skipped(&'a SourceError),
    WriteFailed(&'a WriteError),
}

/// 接收每个周期的结果，决定如何记录由实现者负责
pub trait TickObserver: Send + Sync {
    fn observe(&self, session: &str, outcome: &TickOutcome<'_>);
}

/// 把周期结果写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TickObserver for LogObserver {
    fn observe(&self, session: &str, outcome: &TickOutcome<'_>) {
        match outcome {
            TickOutcome::Sent => debug!("[{session}] 已推送一条消息"),
            TickOutcome::Skipped(e) => warn!("[{session}] 本周期跳过: {e}"),
            TickOutcome::WriteFailed(e) => warn!("[{session}] 写入失败: {e}"),
        }
    }
}

/// 会话结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// 取消信号触发（服务器关闭或请求被取消）
    Cancelled,
    /// 客户端关闭了流
    ClientGone,
    /// 写入失败，视为连接已不可用
    WriteFailed,
}

/// 会话结束时的汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub sent: u64,
    pub skipped: u64,
}

enum Wake {
    Cancelled,
    ClientGone,
    Tick,
}

/// 一个客户端流的周期推送会话
pub struct StreamSession<P> {
    name: String,
    producer: P,
    cancel: CancellationToken,
    observer: Arc<dyn TickObserver>,
    period: Duration,
}

impl<P: Produce> StreamSession<P> {
    pub fn new(name: impl Into<String>, producer: P, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            producer,
            cancel,
            observer: Arc::new(LogObserver),
            period: TICK_PERIOD,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TickObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 运行会话直到取消、客户端离开或写入失败
    pub async fn run<S>(mut self, mut sink: S) -> SessionReport
    where
        S: StreamSink<P::Output>,
    {
        // 第一次推送发生在一个周期之后
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sent = 0;
        let mut skipped = 0;

        info!("[{}] 会话开始", self.name);

        let end = loop {
            let wake = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Wake::Cancelled,
                _ = sink.closed() => Wake::ClientGone,
                _ = ticker.tick() => Wake::Tick,
            };

            match wake {
                Wake::Cancelled => break SessionEnd::Cancelled,
                Wake::ClientGone => break SessionEnd::ClientGone,
                Wake::Tick => {}
            }

            let item = match self.producer.produce() {
                Ok(item) => item,
                Err(e) => {
                    skipped += 1;
                    self.observer.observe(&self.name, &TickOutcome::Skipped(&e));
                    continue;
                }
            };

            // 客户端停止读取时写入可能一直挂起，取消信号仍需生效
            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = sink.send(item) => Some(result),
            };
            let Some(result) = written else {
                break SessionEnd::Cancelled;
            };

            match result {
                Ok(()) => {
                    sent += 1;
                    self.observer.observe(&self.name, &TickOutcome::Sent);
                }
                Err(e) => {
                    self.observer
                        .observe(&self.name, &TickOutcome::WriteFailed(&e));
                    break SessionEnd::WriteFailed;
                }
            }
        };

        info!(
            "[{}] 会话结束: {end:?}，已推送 {sent} 条，跳过 {skipped} 个周期",
            self.name
        );

        SessionReport { end, sent, skipped }
    }
}

/// 把指标来源的结果收窄为线上格式
pub struct HardwareProducer {
    source: Arc<dyn MetricSource>,
}

impl HardwareProducer {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }
}

#[inline]
fn narrow(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl Produce for HardwareProducer {
    type Output = HardwareStats;

    fn produce(&mut self) -> Result<HardwareStats, SourceError> {
        let metrics = self.source.sample()?;
        Ok(HardwareStats {
            cpu: narrow(metrics.cpu_percent),
            memory_free: narrow(metrics.memory_free_kib),
            memory_used: narrow(metrics.memory_used_kib),
        })
    }
}

/// 每个周期生成一条随机库存事件
pub struct InventoryProducer<R> {
    generator: InventoryGenerator<R>,
}

impl<R> InventoryProducer<R> {
    pub fn new(generator: InventoryGenerator<R>) -> Self {
        Self { generator }
    }
}

impl<R: Rng + Send> Produce for InventoryProducer<R> {
    type Output = InventoryRecord;

    fn produce(&mut self) -> Result<InventoryRecord, SourceError> {
        Ok(self.generator.next_record()?)
    }
}
