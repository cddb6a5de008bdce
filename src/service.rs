use crate::inventory::{InventoryGenerator, InventoryRecord};
use crate::session::{
    HardwareProducer, HardwareStats, InventoryProducer, Produce, SessionReport, StreamSession,
    StreamSink, TickObserver,
};
use crate::stats::{MetricSource, ProcMetricSource};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 监控服务
///
/// 为每个流式请求构造一个会话并运行到结束。各请求之间不共享可变状态，
/// 指标来源只读，每个库存会话都有自己的随机数源。
#[derive(Clone)]
pub struct MonitorService {
    metrics: Arc<dyn MetricSource>,
    observer: Option<Arc<dyn TickObserver>>,
    shutdown: CancellationToken,
}

impl MonitorService {
    /// 使用 procfs 指标来源创建服务
    #[inline]
    pub fn new(shutdown: CancellationToken) -> Self {
        Self::with_source(Arc::new(ProcMetricSource), shutdown)
    }

    pub fn with_source(metrics: Arc<dyn MetricSource>, shutdown: CancellationToken) -> Self {
        Self {
            metrics,
            observer: None,
            shutdown,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TickObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// 服务器关闭信号
    #[inline]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// 为单个请求派生取消信号，服务器关闭时一并触发
    #[inline]
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// 硬件监控流：运行一个硬件会话直到结束
    pub async fn monitor<S>(&self, peer: &str, sink: S, cancel: CancellationToken) -> SessionReport
    where
        S: StreamSink<HardwareStats>,
    {
        let producer = HardwareProducer::new(self.metrics.clone());
        self.session(format!("hardware@{peer}"), producer, cancel)
            .run(sink)
            .await
    }

    /// 库存事件流：运行一个库存会话直到结束
    pub async fn status<S>(&self, peer: &str, sink: S, cancel: CancellationToken) -> SessionReport
    where
        S: StreamSink<InventoryRecord>,
    {
        let generator = InventoryGenerator::new(StdRng::from_os_rng());
        let producer = InventoryProducer::new(generator);
        self.session(format!("inventory@{peer}"), producer, cancel)
            .run(sink)
            .await
    }

    fn session<P>(&self, name: String, producer: P, cancel: CancellationToken) -> StreamSession<P>
    where
        P: Produce,
    {
        let session = StreamSession::new(name, producer, cancel);
        match &self.observer {
            Some(observer) => session.with_observer(observer.clone()),
            None => session,
        }
    }
}
