//! 流式监控服务库
//!
//! 为每个客户端流按固定周期推送一条消息：主机资源占用（CPU、内存）或模拟的库存变更事件。

pub mod inventory;
pub mod server;
pub mod service;
pub mod session;
pub mod stats;

// 重新导出主要的公共类型
pub use inventory::{Action, Category, InventoryGenerator, InventoryRecord, Item, ItemDetails};
pub use server::{ChannelSink, Config, StatusServer};
pub use service::MonitorService;
pub use session::{
    HardwareStats, LogObserver, Produce, SessionEnd, SessionReport, StreamSession, StreamSink,
    TICK_PERIOD, TickObserver, TickOutcome,
};
pub use stats::{HostMetrics, MetricSource, ProcMetricSource, collect_host_metrics};
