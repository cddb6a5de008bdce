use thiserror::Error;

/// CPU 时间统计（单位：jiffies）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub total: u64,
}

impl CpuTimes {
    /// 自开机以来的忙碌百分比 (0-100)
    #[inline]
    pub fn busy_percent(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        let idle = self.idle + self.iowait;
        self.total.saturating_sub(idle) * 100 / self.total
    }
}

/// 内存信息（单位：KiB，与 /proc/meminfo 一致）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total: u64,
    pub available: u64,
    pub free: u64,
}

impl MemoryInfo {
    /// 已用内存 = 总内存 - 可用内存
    #[inline]
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }
}

/// 一次采样得到的主机指标，尚未收窄为线上格式
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HostMetrics {
    pub cpu_percent: u64,     // CPU 忙碌百分比
    pub memory_free_kib: u64, // 空闲内存 KiB
    pub memory_used_kib: u64, // 已用内存 KiB
}

/// 系统资源获取错误类型
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("解析错误: {0}")]
    Parse(String),
    #[error("不支持的平台")]
    UnsupportedPlatform,
}

pub type Result<T> = std::result::Result<T, StatsError>;

/// 主机指标来源
///
/// 每次调用都读取当前系统状态，不保留任何历史。
pub trait MetricSource: Send + Sync {
    fn sample(&self) -> Result<HostMetrics>;
}

/// 基于 procfs 的指标来源
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcMetricSource;

impl MetricSource for ProcMetricSource {
    fn sample(&self) -> Result<HostMetrics> {
        collect_host_metrics()
    }
}

/// 收集主机指标
pub fn collect_host_metrics() -> Result<HostMetrics> {
    #[cfg(target_os = "linux")]
    {
        collect_linux_metrics()
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(StatsError::UnsupportedPlatform)
    }
}

/// Linux 指标收集
#[cfg(target_os = "linux")]
fn collect_linux_metrics() -> Result<HostMetrics> {
    let cpu = parse_cpu_times(&std::fs::read_to_string("/proc/stat")?)?;
    let memory = parse_meminfo(&std::fs::read_to_string("/proc/meminfo")?)?;

    Ok(HostMetrics {
        cpu_percent: cpu.busy_percent(),
        memory_free_kib: memory.free,
        memory_used_kib: memory.used(),
    })
}

/// 解析 /proc/stat 的汇总 CPU 行
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes> {
    let line = content
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or_else(|| StatsError::Parse("/proc/stat 中缺少 cpu 行".to_string()))?;

    // user nice system idle iowait irq softirq steal，guest 已计入 user
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|v| v.parse().unwrap_or(0))
        .collect();
    let field = |i: usize| fields.get(i).copied().unwrap_or(0);

    Ok(CpuTimes {
        user: field(0),
        nice: field(1),
        system: field(2),
        idle: field(3),
        iowait: field(4),
        total: fields.iter().sum(),
    })
}

/// 解析 /proc/meminfo
pub fn parse_meminfo(content: &str) -> Result<MemoryInfo> {
    let mut info = MemoryInfo::default();
    let mut has_total = false;
    let mut has_available = false;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            let value = value.parse::<u64>().unwrap_or(0);

            match key {
                "MemTotal:" => {
                    info.total = value;
                    has_total = true;
                }
                "MemAvailable:" => {
                    info.available = value;
                    has_available = true;
                }
                "MemFree:" => info.free = value,
                _ => {}
            }
        }
    }

    if !has_total {
        return Err(StatsError::Parse("/proc/meminfo 中缺少 MemTotal".to_string()));
    }
    // 旧内核没有 MemAvailable，退化为 MemFree
    if !has_available {
        info.available = info.free;
    }

    Ok(info)
}
