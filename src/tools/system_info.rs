//! 系统信息工具（getSystemInfo）：无参数，读取平台、版本、内存与 CPU

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::host::SystemProbe;
use crate::tools::{Tool, ToolArgs, ToolError, ToolOutput};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn to_gib(bytes: u64) -> f64 {
    (bytes as f64 / GIB * 100.0).round() / 100.0
}

pub struct SystemInfoTool {
    probe: Arc<dyn SystemProbe>,
}

impl SystemInfoTool {
    pub fn new(probe: Arc<dyn SystemProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl Tool for SystemInfoTool {
    fn name(&self) -> &str {
        "getSystemInfo"
    }

    fn description(&self) -> &str {
        "Get information about this computer: OS, version, memory and CPU."
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        // sysinfo 读取是阻塞的
        let probe = Arc::clone(&self.probe);
        let metrics = tokio::task::spawn_blocking(move || probe.metrics())
            .await
            .map_err(|e| ToolError::Failed(format!("System query failed: {}", e)))?;

        Ok(ToolOutput::new(json!({
            "platform": metrics.platform,
            "release": metrics.release,
            "totalMemoryGb": to_gib(metrics.total_memory_bytes),
            "freeMemoryGb": to_gib(metrics.free_memory_bytes),
            "cpuModel": metrics.cpu_model,
            "cpuCores": metrics.cpu_cores,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostMetrics;

    struct FixedProbe;

    impl SystemProbe for FixedProbe {
        fn metrics(&self) -> HostMetrics {
            HostMetrics {
                platform: "linux".to_string(),
                release: "6.1.0".to_string(),
                total_memory_bytes: 16 * 1024 * 1024 * 1024,
                free_memory_bytes: 4 * 1024 * 1024 * 1024 + 512 * 1024 * 1024,
                cpu_model: "Test CPU".to_string(),
                cpu_cores: 8,
            }
        }
    }

    #[tokio::test]
    async fn test_reports_metrics_in_gib() {
        let out = SystemInfoTool::new(Arc::new(FixedProbe))
            .execute(&ToolArgs::new())
            .await
            .unwrap();
        assert_eq!(out.payload["platform"], "linux");
        assert_eq!(out.payload["totalMemoryGb"], 16.0);
        assert_eq!(out.payload["freeMemoryGb"], 4.5);
        assert_eq!(out.payload["cpuCores"], 8);
        assert_eq!(out.payload["cpuModel"], "Test CPU");
    }
}
