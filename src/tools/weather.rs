//! 天气查询工具（getWeather）
//!
//! 对 wttr.in 兼容接口发一次 GET `{base_url}/{location}?format=j1`，取 current_condition[0] 的温度、描述、湿度。
//! 任何失败（网络、HTTP 状态、响应结构不符）都只返回固定的错误消息，不重试。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{parameters_schema_for, parse_args};
use crate::tools::{Tool, ToolArgs, ToolError, ToolOutput};

pub const WEATHER_ERROR: &str = "Unable to fetch weather info.";

#[derive(Deserialize, JsonSchema)]
struct WeatherArgs {
    /// City or place name, e.g. "Paris"
    location: String,
}

#[derive(Deserialize)]
struct WeatherReport {
    current_condition: Vec<CurrentCondition>,
}

#[derive(Deserialize)]
struct CurrentCondition {
    #[serde(rename = "temp_C")]
    temp_c: String,
    humidity: String,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<DescValue>,
}

#[derive(Deserialize)]
struct DescValue {
    value: String,
}

/// 天气工具：持有带超时的 HTTP Client
pub struct WeatherTool {
    client: Client,
    base_url: String,
}

impl WeatherTool {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("aide/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_url(&self, location: &str) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("base url cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .push(location);
        url.query_pairs_mut().append_pair("format", "j1");
        Ok(url)
    }

    async fn fetch(&self, location: &str) -> Result<Value, String> {
        let url = self.request_url(location)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let report: WeatherReport = resp
            .json()
            .await
            .map_err(|e| format!("Malformed response: {}", e))?;
        let current = report
            .current_condition
            .into_iter()
            .next()
            .ok_or_else(|| "No current condition in response".to_string())?;
        let description = current
            .weather_desc
            .into_iter()
            .next()
            .map(|d| d.value)
            .unwrap_or_default();

        Ok(json!({
            "location": location,
            "temperature": format!("{}°C", current.temp_c),
            "description": description,
            "humidity": format!("{}%", current.humidity),
        }))
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "getWeather"
    }

    fn description(&self) -> &str {
        "Get the current weather (temperature, conditions, humidity) for a location."
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(parameters_schema_for::<WeatherArgs>())
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: WeatherArgs = parse_args(args)?;
        tracing::info!(location = %args.location, "weather lookup");
        match self.fetch(args.location.trim()).await {
            Ok(payload) => Ok(ToolOutput::new(payload)),
            Err(reason) => {
                tracing::warn!(location = %args.location, reason = %reason, "weather lookup failed");
                Err(ToolError::Failed(WEATHER_ERROR.to_string()))
            }
        }
    }
}
