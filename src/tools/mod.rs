pub mod clock;
pub mod executor;
pub mod launcher;
pub mod open_url;
pub mod registry;
pub mod schema;
pub mod system_info;
pub mod weather;

pub use clock::CurrentTimeTool;
pub use executor::{ToolCallResult, ToolExecutor};
pub use launcher::OpenApplicationTool;
pub use open_url::OpenUrlTool;
pub use registry::{ClientAction, Tool, ToolArgs, ToolError, ToolOutput, ToolRegistry, ToolSpec};
pub use system_info::SystemInfoTool;
pub use weather::{WeatherTool, WEATHER_ERROR};
