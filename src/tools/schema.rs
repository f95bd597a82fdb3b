//! 工具参数 JSON Schema 生成（schemars 自动生成）
//!
//! 每个有参工具定义一个带 `JsonSchema` 的参数结构体，这里把它转成函数调用协议需要的 object schema，
//! 并提供把调用参数反序列化为该结构体的辅助函数。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tools::{ToolArgs, ToolError};

/// 返回参数结构体的 object schema（去掉 `$schema` / `title` 这类函数声明里用不到的键）
pub fn parameters_schema_for<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
    }
    value
}

/// 把调用参数解析为参数结构体；缺少必填字段或类型不符时返回 InvalidArguments
pub fn parse_args<T: DeserializeOwned>(args: &ToolArgs) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct LocationArgs {
        /// City name
        location: String,
    }

    #[test]
    fn test_schema_is_plain_object_schema() {
        let schema = parameters_schema_for::<LocationArgs>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["location"]["type"], "string");
        assert_eq!(schema["required"], json!(["location"]));
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
    }

    #[test]
    fn test_parse_args_reports_missing_field() {
        let args = ToolArgs::new();
        let err = parse_args::<LocationArgs>(&args).err().unwrap();
        assert!(err.to_string().contains("location"));
    }
}
