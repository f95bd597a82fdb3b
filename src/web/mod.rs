//! HTTP 服务
//!
//! - POST /api/chat：multipart 提交一轮（字段 file / message / session_id），返回 `{reply, action}`
//! - POST /api/session/reset：丢弃会话
//! - GET /api/tools：工具目录
//! - GET /api/health
//! - 其余路径由静态目录提供（前端页面）

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::agent::Assistant;
use crate::config::WebSection;
use crate::core::{TurnOutcome, TurnSubmission};
use crate::tools::ToolSpec;

/// 未声明类型的上传按二进制流处理
const DEFAULT_UPLOAD_MIME: &str = "application/octet-stream";

type ApiError = (StatusCode, String);

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub reset: bool,
}

/// 构建路由：API + 静态文件回退
pub fn build_router(assistant: Arc<Assistant>, web: &WebSection) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/session/reset", post(api_session_reset))
        .route("/api/tools", get(api_tools_list))
        .route("/api/health", get(|| async { "OK" }))
        .fallback_service(ServeDir::new(&web.static_dir))
        .layer(DefaultBodyLimit::max(web.max_upload_bytes))
        .with_state(assistant)
}

/// 从 multipart 表单读出一次提交；空文件与空文本都视为未提供
async fn read_submission(
    mut multipart: Multipart,
) -> Result<(Option<String>, TurnSubmission), ApiError> {
    let mut session_id = None;
    let mut submission = TurnSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let mime_type = field
                    .content_type()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_UPLOAD_MIME)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                if !bytes.is_empty() {
                    submission = submission.with_attachment(bytes.to_vec(), mime_type);
                }
            }
            "message" | "session_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if name == "message" {
                    submission.text = Some(text.to_string());
                } else {
                    session_id = Some(text.to_string());
                }
            }
            other => tracing::debug!(field = %other, "ignoring unknown multipart field"),
        }
    }

    Ok((session_id, submission))
}

/// POST /api/chat：轮内错误也返回 200 与结构完整的结果（带 error 字段）
async fn api_chat(
    State(assistant): State<Arc<Assistant>>,
    multipart: Multipart,
) -> Result<Json<TurnOutcome>, ApiError> {
    let (session_id, submission) = read_submission(multipart).await?;
    tracing::info!(
        session = session_id.as_deref().unwrap_or(crate::core::DEFAULT_SESSION_KEY),
        has_text = submission.text.is_some(),
        has_attachment = submission.attachment.is_some(),
        "chat request"
    );
    let outcome = assistant.submit(session_id.as_deref(), submission).await;
    Ok(Json(outcome))
}

/// POST /api/session/reset：请求体可省略，省略时重置默认会话
async fn api_session_reset(
    State(assistant): State<Arc<Assistant>>,
    body: Option<Json<ResetRequest>>,
) -> Json<ResetResponse> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let reset = assistant.reset(req.session_id.as_deref()).await;
    Json(ResetResponse { reset })
}

async fn api_tools_list(State(assistant): State<Arc<Assistant>>) -> Json<Vec<ToolSpec>> {
    Json(assistant.tool_specs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core::AssistantBuilder;
    use crate::llm::{GatewayResponse, MessagePart, ScriptStep, ScriptedGateway, ToolCallRequest};
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "aide-test-boundary";

    fn app(gateway: &ScriptedGateway) -> Router {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        let orchestrator = AssistantBuilder::new(cfg.clone())
            .with_gateway(Arc::new(gateway.clone()))
            .build();
        build_router(Arc::new(Assistant::new(orchestrator)), &cfg.web)
    }

    /// 拼一个 multipart 请求体：(字段名, 可选文件 MIME, 内容)
    fn multipart_body(fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, mime, content) in fields {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match mime {
                Some(mime) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"upload\"\r\nContent-Type: {}\r\n\r\n",
                        name, mime
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn chat_request(fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(fields)))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_returns_reply_and_action() {
        let gateway = ScriptedGateway::new(vec![
            ScriptStep::Respond(GatewayResponse::calls(vec![ToolCallRequest::new(
                "c1",
                "openWebsite",
                json!({"url": "https://github.com"}),
            )])),
            ScriptStep::Respond(GatewayResponse::final_text("Opening GitHub.")),
        ]);
        let resp = app(&gateway)
            .oneshot(chat_request(&[("message", None, b"Open github.com")]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({
                "reply": "Opening GitHub.",
                "action": {"type": "OPEN_URL", "url": "https://github.com"}
            })
        );
    }

    #[tokio::test]
    async fn test_chat_forwards_attachment_before_text() {
        let gateway = ScriptedGateway::new(vec![ScriptStep::Respond(
            GatewayResponse::final_text("A cat."),
        )]);
        let resp = app(&gateway)
            .oneshot(chat_request(&[
                ("message", None, b"What is this?"),
                ("file", Some("image/png"), &[0x89, 0x50, 0x4e, 0x47]),
            ]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let received = gateway.received();
        assert_eq!(
            received[0],
            vec![
                MessagePart::binary(vec![0x89, 0x50, 0x4e, 0x47], "image/png"),
                MessagePart::text("What is this?"),
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_with_empty_form_forwards_empty_parts() {
        let gateway = ScriptedGateway::default();
        let resp = app(&gateway)
            .oneshot(chat_request(&[("message", None, b"  ")]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await, json!({"reply": null, "action": null}));
        assert_eq!(gateway.received(), vec![Vec::<MessagePart>::new()]);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_reported_in_body() {
        let gateway = ScriptedGateway::new(vec![ScriptStep::Fail("upstream down".to_string())]);
        let resp = app(&gateway)
            .oneshot(chat_request(&[("message", None, b"hi")]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["action"], Value::Null);
        assert_eq!(body["error"]["kind"], "gateway");
        assert!(body["reply"].as_str().unwrap().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_reset_and_tools_and_health() {
        let gateway = ScriptedGateway::new(vec![ScriptStep::Respond(
            GatewayResponse::final_text("hi"),
        )]);
        let app = app(&gateway);

        let resp = app
            .clone()
            .oneshot(chat_request(&[("message", None, b"hello"), ("session_id", None, b"s1")]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let reset = Request::builder()
            .method("POST")
            .uri("/api/session/reset")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"session_id":"s1"}"#))
            .unwrap();
        let resp = app.clone().oneshot(reset).await.unwrap();
        assert_eq!(json_body(resp).await, json!({"reset": true}));

        let tools = Request::builder().uri("/api/tools").body(Body::empty()).unwrap();
        let body = json_body(app.clone().oneshot(tools).await.unwrap()).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["getCurrentTime", "getWeather", "openWebsite", "openApplication", "getSystemInfo"]
        );

        let health = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(health).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
