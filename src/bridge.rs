//! The messaging bridge.
//!
//! Three verbs, JSON in and JSON out. Transports (an extension UI process, a
//! dashboard poller) stay external; they hand a request value to
//! [`MessageBridge::handle`] and get a response value back. Malformed
//! requests come back as `InvalidParameter`, never as a transport error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use vidlens_core_types::{ControlCommand, ControlVerb, CoreError, VideoMetadata};

use crate::VidLens;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeRequest {
    Ping,
    GetCurrentVideo,
    #[serde(rename_all = "camelCase")]
    ControlVideo {
        control: ControlVerb,
        #[serde(default)]
        time: Option<f64>,
        #[serde(default)]
        rate: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
pub struct BridgeError {
    pub code: String,
    pub message: String,
}

impl From<&CoreError> for BridgeError {
    fn from(err: &CoreError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BridgeResponse {
    Pong {
        status: &'static str,
    },
    #[serde(rename_all = "camelCase")]
    Outcome {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        video_data: Option<VideoMetadata>,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<BridgeError>,
    },
}

impl BridgeResponse {
    fn failure(err: &CoreError) -> Self {
        BridgeResponse::Outcome {
            success: false,
            video_data: None,
            warning: None,
            error: Some(err.into()),
        }
    }
}

/// Message handler bound to one attached pipeline.
pub struct MessageBridge {
    lens: Arc<VidLens>,
}

impl MessageBridge {
    pub fn new(lens: Arc<VidLens>) -> Self {
        Self { lens }
    }

    /// Untyped entry point for transports that carry raw JSON.
    pub async fn handle(&self, request: Value) -> Value {
        let response = match serde_json::from_value::<BridgeRequest>(request) {
            Ok(request) => self.handle_request(request).await,
            Err(err) => BridgeResponse::failure(&CoreError::InvalidParameter(format!(
                "unrecognized request: {err}"
            ))),
        };
        // The response types above always serialize.
        serde_json::to_value(&response).unwrap_or(Value::Null)
    }

    pub async fn handle_request(&self, request: BridgeRequest) -> BridgeResponse {
        debug!(target: "vidlens", ?request, "bridge request");
        match request {
            BridgeRequest::Ping => BridgeResponse::Pong { status: "ok" },
            BridgeRequest::GetCurrentVideo => match self.lens.current_video().await {
                Ok(metadata) => BridgeResponse::Outcome {
                    success: true,
                    video_data: Some(metadata),
                    warning: None,
                    error: None,
                },
                Err(err) => BridgeResponse::failure(&err),
            },
            BridgeRequest::ControlVideo {
                control,
                time,
                rate,
            } => {
                let command = ControlCommand {
                    verb: control,
                    time,
                    rate,
                };
                let result = self.lens.control(command).await;
                let code = result.error_code;
                BridgeResponse::Outcome {
                    success: result.success,
                    video_data: result.metadata,
                    warning: result.warning,
                    error: result.error.map(|message| BridgeError {
                        code: code.unwrap_or_else(|| "ControlRejected".to_string()),
                        message,
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binding_center::BindingCenterConfig;
    use page_bridge::{MediaNodeSpec, ScriptedPage};
    use serde_json::json;
    use vidlens_core_types::retry::RetryPolicy;

    fn bridge(page: &ScriptedPage) -> MessageBridge {
        let config = BindingCenterConfig {
            retry: RetryPolicy::immediate(3),
            ..BindingCenterConfig::default()
        };
        MessageBridge::new(Arc::new(VidLens::attach(Arc::new(page.clone()), config)))
    }

    #[tokio::test]
    async fn ping_answers_ok() {
        let page = ScriptedPage::new("https://watch.example");
        let response = bridge(&page).handle(json!({"type": "ping"})).await;
        assert_eq!(response, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn get_current_video_round_trips_video_data() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(MediaNodeSpec::new().heading("Clip"));
        let response = bridge(&page).handle(json!({"type": "getCurrentVideo"})).await;

        assert_eq!(response["success"], json!(true));
        assert_eq!(response["videoData"]["title"], json!("Clip"));
        assert_eq!(response["videoData"]["platform"], json!("native"));
    }

    #[tokio::test]
    async fn control_video_carries_the_result_through() {
        let page = ScriptedPage::new("https://watch.example");
        page.install_media_node(MediaNodeSpec::new());
        let bridge = bridge(&page);

        let response = bridge
            .handle(json!({"type": "controlVideo", "control": "setRate", "rate": 1.5}))
            .await;
        assert_eq!(response["success"], json!(true));
        assert_eq!(response["videoData"]["playbackRate"], json!(1.5));
    }

    #[tokio::test]
    async fn malformed_requests_are_invalid_parameters() {
        let page = ScriptedPage::new("https://watch.example");
        let response = bridge(&page).handle(json!({"type": "selfDestruct"})).await;
        assert_eq!(response["success"], json!(false));
        assert_eq!(response["error"]["code"], json!("InvalidParameter"));
    }

    #[tokio::test]
    async fn missing_video_reports_no_video_found() {
        let page = ScriptedPage::new("https://watch.example");
        let response = bridge(&page).handle(json!({"type": "getCurrentVideo"})).await;
        assert_eq!(response["success"], json!(false));
        assert_eq!(response["error"]["code"], json!("NoVideoFound"));
    }
}
