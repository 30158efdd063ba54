//! End-to-end session tests against HTTP services served by wiremock

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jobsync::config::Config;
use jobsync::jobs::{JobStage, MemoryChannel};
use jobsync::session::JobSession;

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "version": "1.1", "result": [result] }))
}

#[tokio::test]
async fn test_session_over_http_services() {
    let job_state = MockServer::start().await;
    let job_service = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "UserAndJobState.list_jobs2",
            "params": [{"authstrat": "kbaseworkspace", "authparams": ["12345"]}]
        })))
        .respond_with(rpc_result(json!([
            ["j1", ["alice"], "running", null, null, null, null, null, null, null, {"tag": "beta", "cell_id": "c1"}]
        ])))
        .mount(&job_state)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "NarrativeJobService.get_job_params"})))
        .respond_with(rpc_result(json!({"method": "Assembler.run", "app_id": "assembler/run"})))
        .mount(&job_service)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "NarrativeJobService.check_job"})))
        .respond_with(rpc_result(json!({
            "job_id": "j1",
            "job_state": "completed",
            "finished": 1,
            "creation_time": 1_700_000_000_000i64,
            "result": [{"report_ref": "1/2/3"}]
        })))
        .mount(&job_service)
        .await;

    let mut config = Config::default();
    config.services.job_service_url = job_service.uri();
    config.services.job_state_url = job_state.uri();
    config.services.retry_count = 0;
    config.poller.start_on_init = false;

    let (channel, mut messages) = MemoryChannel::shared();
    let session = JobSession::from_config(&config, channel).unwrap();

    let report = session.coordinator().initialize("12345").await.unwrap();
    assert_eq!(report.registered, vec!["j1"]);

    let status = session.coordinator().get_status("j1").await.unwrap();
    assert_eq!(status.state.stage(), JobStage::Completed);
    assert_eq!(status.owner.as_deref(), Some("alice"));
    assert_eq!(status.spec["app_id"], "assembler/run");
    assert_eq!(status.widget_info["cell_id"], "c1");
    assert_eq!(status.widget_info["result"][0]["report_ref"], "1/2/3");

    let message = tokio::time::timeout(Duration::from_secs(1), messages.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.msg_type(), "job_status");
}

#[tokio::test]
async fn test_session_rejects_invalid_config() {
    let mut config = Config::default();
    config.poller.interval_secs = 0;

    let (channel, _messages) = MemoryChannel::shared();
    assert!(JobSession::from_config(&config, channel).is_err());
}
