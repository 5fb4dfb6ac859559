//! Drives the real `car-value` binary through the client session.

use mcp::{Error, ProviderCommand, ToolOutput, ToolSession};
use runtime::{SessionBridge, SessionScope, StdioBridge, ToolHost};
use serde_json::{Map, json};
use std::time::Duration;

fn command() -> ProviderCommand {
    ProviderCommand::new(env!("CARGO_BIN_EXE_car-value"))
}

fn args(model: &str, year: i64) -> Option<Map<String, serde_json::Value>> {
    let mut args = Map::new();
    args.insert("model".into(), json!(model));
    args.insert("year".into(), json!(year));
    Some(args)
}

#[tokio::test]
async fn handshake_lists_the_tool() {
    let session = ToolSession::open(&command()).await.unwrap();

    let names: Vec<_> = session.tools().iter().map(|t| t.name.to_string()).collect();
    assert_eq!(names, ["get_car_value"]);
    assert_eq!(
        session.tools()[0].input_schema["required"],
        json!(["model", "year"])
    );

    session.close().await.unwrap();
}

#[tokio::test]
async fn call_tool_round_trip() {
    let session = ToolSession::open(&command()).await.unwrap();

    let result = session.call_tool("get_car_value", args("sedan", 2000)).await.unwrap();

    assert!(!result.failed());
    let value: i64 = result.joined_text().parse().unwrap();
    assert!(value > 0 && value < 20_000);
    assert_eq!(result.structured_content, Some(json!({ "result": value })));

    session.close().await.unwrap();
}

#[tokio::test]
async fn tool_failures_are_reported() {
    let session = ToolSession::open(&command()).await.unwrap();

    let result = session
        .call_tool("get_car_value", args("sedan", i64::from(i32::MIN)))
        .await
        .unwrap();
    assert!(result.failed());

    let err = session.call_tool("get_car_value", None).await.unwrap_err();
    assert!(matches!(err, Error::Service(_)));

    let err = session.call_tool("get_boat_value", None).await.unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(ref name) if name == "get_boat_value"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn sessions_are_independent() {
    let first = ToolSession::open(&command()).await.unwrap();
    let second = ToolSession::open(&command()).await.unwrap();

    first.close().await.unwrap();

    let result = second.call_tool("get_car_value", args("coupe", 2010)).await.unwrap();
    assert!(!result.failed());

    second.close().await.unwrap();
}

#[cfg(target_os = "linux")]
fn is_running(pid: u32) -> bool {
    // Zombies count as gone: the process has exited.
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| stat.rsplit_once(") ").map(|(_, rest)| !rest.starts_with('Z')))
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
async fn exits_soon(pid: u32) -> bool {
    for _ in 0..100 {
        if !is_running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn released_provider_exits() {
    let bridge = StdioBridge::new(command());
    let scope = SessionScope::open(&bridge).await.unwrap();
    assert_eq!(scope.session().specs().len(), 1);
    let pid = scope.session().pid().unwrap();
    assert!(is_running(pid));

    scope.release().await;
    assert!(exits_soon(pid).await, "provider {pid} survived release");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn dropped_scope_kills_provider() {
    let bridge = StdioBridge::new(command());
    let scope = SessionScope::open(&bridge).await.unwrap();
    let pid = scope.session().pid().unwrap();
    assert!(is_running(pid));

    drop(scope);
    assert!(exits_soon(pid).await, "provider {pid} survived abandon");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn cancelled_turn_kills_provider() {
    let bridge = StdioBridge::new(command());
    let pid = std::sync::Arc::new(std::sync::Mutex::new(None));

    let turn = {
        let pid = pid.clone();
        let bridge = &bridge;
        async move {
            let scope = SessionScope::open(bridge).await.unwrap();
            *pid.lock().unwrap() = scope.session().pid();
            std::future::pending::<()>().await;
            scope.release().await;
        }
    };
    let cancelled = tokio::time::timeout(Duration::from_secs(3), turn).await;
    assert!(cancelled.is_err());

    let pid = pid.lock().unwrap().take().unwrap();
    assert!(exits_soon(pid).await, "provider {pid} survived cancellation");
}

#[tokio::test]
async fn bridge_sessions_are_released_through_trait() {
    let bridge = StdioBridge::new(command());
    let session = bridge.open().await.unwrap();
    assert_eq!(session.specs()[0].name, "get_car_value");
    bridge.release(session).await;
}
