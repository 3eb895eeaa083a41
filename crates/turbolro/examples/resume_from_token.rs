//! Resume polling a long-running operation from a continuation token.
//!
//! A first poller is given too small a polling budget and gives up; the error
//! carries a continuation token that a second poller resumes from.
//!
//! Run with: `RUST_LOG=turbolro=debug cargo run --example resume_from_token`

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use turbolro::turbolro_core::backoff::{ExponentialBackoff, FixedInterval};
use turbolro::{
    DeserializationTarget, LroPoller, OperationStatus, PollingError, ResumeContext, StatusPolling,
    StatusProbe, done_callback,
};

/// Pretends to be a deployment service that provisions in five steps.
#[derive(Clone)]
struct DeploymentService {
    steps: Arc<Vec<&'static str>>,
}

struct DeploymentProbe;

impl StatusProbe for DeploymentProbe {
    type Client = DeploymentService;
    type Response = Value;

    fn status(&self, response: &Value) -> Result<OperationStatus, PollingError> {
        let status = response["properties"]["provisioningState"]
            .as_str()
            .ok_or_else(|| PollingError::deserialization("missing provisioningState"))?;
        Ok(OperationStatus::parse(status))
    }

    fn poll(&self, client: &DeploymentService, latest: &Value) -> Result<Value, PollingError> {
        let step = latest["step"].as_u64().unwrap_or(0) as usize + 1;
        let state = client.steps.get(step).copied().unwrap_or("Failed");
        Ok(json!({
            "step": step,
            "name": "web-frontend",
            "properties": {"provisioningState": state},
        }))
    }
}

fn deployment_name() -> DeserializationTarget<Value, String> {
    DeserializationTarget::function(|response: &Value| {
        response["name"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PollingError::deserialization("missing name"))
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let service = DeploymentService {
        steps: Arc::new(vec!["Accepted", "Creating", "Creating", "Updating", "Updating", "Succeeded"]),
    };
    let initial = json!({
        "step": 0,
        "name": "web-frontend",
        "properties": {"provisioningState": "Accepted"},
    });

    // Too small a budget: gives up after two polls
    let impatient = LroPoller::new(
        service.clone(),
        initial,
        deployment_name(),
        StatusPolling::new(
            DeploymentProbe,
            FixedInterval::new(Duration::from_millis(50), 2),
        ),
    )?;
    println!("first poller {} status: {}", impatient.id(), impatient.status());

    let token = match impatient.wait(None) {
        Ok(()) => anyhow::bail!("expected the first poller to give up"),
        Err(err) => {
            println!("first poller gave up: {err}");
            err.continuation_token()
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("no continuation token on {err}"))?
        }
    };
    println!("continuation token: {token}");

    let backoff = ExponentialBackoff::builder()
        .max_attempts(10)
        .initial_delay(Duration::from_millis(20))
        .max_delay(Duration::from_millis(200))
        .build();

    let resumed = LroPoller::from_continuation_token(
        StatusPolling::new(DeploymentProbe, backoff),
        &token,
        ResumeContext::new()
            .with_client(service)
            .with_deserializer(deployment_name()),
    )?;

    resumed.add_done_callback(done_callback(|strategy: &StatusPolling<_, _, String>| {
        println!("resumed poller finished after {} more polls", strategy.attempts());
    }));

    let name = resumed.result(Some(Duration::from_secs(10)))?;
    println!("deployment '{name}' is {}", resumed.status());
    Ok(())
}
