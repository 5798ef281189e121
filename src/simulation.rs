//! Simulated workflow run. No agent is executed: after a single delay a report is
//! fabricated from the workflow's own instructions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::workflow::WorkflowConfig;

pub const SIMULATED_LATENCY: Duration = Duration::from_secs(2);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("No workflow loaded")]
    NotLoaded,
    #[error("Input is empty")]
    EmptyInput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
}

#[derive(Clone, Debug, Serialize)]
pub struct AgentStep {
    pub agent: String,
    pub instructions: String,
    pub handoff_description: Option<String>,
    pub tools: Vec<String>,
    pub status: StepStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub timestamp: DateTime<Utc>,
    /// Starter agent of the run.
    pub workflow: String,
    pub steps: Vec<AgentStep>,
    pub final_output: String,
}

/// Wait `latency`, then report every agent as completed in workflow order.
pub async fn simulate_run(
    workflow: &WorkflowConfig,
    user_input: &str,
    latency: Duration,
) -> Result<RunReport, SimulationError> {
    if user_input.trim().is_empty() {
        return Err(SimulationError::EmptyInput);
    }

    tracing::info!(
        "| simulation | Workflow: {} | Agents: {} | Input: {}",
        workflow.starter_agent,
        workflow.agents.len(),
        user_input
    );
    tokio::time::sleep(latency).await;

    let steps = workflow
        .agents
        .iter()
        .map(|agent| AgentStep {
            agent: agent.name.clone(),
            instructions: agent.instructions.clone(),
            handoff_description: agent.handoff_description.clone(),
            tools: agent.tools.clone(),
            status: StepStatus::Completed,
        })
        .collect::<Vec<_>>();

    let final_output = render_output(user_input, &steps);

    Ok(RunReport {
        run_id: Uuid::new_v4(),
        status: RunStatus::Success,
        timestamp: Utc::now(),
        workflow: workflow.starter_agent.clone(),
        steps,
        final_output,
    })
}

fn render_output(user_input: &str, steps: &[AgentStep]) -> String {
    let mut output = format!("[Workflow result]\n\nInput: {user_input}\n\nSteps:\n");
    for (index, step) in steps.iter().enumerate() {
        let description = step
            .handoff_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("no description");
        let tools = if step.tools.is_empty() {
            "none".to_owned()
        } else {
            step.tools.join(", ")
        };
        output.push_str(&format!(
            "\n{}. {}\n   Role: {}\n   Instructions: {}\n   Tools: {}\n   Status: completed\n",
            index + 1,
            step.agent,
            description,
            step.instructions,
            tools
        ));
    }
    output.push_str(
        "\nResult: the request was handled by the agents above, \
         following the workflow configuration.",
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::AgentConfig;

    #[tokio::test(start_paused = true)]
    async fn test_report_lists_every_agent() {
        let workflow = WorkflowConfig::example();
        let report = simulate_run(&workflow, "summarise sales", SIMULATED_LATENCY)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.workflow, "TriageAgent");
        let agents = report
            .steps
            .iter()
            .map(|s| s.agent.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            agents,
            vec![
                "TriageAgent",
                "DataExtractionAgent",
                "DataCalculationAgent",
                "ReportGenerationAgent"
            ]
        );
        assert!(report.final_output.contains("Input: summarise sales"));
        assert!(report.final_output.contains("Tools: read, grep"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_latency() {
        let workflow = WorkflowConfig::new("A", vec![AgentConfig::new("A", "i")]);
        let started = tokio::time::Instant::now();
        simulate_run(&workflow, "go", Duration::from_millis(1500))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected() {
        let workflow = WorkflowConfig::example();
        let result = simulate_run(&workflow, "   ", Duration::ZERO).await;
        let err = tokio_test::assert_err!(result);
        assert_eq!(err, SimulationError::EmptyInput);
    }
}
