//! Declarative workflow files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Declarative description of an agent workflow, the shape of imported and exported files.
///
/// Hand-written files are accepted loosely: absent fields and explicit `null`s load
/// as empty values, and the converter reports what it could not resolve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub starter_agent: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub agents: Vec<AgentConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instructions: String,
    #[serde(default)]
    pub handoff_description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tools: Vec<String>,
    /// Names of the agents control may pass to next.
    #[serde(default, deserialize_with = "null_as_default")]
    pub handoffs: Vec<String>,
    #[serde(default)]
    pub output_parameters: Option<serde_json::Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            ..Default::default()
        }
    }

    pub fn handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    pub fn tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn handoffs<S: Into<String>>(mut self, handoffs: impl IntoIterator<Item = S>) -> Self {
        self.handoffs = handoffs.into_iter().map(Into::into).collect();
        self
    }

    pub fn output_parameters(mut self, output_parameters: serde_json::Value) -> Self {
        self.output_parameters = Some(output_parameters);
        self
    }
}

impl WorkflowConfig {
    pub fn new(starter_agent: impl Into<String>, agents: Vec<AgentConfig>) -> Self {
        Self {
            starter_agent: starter_agent.into(),
            agents,
        }
    }

    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The built-in triage example offered by the editor.
    pub fn example() -> Self {
        Self::new(
            "TriageAgent",
            vec![
                AgentConfig::new(
                    "TriageAgent",
                    "You are a triage assistant. Work out what the user needs and hand off to the right specialist.",
                )
                .handoff_description(
                    "Handles every initial request and decides whether it needs extraction, calculation or a report",
                )
                .handoffs([
                    "DataExtractionAgent",
                    "DataCalculationAgent",
                    "ReportGenerationAgent",
                ]),
                AgentConfig::new(
                    "DataExtractionAgent",
                    "You extract the key data points from the text you are given.",
                )
                .handoff_description("Extracts key data from text")
                .tools(["read", "grep"])
                .handoffs(["DataCalculationAgent"])
                .output_parameters(serde_json::json!({
                    "extracted_data": "Key data extracted from the text"
                })),
                AgentConfig::new(
                    "DataCalculationAgent",
                    "You analyse extracted data with calculations.",
                )
                .handoff_description("Receives extracted data and computes the analysis")
                .tools(["bash"])
                .handoffs(["ReportGenerationAgent"])
                .output_parameters(serde_json::json!({
                    "calculated_results": "Results of the calculation"
                })),
                AgentConfig::new(
                    "ReportGenerationAgent",
                    "You summarise the analysis and write a detailed report.",
                )
                .handoff_description("Writes the analysis report")
                .tools(["write"])
                .output_parameters(serde_json::json!({
                    "analysis_report": "The complete analysis report"
                })),
            ],
        )
    }
}

/// A serialized workflow ready to be offered as a download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

impl ExportFile {
    pub fn new(config: &WorkflowConfig, now: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            file_name: format!("agent-workflow-{}.json", now.timestamp_millis()),
            contents: config.to_json_pretty()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_missing_lists_default_to_empty() {
        let config = WorkflowConfig::from_json(
            r#"{"starter_agent": "A", "agents": [{"name": "A", "instructions": "i"}]}"#,
        )
        .unwrap();
        let agent = config.agent("A").unwrap();
        assert!(agent.tools.is_empty());
        assert!(agent.handoffs.is_empty());
        assert_eq!(agent.handoff_description, None);
        assert_eq!(agent.output_parameters, None);
    }

    #[test]
    fn test_nulls_load_as_empty() {
        let config = WorkflowConfig::from_json(
            r#"{"starter_agent": null, "agents": [
                {"name": "A", "instructions": null, "tools": null, "handoffs": null}
            ]}"#,
        )
        .unwrap();
        assert_eq!(config.starter_agent, "");
        let agent = config.agent("A").unwrap();
        assert_eq!(agent.instructions, "");
        assert!(agent.tools.is_empty());
        assert!(agent.handoffs.is_empty());
    }

    #[test]
    fn test_missing_starter_loads() {
        let config = WorkflowConfig::from_json(r#"{"agents": [{"name": "A"}]}"#).unwrap();
        assert_eq!(config.starter_agent, "");
        assert_eq!(config.agents.len(), 1);
    }

    #[test]
    fn test_example_is_consistent() {
        let config = WorkflowConfig::example();
        assert!(config.agent(&config.starter_agent).is_some());
        for agent in &config.agents {
            for target in &agent.handoffs {
                assert!(config.agent(target).is_some(), "dangling {target}");
            }
        }
    }

    #[test]
    fn test_export_file_name_and_format() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let file = ExportFile::new(&WorkflowConfig::example(), now).unwrap();
        assert_eq!(file.file_name, "agent-workflow-1700000000123.json");
        assert!(file.contents.starts_with("{\n  \"starter_agent\""));
        assert_eq!(
            WorkflowConfig::from_json(&file.contents).unwrap(),
            WorkflowConfig::example()
        );
    }
}
