//! Canned responses for intents that never leave the process.

use serde::{Deserialize, Serialize};

pub const HEALTH_MESSAGE: &str = "Sample VM health data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRow {
    pub resource: String,
    pub cpu: String,
    pub memory: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_cost: String,
    pub top_services: Vec<String>,
    pub timeframe: String,
}

fn health_row(resource: &str, cpu: &str, memory: &str, status: &str) -> HealthRow {
    HealthRow {
        resource: resource.to_string(),
        cpu: cpu.to_string(),
        memory: memory.to_string(),
        status: status.to_string(),
    }
}

pub fn vm_health() -> Vec<HealthRow> {
    vec![
        health_row("web-vm01", "72%", "65%", "Healthy"),
        health_row("db-vm02", "92%", "88%", "High CPU"),
    ]
}

pub fn cost_summary() -> CostSummary {
    CostSummary {
        total_cost: "$1,234.56".to_string(),
        top_services: vec![
            "VMs: $789 (64%)".to_string(),
            "Storage: $345 (28%)".to_string(),
            "SQL: $100 (8%)".to_string(),
        ],
        timeframe: "Last 7 days".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_summary_uses_camel_case_keys() {
        let value = serde_json::to_value(cost_summary()).unwrap();
        assert_eq!(value["totalCost"], "$1,234.56");
        assert_eq!(value["topServices"].as_array().unwrap().len(), 3);
        assert_eq!(value["timeframe"], "Last 7 days");
    }
}
