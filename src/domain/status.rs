//! Container status rows parsed from `docker compose ps --format json`
//!
//! Older compose releases print one JSON object per line, newer ones a single
//! JSON array. Both are accepted; unparseable lines are skipped.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Publisher {
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "TargetPort", default)]
    pub target_port: u32,
    #[serde(rename = "PublishedPort", default)]
    pub published_port: u32,
    #[serde(rename = "Protocol", default)]
    pub protocol: String,
}

/// One container as reported by compose
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerStatus {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Publishers", default)]
    pub publishers: Option<Vec<Publisher>>,
}

impl ContainerStatus {
    /// `8080→80, 5432→5432`, or `N/A`
    pub fn ports(&self) -> String {
        let ports: Vec<String> = self
            .publishers
            .iter()
            .flatten()
            .filter(|p| p.published_port != 0 && p.target_port != 0)
            .map(|p| format!("{}→{}", p.published_port, p.target_port))
            .collect();
        if ports.is_empty() {
            "N/A".to_string()
        } else {
            ports.join(", ")
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Parse compose ps JSON output, sorted by service name
pub fn parse_ps_output(stdout: &str) -> Vec<ContainerStatus> {
    let trimmed = stdout.trim();
    let mut rows: Vec<ContainerStatus> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).unwrap_or_else(|e| {
            debug!("Could not parse compose ps array: {}", e);
            Vec::new()
        })
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(row) => Some(row),
                Err(e) => {
                    debug!("Skipping unparseable compose ps line: {}", e);
                    None
                }
            })
            .collect()
    };

    rows.sort_by(|a, b| a.service.cmp(&b.service).then_with(|| a.name.cmp(&b.name)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_delimited() {
        let out = r#"{"Name":"ws-web-1","Service":"web","State":"running","Status":"Up 2 minutes","Publishers":[{"URL":"0.0.0.0","TargetPort":80,"PublishedPort":8080,"Protocol":"tcp"}]}
not json
{"Name":"ws-db-1","Service":"db","State":"exited","Status":"Exited (1)","Publishers":null}"#;

        let rows = parse_ps_output(out);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].service, "db");
        assert_eq!(rows[0].ports(), "N/A");
        assert!(!rows[0].is_running());
        assert_eq!(rows[1].service, "web");
        assert_eq!(rows[1].ports(), "8080→80");
    }

    #[test]
    fn test_parse_array() {
        let out = r#"[{"Name":"a-1","Service":"a","State":"running","Status":"Up","Publishers":[{"TargetPort":5432,"PublishedPort":0}]}]"#;
        let rows = parse_ps_output(out);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ports(), "N/A");
        assert!(rows[0].is_running());
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_ps_output("").is_empty());
        assert!(parse_ps_output("[]").is_empty());
    }
}
