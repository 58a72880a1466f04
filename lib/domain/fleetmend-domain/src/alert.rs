use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::{ProblemKind, Severity};
use crate::observation::Domain;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub entity_key: String,
    pub severity: Severity,
    pub source: Domain,
    pub kind: ProblemKind,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn title(&self) -> String {
        format!(
            "[{}] {} {}",
            self.severity.as_str(),
            self.source.as_str(),
            self.kind.as_str()
        )
    }
}
