//! User-visible failure notices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_NOTICES: usize = 50;

/// One recoverable failure the operator should see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    /// Component that produced it, e.g. `storage` or `device:tv1`
    pub component: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Bounded list of notices, oldest dropped first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notices {
    pub items: Vec<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a notice for a component
    pub fn add(&mut self, component: &str, message: String) {
        self.items.push(Notice {
            component: component.to_string(),
            message,
            at: Utc::now(),
        });
        if self.items.len() > MAX_NOTICES {
            let overflow = self.items.len() - MAX_NOTICES;
            self.items.drain(..overflow);
        }
    }

    /// Clear notices for a specific component
    pub fn clear_for(&mut self, component: &str) {
        let initial_count = self.items.len();
        self.items.retain(|notice| notice.component != component);

        if self.items.len() != initial_count {
            tracing::info!("Cleared {} notices for component: {}", initial_count - self.items.len(), component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_only_touches_named_component() {
        let mut notices = Notices::new();
        notices.add("storage", "write failed".into());
        notices.add("device:tv1", "unreachable".into());
        notices.clear_for("storage");
        assert_eq!(notices.items.len(), 1);
        assert_eq!(notices.items[0].component, "device:tv1");
    }

    #[test]
    fn list_is_bounded() {
        let mut notices = Notices::new();
        for i in 0..(MAX_NOTICES + 5) {
            notices.add("storage", format!("failure {}", i));
        }
        assert_eq!(notices.items.len(), MAX_NOTICES);
        assert_eq!(notices.items[0].message, "failure 5");
    }
}
