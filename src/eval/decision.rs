#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    /// Operational fault; not a policy verdict.
    InternalError,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::InternalError => "error",
        }
    }

    /// Process exit status reported to the host wrapper.
    pub fn exit_code(self) -> i32 {
        match self {
            Decision::Allow => 0,
            Decision::Deny => 1,
            Decision::InternalError => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub decision: Decision,
    pub reason: String,
}

impl RuleMatch {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Allow,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: reason.into(),
        }
    }

    /// The JSON verdict the hook binary prints on stdout.
    pub fn to_hook_output(&self) -> serde_json::Value {
        serde_json::json!({
            "decision": self.decision.as_str(),
            "message": self.reason,
        })
    }
}
