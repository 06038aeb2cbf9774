use serde::Deserialize;

/// One job submission as handed over by the scheduler.
///
/// Read-only to the gate. Unknown JSON fields are ignored so the host wrapper
/// can pass the whole job descriptor through.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionRequest {
    /// The literal command line the user submitted with.
    #[serde(default)]
    pub submit_line: Option<String>,
    /// Submitting group id.
    pub group_id: u32,
    /// Submitting user id.
    pub user_id: u32,
    /// Target partition; `None` when the user relies on the default partition.
    #[serde(default)]
    pub partition: Option<String>,
}

impl SubmissionRequest {
    pub fn new(submit_line: &str, group_id: u32, user_id: u32, partition: &str) -> Self {
        Self {
            submit_line: Some(submit_line.to_owned()),
            group_id,
            user_id,
            partition: Some(partition.to_owned()),
        }
    }

    pub fn submit_line(&self) -> Option<&str> {
        self.submit_line.as_deref()
    }

    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    /// Partition for log lines.
    pub fn partition_label(&self) -> &str {
        self.partition().unwrap_or("(default)")
    }
}
