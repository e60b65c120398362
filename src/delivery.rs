use std::path::Path;

use crate::assembler::OutputMode;
use crate::capabilities::{PathPolicy, WRITE_FILE_CAPABILITY};
use crate::orchestrator::{FinalAnswer, Turn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub answer: String,
    pub persisted_path: Option<String>,
    pub warnings: Vec<String>,
}

/// Path arguments of every `write_file` invocation that succeeded, in order.
pub fn successful_writes(turns: &[Turn]) -> Vec<String> {
    turns
        .iter()
        .flat_map(|turn| turn.executions.iter())
        .filter(|executed| {
            executed.invocation.name == WRITE_FILE_CAPABILITY && executed.result.is_success()
        })
        .filter_map(|executed| executed.invocation.string_arg("path"))
        .map(|path| path.trim().to_string())
        .collect()
}

/// Both paths go through the policy the write ran under, so `./out.txt`
/// and `<root>/out.txt` match while `notes/out.txt` does not.
fn same_target(policy: &PathPolicy, written: &str, target: &str) -> bool {
    match (policy.resolve(written), policy.resolve(target)) {
        (Ok(written), Ok(target)) => written == target,
        _ => Path::new(written) == Path::new(target),
    }
}

/// Hands the answer to the presentation layer unchanged.
///
/// In persist mode the write itself happened inside the loop; this only
/// confirms a successful `write_file` exists and warns when it does not.
pub fn deliver(
    answer: &FinalAnswer,
    mode: &OutputMode,
    turns: &[Turn],
    policy: &PathPolicy,
) -> DeliveryResult {
    let mut result = DeliveryResult {
        answer: answer.as_str().to_string(),
        persisted_path: None,
        warnings: Vec::new(),
    };

    let OutputMode::Persist { path: target } = mode else {
        return result;
    };

    let writes = successful_writes(turns);
    if let Some(matching) = writes.iter().rev().find(|written| same_target(policy, written, target)) {
        result.persisted_path = Some(matching.clone());
    } else if let Some(other) = writes.last() {
        result.persisted_path = Some(other.clone());
        result.warnings.push(format!(
            "summary was written to '{other}' instead of the requested '{target}'"
        ));
    } else {
        result.warnings.push(format!(
            "no successful write_file was recorded; '{target}' may not have been written"
        ));
    }

    for warning in &result.warnings {
        tracing::warn!(target_path = %target, warning = %warning, "Delivery warning");
    }
    result
}
