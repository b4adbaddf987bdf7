//! Output node — collects completed upstream texts

use super::merged_text;
use crate::context::{EdgeInput, ExecOutcome};
use clawdini_core::{NodePayload, Result};

pub(super) fn execute(inputs: &[EdgeInput]) -> Result<ExecOutcome> {
    Ok(ExecOutcome::payload(NodePayload::from_text(merged_text(
        inputs,
    ))))
}
