//! Generation-checked handle table.
//!
//! The debuggee recycles value handles whenever execution resumes. Values
//! are stamped with the break generation they were produced in, and a
//! lookup through a value from an earlier generation is rejected.

use crate::{
    error::SessionError,
    values::{EvaluationResult, Handle},
};

#[derive(Debug, Default)]
pub(crate) struct HandleTable {
    epoch: u64,
}

impl HandleTable {
    /// Invalidate every handle; called whenever the debuggee resumes.
    pub(crate) fn advance(&mut self) {
        self.epoch += 1;
    }

    /// Stamp `value` with the current generation.
    pub(crate) fn record(&self, mut value: EvaluationResult) -> EvaluationResult {
        value.epoch = self.epoch;
        value
    }

    pub(crate) fn record_all(&self, values: Vec<EvaluationResult>) -> Vec<EvaluationResult> {
        values.into_iter().map(|v| self.record(v)).collect()
    }

    /// The handle of `value`, if it is still valid.
    pub(crate) fn check(&self, value: &EvaluationResult) -> Result<Option<Handle>, SessionError> {
        match value.handle {
            Some(handle) if value.epoch != self.epoch => Err(SessionError::StaleHandle { handle }),
            handle => Ok(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::values::Refs;

    #[test]
    fn values_from_earlier_breaks_are_stale() {
        let mut table = HandleTable::default();
        let value = table.record(EvaluationResult::from_mirror(
            Some("obj".into()),
            &json!({"handle": 5, "type": "object"}),
            &Refs::default(),
        ));
        assert_eq!(table.check(&value).unwrap(), Some(5));

        table.advance();
        assert!(matches!(
            table.check(&value),
            Err(SessionError::StaleHandle { handle: 5 })
        ));

        let fresh = table.record(value);
        assert_eq!(table.check(&fresh).unwrap(), Some(5));
    }

    #[test]
    fn values_without_handles_never_go_stale() {
        let mut table = HandleTable::default();
        let value = table.record(EvaluationResult::from_mirror(
            None,
            &json!({"type": "number", "value": 3, "text": "3"}),
            &Refs::default(),
        ));
        table.advance();
        assert_eq!(table.check(&value).unwrap(), None);
    }
}
