//! ObservationScope for begin/complete logging of multi-step operations
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` on `complete()`
//! - Logs `{name}_FAILED` on `fail()`, or on drop if neither was called

use super::logger::Logger;

/// A scope that logs the start and end of an operation.
///
/// ```ignore
/// let scope = ObservationScope::new("ROLLBACK", &[("record", "r1")]);
/// // ... do work ...
/// scope.complete(&[("checkpoint", "r1_v3")]);
/// ```
pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    finished: bool,
}

impl ObservationScope {
    pub fn new(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        let fields: Vec<(&'static str, String)> =
            fields.iter().map(|(k, v)| (*k, v.to_string())).collect();
        Logger::info(&format!("{}_BEGIN", name), &Self::refs(&fields, &[]));

        Self {
            name,
            fields,
            finished: false,
        }
    }

    fn refs<'a>(fields: &'a [(&'static str, String)], extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain(extra.iter().copied())
            .collect()
    }

    /// Logs `{name}_COMPLETE` with the scope fields plus `extra`.
    pub fn complete(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        Logger::info(&format!("{}_COMPLETE", self.name), &Self::refs(&self.fields, extra));
    }

    /// Logs `{name}_FAILED` with a reason.
    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        Logger::error(
            &format!("{}_FAILED", self.name),
            &Self::refs(&self.fields, &[("reason", reason)]),
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            Logger::error(
                &format!("{}_FAILED", self.name),
                &Self::refs(&self.fields, &[("reason", "scope dropped without completion")]),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_complete() {
        let scope = ObservationScope::new("TEST", &[("record", "r1")]);
        assert!(!scope.is_finished());
        scope.complete(&[("result", "ok")]);
    }

    #[test]
    fn test_scope_fail() {
        let scope = ObservationScope::new("TEST", &[]);
        scope.fail("something went wrong");
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = ObservationScope::new("TEST", &[]);
        drop(scope);
    }
}
