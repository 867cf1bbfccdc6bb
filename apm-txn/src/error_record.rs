//! At most one recorded application error per transaction (spec.md §3.6,
//! §7 `RecordedError`): data, not control flow, and retained only if it
//! strictly outranks whatever was recorded before.

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedError {
    pub klass: String,
    pub message: String,
    pub priority: i32,
    pub span_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ErrorSlot {
    current: Option<RecordedError>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        ErrorSlot { current: None }
    }

    /// Replace the stored error only if `candidate` strictly outranks the
    /// current one (or none is stored yet). Returns `true` if it replaced.
    pub fn record(&mut self, candidate: RecordedError) -> bool {
        let replace = match &self.current {
            None => true,
            Some(existing) => candidate.priority > existing.priority,
        };
        if replace {
            self.current = Some(candidate);
        }
        replace
    }

    pub fn get(&self) -> Option<&RecordedError> {
        self.current.as_ref()
    }

    pub fn is_some(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(priority: i32) -> RecordedError {
        RecordedError {
            klass: "Exception".to_string(),
            message: "boom".to_string(),
            priority,
            span_id: None,
        }
    }

    #[test]
    fn first_error_is_always_recorded() {
        let mut slot = ErrorSlot::new();
        assert!(slot.record(err(1)));
        assert!(slot.is_some());
    }

    #[test]
    fn lower_priority_does_not_replace() {
        let mut slot = ErrorSlot::new();
        slot.record(err(5));
        assert!(!slot.record(err(3)));
        assert_eq!(slot.get().unwrap().priority, 5);
    }

    #[test]
    fn strictly_higher_priority_replaces() {
        let mut slot = ErrorSlot::new();
        slot.record(err(5));
        assert!(slot.record(err(6)));
        assert_eq!(slot.get().unwrap().priority, 6);
    }

    #[test]
    fn equal_priority_does_not_replace() {
        let mut slot = ErrorSlot::new();
        slot.record(err(5));
        assert!(!slot.record(err(5)));
    }
}
