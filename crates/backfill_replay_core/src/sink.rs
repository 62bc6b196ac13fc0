use crate::contract::Item;

/// Downstream consumer of replayed records.
///
/// A batch is accepted or rejected as a whole; implementations must not
/// drop part of a batch and report success.
pub trait RecordSink {
    fn send(&self, records: &[Item]) -> Result<(), String>;
}

impl<S: RecordSink + ?Sized> RecordSink for &S {
    fn send(&self, records: &[Item]) -> Result<(), String> {
        (**self).send(records)
    }
}
