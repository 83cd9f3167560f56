/// Cycling request sequence counter.
///
/// Produces 1 through 15 and wraps, skipping 0: sequence number 0 is
/// reserved for unsolicited callbacks and must never tag a request. Each
/// connection owns exactly one counter, shared by all outgoing requests on
/// that connection.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    current: u8,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next sequence number, in the range 1-15.
    pub fn next(&mut self) -> u8 {
        if self.current >= 15 {
            self.current = 0;
        }
        self.current += 1;
        self.current
    }
}
