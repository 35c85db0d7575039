/// Issues ids for outgoing action invocations: `action_0`, `action_1`, ...
///
/// Ids are never reused, including across forced-action retries and
/// `startup` commands. One generator is owned by the dispatcher.
#[derive(Debug, Default)]
pub struct ActionIdGenerator {
    next: u64,
}

impl ActionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("action_{}", self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}
