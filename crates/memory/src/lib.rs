//! Conversation memory — the ordered, append-only message log for one
//! session.
//!
//! The session layer owns the memory and lends it to the agent loop for the
//! duration of a run: the loop appends, never deletes or reorders. Sequence
//! numbers are assigned here and are strictly increasing; after `load_from`
//! they continue from the loaded maximum.

use deskclaw_core::message::{Message, Role, ToolCallRequest};
use tracing::debug;

/// The append-only message log for a single conversation session.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    next_seq: u64,
}

impl ConversationMemory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message with the given role and content. Returns a
    /// reference to the stored message with its assigned sequence number.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let msg = match role {
            Role::User => Message::user(content),
            Role::Assistant => Message::assistant(content),
            Role::Tool => Message::tool_result("", content),
        };
        self.push(msg)
    }

    /// Append an assistant message that carries tool-call requests.
    pub fn append_assistant_calls(
        &mut self,
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> &Message {
        self.push(Message::assistant_with_calls(content, tool_calls))
    }

    /// Append a tool result linked to the call that produced it.
    pub fn append_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> &Message {
        self.push(Message::tool_result(tool_call_id, content))
    }

    fn push(&mut self, mut msg: Message) -> &Message {
        msg.seq = self.next_seq;
        self.next_seq += 1;
        self.messages.push(msg);
        self.messages.last().expect("just pushed")
    }

    /// The full history, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages in the log.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages. Sequence numbering restarts at zero.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.next_seq = 0;
    }

    /// Replace the entire log, e.g. when switching sessions. Subsequent
    /// appends continue from `max(seq) + 1` of the loaded messages.
    pub fn load_from(&mut self, messages: Vec<Message>) {
        self.next_seq = messages.iter().map(|m| m.seq + 1).max().unwrap_or(0);
        debug!(count = messages.len(), next_seq = self.next_seq, "Loaded session messages");
        self.messages = messages;
    }

    /// A cheap copy of the current log, used by the task runner to restore
    /// pre-run state before a full-run retry.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_seq() {
        let mut mem = ConversationMemory::new();
        mem.append(Role::User, "first");
        mem.append(Role::Assistant, "second");
        mem.append(Role::User, "third");

        let seqs: Vec<u64> = mem.history().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn load_from_continues_from_loaded_max() {
        let mut source = ConversationMemory::new();
        source.append(Role::User, "a");
        source.append(Role::Assistant, "b");
        source.append(Role::User, "c");
        let saved = source.snapshot();

        let mut mem = ConversationMemory::new();
        mem.append(Role::User, "unrelated");
        mem.load_from(saved);

        let appended = mem.append(Role::User, "d").seq;
        assert_eq!(appended, 3);
        assert_eq!(mem.len(), 4);
    }

    #[test]
    fn load_from_empty_restarts_numbering() {
        let mut mem = ConversationMemory::new();
        mem.append(Role::User, "a");
        mem.load_from(Vec::new());
        assert_eq!(mem.append(Role::User, "b").seq, 0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut mem = ConversationMemory::new();
        mem.append(Role::User, "a");
        mem.append(Role::Assistant, "b");
        mem.clear();
        assert!(mem.is_empty());
        assert_eq!(mem.append(Role::User, "again").seq, 0);
    }

    #[test]
    fn tool_result_keeps_call_linkage() {
        let mut mem = ConversationMemory::new();
        mem.append_assistant_calls(
            "",
            vec![ToolCallRequest {
                id: "call_9".into(),
                name: "list_files".into(),
                arguments: "{}".into(),
            }],
        );
        let msg = mem.append_tool_result("call_9", "dir listing");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
        assert_eq!(msg.seq, 1);
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let mut mem = ConversationMemory::new();
        mem.append(Role::User, "keep me");
        let snap = mem.snapshot();

        mem.append(Role::Assistant, "partial progress");
        mem.append(Role::Tool, "tool output");
        mem.load_from(snap);

        assert_eq!(mem.len(), 1);
        assert_eq!(mem.history()[0].content, "keep me");
        // Numbering resumes after the surviving messages.
        assert_eq!(mem.append(Role::Assistant, "retry").seq, 1);
    }
}
