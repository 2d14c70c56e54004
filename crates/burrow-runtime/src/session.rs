//! Session persistence — one pretty-printed JSON file per session key.
//!
//! The store has no internal locking. Single-writer access per key is
//! guaranteed upstream by the bus serializing agent invocations.

use std::path::{Path, PathBuf};

use burrow_core::{BurrowError, Message, Result, Role};

/// How many messages a history may hold before compression kicks in.
const COMPRESS_THRESHOLD: usize = 12;
/// How many trailing messages compression keeps.
const COMPRESS_TAIL: usize = 10;

pub struct SessionStore {
    storage_dir: PathBuf,
}

impl SessionStore {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    fn session_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(format!("{key}.json"))
    }

    /// Load a session's history. A missing file is an empty session, not
    /// an error; a corrupt file is an error.
    pub fn load(&self, key: &str) -> Result<Vec<Message>> {
        let path = self.session_path(key);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = std::fs::read_to_string(&path)
            .map_err(|e| BurrowError::Persistence(format!("failed to read session {key}: {e}")))?;
        serde_json::from_str(&data)
            .map_err(|e| BurrowError::Persistence(format!("failed to parse session {key}: {e}")))
    }

    /// Overwrite the session file with the full history.
    pub fn save(&self, key: &str, messages: &[Message]) -> Result<()> {
        let data = serde_json::to_string_pretty(messages)
            .map_err(|e| BurrowError::Persistence(format!("failed to serialize session {key}: {e}")))?;
        std::fs::write(self.session_path(key), data)
            .map_err(|e| BurrowError::Persistence(format!("failed to write session {key}: {e}")))
    }

    /// Bound the working history. Short histories pass through untouched;
    /// long ones keep the leading system message (when present) plus the
    /// most recent messages. The token budget is accepted for interface
    /// stability but the current policy is purely count-based.
    pub fn compress(&self, messages: Vec<Message>, _max_tokens: u32) -> Vec<Message> {
        if messages.len() <= COMPRESS_THRESHOLD {
            return messages;
        }

        let mut compressed = Vec::with_capacity(COMPRESS_TAIL + 1);
        let rest = if messages.first().map(|m| m.role) == Some(Role::System) {
            compressed.push(messages[0].clone());
            &messages[1..]
        } else {
            &messages[..]
        };

        let tail = rest.len().min(COMPRESS_TAIL);
        compressed.extend_from_slice(&rest[rest.len() - tail..]);
        compressed
    }
}

pub fn workspace_sessions_dir(workspace: &Path) -> PathBuf {
    workspace.join("sessions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::ToolCall;

    fn store(dir: &Path) -> SessionStore {
        SessionStore::new(dir)
    }

    fn user(content: &str) -> Message {
        Message::text(Role::User, content)
    }

    #[test]
    fn missing_session_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = store(dir.path()).load("nonexistent-session").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());

        let mut assistant = Message::text(Role::Assistant, "");
        assistant.tool_calls = vec![ToolCall {
            id: "call_0".into(),
            name: "exec".into(),
            arguments: r#"{"command":"ls"}"#.into(),
        }];
        let messages = vec![
            user("Hello"),
            assistant,
            Message::tool_result("call_0", "output"),
            Message::text(Role::Assistant, "Done."),
        ];

        s.save("test-session", &messages).unwrap();
        let loaded = s.load("test-session").unwrap();
        assert_eq!(loaded, messages);
    }

    #[test]
    fn save_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());

        s.save("k", &[user("first")]).unwrap();
        s.save("k", &[user("second"), Message::text(Role::Assistant, "reply")])
            .unwrap();

        let loaded = s.load("k").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "second");
    }

    #[test]
    fn corrupt_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();

        let err = store(dir.path()).load("bad").unwrap_err();
        assert!(matches!(err, BurrowError::Persistence(_)));
    }

    #[test]
    fn short_history_is_not_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let messages: Vec<Message> = (0..12).map(|i| user(&format!("m{i}"))).collect();
        let out = store(dir.path()).compress(messages.clone(), 8192);
        assert_eq!(out, messages);
    }

    #[test]
    fn long_history_keeps_system_plus_tail() {
        let dir = tempfile::tempdir().unwrap();
        let mut messages = vec![Message::text(Role::System, "prompt")];
        messages.extend((0..20).map(|i| user(&format!("m{i}"))));

        let out = store(dir.path()).compress(messages, 8192);
        assert_eq!(out.len(), 11);
        assert_eq!(out[0].role, Role::System);
        assert_eq!(out[1].content, "m10");
        assert_eq!(out[10].content, "m19");
    }

    #[test]
    fn long_history_without_system_keeps_only_tail() {
        let dir = tempfile::tempdir().unwrap();
        let messages: Vec<Message> = (0..20).map(|i| user(&format!("m{i}"))).collect();

        let out = store(dir.path()).compress(messages, 8192);
        assert_eq!(out.len(), 10);
        assert_eq!(out[0].content, "m10");
    }
}
