//! System prompt assembly from the workspace's markdown documents.

use std::path::PathBuf;

use burrow_core::Tool;

/// Builds the system prompt fresh on every turn by concatenating the
/// workspace documents that exist, in a fixed order. No caching: edits to
/// the documents take effect on the next turn.
pub struct ContextBuilder {
    workspace: PathBuf,
}

/// Load order and the literal header each section gets.
const SECTIONS: &[(&str, &str)] = &[
    ("IDENTITY.md", "[IDENTITY]"),
    ("AGENT.md", "[AGENT GUIDELINES]"),
    ("SOUL.md", "[PERSONALITY]"),
    ("USER.md", "[USER PREFERENCES]"),
    ("memory/MEMORY.md", "[MEMORY]"),
];

impl ContextBuilder {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    /// Assemble the system prompt. Missing or empty documents are skipped;
    /// a tool catalog is appended when any tools are registered.
    pub fn build(&self, tools: &[Tool]) -> String {
        let mut parts: Vec<String> = Vec::new();

        for (file, header) in SECTIONS {
            let path = self.workspace.join(file);
            if let Ok(content) = std::fs::read_to_string(&path) {
                if !content.is_empty() {
                    parts.push((*header).to_string());
                    parts.push(content);
                }
            }
        }

        if !tools.is_empty() {
            let mut catalog = String::from("[AVAILABLE TOOLS]\n");
            catalog.push_str("You have access to the following tools:\n");
            for tool in tools {
                catalog.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            }
            catalog.push_str(
                "\nWhen you need to perform an action, output a tool call request. Do not try to hallucinate commands execution in plain text, use the provided tools.\n",
            );
            parts.push(catalog);
        }

        parts.join("\n\n")
    }
}
