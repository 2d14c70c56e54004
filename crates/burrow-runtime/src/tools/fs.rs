//! File tools — read, write, append, line-range edit, and directory
//! listing, all confined by the workspace sandbox.

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use burrow_core::ToolResult;

use crate::sandbox::Sandbox;
use crate::tools::AgentTool;

fn str_arg<'a>(args: &'a serde_json::Map<String, Value>, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn int_arg(args: &serde_json::Map<String, Value>, key: &str) -> i64 {
    match args.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        _ => 0,
    }
}

// ── read_file ──────────────────────────────────────────────────

pub struct ReadFileTool {
    pub sandbox: Sandbox,
}

#[async_trait]
impl AgentTool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read entire file content"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file relative to workspace"}
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult {
        let path = match self.sandbox.resolve(str_arg(args, "path")) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {e}")),
        };

        // Line numbers help the model target edit_file ranges precisely.
        let lines: Vec<&str> = content.split('\n').collect();
        let mut numbered = String::new();
        for (i, line) in lines.iter().enumerate() {
            // A trailing newline produces one empty final segment; skip it.
            if i == lines.len() - 1 && line.is_empty() && lines.len() > 1 {
                break;
            }
            numbered.push_str(&format!("{}: {line}\n", i + 1));
        }

        ToolResult::ok(numbered)
    }
}

// ── write_file ─────────────────────────────────────────────────

pub struct WriteFileTool {
    pub sandbox: Sandbox,
}

#[async_trait]
impl AgentTool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Overwrite or create a file with given content"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path"},
                "content": {"type": "string", "description": "New content"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult {
        let path = match self.sandbox.resolve(str_arg(args, "path")) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        match tokio::fs::write(&path, str_arg(args, "content")).await {
            Ok(()) => ToolResult::ok("File written successfully."),
            Err(e) => ToolResult::error(format!("Failed to write file: {e}")),
        }
    }
}

// ── append_file ────────────────────────────────────────────────

pub struct AppendFileTool {
    pub sandbox: Sandbox,
}

#[async_trait]
impl AgentTool for AppendFileTool {
    fn name(&self) -> &str {
        "append_file"
    }

    fn description(&self) -> &str {
        "Append content to the end of a file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path"},
                "content": {"type": "string", "description": "Content to append"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult {
        let path = match self.sandbox.resolve(str_arg(args, "path")) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        use tokio::io::AsyncWriteExt;
        let file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await;
        let mut file = match file {
            Ok(f) => f,
            Err(e) => return ToolResult::error(format!("Failed to open file: {e}")),
        };

        // Dropping a tokio file may lose in-flight writes; flush before
        // reporting success.
        let written = async {
            file.write_all(str_arg(args, "content").as_bytes()).await?;
            file.flush().await
        };
        match written.await {
            Ok(()) => ToolResult::ok("Content appended successfully."),
            Err(e) => ToolResult::error(format!("Failed to append: {e}")),
        }
    }
}

// ── edit_file ──────────────────────────────────────────────────

pub struct EditFileTool {
    pub sandbox: Sandbox,
}

#[async_trait]
impl AgentTool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace content in a line range (1-indexed, inclusive)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path"},
                "start_line": {"type": "integer", "description": "Starting line number (1-indexed)"},
                "end_line": {"type": "integer", "description": "Ending line number (1-indexed, inclusive)"},
                "new_content": {"type": "string", "description": "New content to replace within the range"}
            },
            "required": ["path", "start_line", "end_line", "new_content"]
        })
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult {
        let path = match self.sandbox.resolve(str_arg(args, "path")) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        let start_line = int_arg(args, "start_line");
        let end_line = int_arg(args, "end_line");
        let new_content = str_arg(args, "new_content");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {e}")),
        };

        let lines: Vec<&str> = content.split('\n').collect();
        if start_line < 1 || start_line > lines.len() as i64 {
            return ToolResult::error("start_line out of bounds");
        }
        if end_line < start_line || end_line > lines.len() as i64 {
            return ToolResult::error("end_line out of bounds");
        }

        let mut edited: Vec<&str> = Vec::with_capacity(lines.len());
        edited.extend_from_slice(&lines[..(start_line - 1) as usize]);
        if !new_content.is_empty() {
            edited.push(new_content);
        }
        edited.extend_from_slice(&lines[end_line as usize..]);

        match tokio::fs::write(&path, edited.join("\n")).await {
            Ok(()) => ToolResult::ok("File edited successfully."),
            Err(e) => ToolResult::error(format!("Failed to write changes: {e}")),
        }
    }
}

// ── list_dir ───────────────────────────────────────────────────

pub struct ListDirTool {
    pub sandbox: Sandbox,
}

#[async_trait]
impl AgentTool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List contents of a directory"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory path relative to workspace"}
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult {
        let path = match self.sandbox.resolve(str_arg(args, "path")) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let mut reader = match tokio::fs::read_dir(&path).await {
            Ok(r) => r,
            Err(e) => return ToolResult::error(format!("Failed to read dir: {e}")),
        };

        let mut entries: Vec<(bool, String, u64)> = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let (is_dir, size) = match entry.metadata().await {
                        Ok(meta) => (meta.is_dir(), meta.len()),
                        Err(_) => (false, 0),
                    };
                    entries.push((is_dir, name, size));
                }
                Ok(None) => break,
                Err(e) => return ToolResult::error(format!("Failed to read dir: {e}")),
            }
        }
        entries.sort_by(|a, b| a.1.cmp(&b.1));

        let mut out = String::new();
        for (is_dir, name, size) in entries {
            let kind = if is_dir { "D" } else { "F" };
            out.push_str(&format!("[{kind}] {name} (Size: {size} bytes)\n"));
        }

        ToolResult::ok(out)
    }
}
