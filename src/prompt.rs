use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Placed after the header of a prompt file that does not exist yet.
pub const NEW_FILE_MARKER: &str = "(new file: does not exist yet)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Instruction,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub role: Role,
    pub text: String,
}

impl Block {
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: Role::Instruction,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Build the outbound block list: instructions, then one block per prompt
/// file, then the final directive. Order is kept exactly as given.
pub fn build_messages<S: AsRef<str>>(
    root: &Path,
    instructions: &[S],
    prompt_files: &[PathBuf],
    final_prompt: &str,
) -> Result<Vec<Block>> {
    let mut blocks = Vec::with_capacity(instructions.len() + prompt_files.len() + 1);

    for instruction in instructions {
        blocks.push(Block::instruction(instruction.as_ref()));
    }

    for path in prompt_files {
        blocks.push(file_block(root, path)?);
    }

    blocks.push(Block::user(final_prompt));
    Ok(blocks)
}

fn file_block(root: &Path, path: &Path) -> Result<Block> {
    let shown = relative_display(root, path);
    let full_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    let bytes = match fs::read(&full_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("prompt file {} is new", shown);
            return Ok(Block::user(format!("File: {}\n{}", shown, NEW_FILE_MARKER)));
        }
        Err(e) => {
            return Err(Error::PromptFile {
                path: full_path,
                reason: e.to_string(),
            })
        }
    };

    if bytes.contains(&0) {
        return Err(Error::PromptFile {
            path: full_path,
            reason: "binary file".to_string(),
        });
    }
    let content = String::from_utf8(bytes).map_err(|_| Error::PromptFile {
        path: full_path.clone(),
        reason: "not valid UTF-8".to_string(),
    })?;

    let fence = fence_for(&content);
    Ok(Block::user(format!(
        "File: {}\n{}\n{}\n{}",
        shown, fence, content, fence
    )))
}

/// Path as the model should see it: relative to the repository root when
/// possible, with forward slashes.
fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let shown = relative.to_string_lossy().replace('\\', "/");
    shown
        .strip_prefix("./")
        .map(str::to_string)
        .unwrap_or(shown)
}

/// A backtick fence longer than any backtick run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}
