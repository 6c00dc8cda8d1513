//! Instruction texts sent ahead of the prompt files.

/// Tells the model how to lay out files so the reply parser can read them.
pub const RESPONSE_FORMAT: &str = r#"Respond with the complete content of every file you create or change.

For each file, write one line of the form:
File: <path relative to the repository root>
and immediately after it a fenced code block holding the entire file content.

Rules:
- Use forward slashes and relative paths only; never absolute paths or "..".
- Always output whole files, never diffs or excerpts.
- If a file itself contains ``` fences (for example a README), open and close its block with a longer fence such as ````.
- Output each file at most once. If you must correct a file, repeat it in full; the last copy wins.
- Files given to you as "(new file: does not exist yet)" should be created.
- You may add short explanations between files, but never put prose directly between a "File:" line and its code block."#;

pub const UNIT_TEST: &str = r#"You write unit tests for Python code using pytest.

- Cover the public behaviour of the module, including edge cases and error paths.
- Use fixtures and parametrize where they make the tests clearer.
- Mock network, filesystem and subprocess access instead of touching real resources.
- If a test file already exists, extend and fix it rather than discarding working tests.
- Import the module under test the way the project's packages are laid out.
- Only write test files; do not modify the source file."#;

pub const README: &str = r#"You maintain the project's README.md.

- Describe what the project does, how to install it, and how to use it, based on the files provided.
- Keep accurate existing sections; fix outdated ones.
- Use clear Markdown headings and fenced examples for commands.
- Do not invent features that are not present in the code."#;

pub const MYPY: &str = r#"You fix static type errors reported by mypy in Python code.

- Add or correct type annotations so the file passes `mypy --strict`.
- Prefer precise types over `Any`; use `typing.cast` only when unavoidable.
- Do not change runtime behaviour.
- Return the full corrected file."#;

pub const TYPER_LOG: &str = r#"You improve the user-facing log output of a Python command-line tool built with Typer.

- Use `typer.secho` with consistent colours: red for errors (written to stderr), yellow for warnings, green for success.
- Make messages short, specific, and include the relevant file path or value.
- Do not change program behaviour beyond the log output.
- Return the full updated file."#;
