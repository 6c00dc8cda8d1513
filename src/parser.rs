//! Splits a model reply into files.
//!
//! A reply is prose with fenced blocks in it. A fence is kept when the
//! non-blank line right above it names a path, either bare (`src/app.py`) or
//! labeled (`File: src/app.py`). Markdown decoration around the marker is
//! ignored, so `### File: \`src/app.py\`` and `**src/app.py**` both work.
//! If the line right above the fence is prose, the nearest labeled marker
//! earlier in the same gap is used instead. Fences with no marker, with an
//! unsafe path, or without a closing line are dropped.

use crate::error::{Error, Result};
use std::collections::btree_map;
use std::collections::BTreeMap;

const LABELS: [&str; 5] = ["file", "filename", "file name", "path", "filepath"];

/// Repository-relative path -> full file content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap(BTreeMap<String, String>);

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, returning the content it replaced.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) -> Option<String> {
        self.0.insert(path.into(), content.into())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl IntoIterator for FileMap {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FileMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FileMap::new();
        for (path, content) in iter {
            map.insert(path, content);
        }
        map
    }
}

/// Why a fence was not turned into a file.
#[derive(Debug)]
pub enum DropReason {
    Unlabeled,
    Malformed(Error),
    Unterminated,
}

#[derive(Debug)]
pub struct Dropped {
    /// 1-based line of the opening fence.
    pub line: usize,
    pub reason: DropReason,
}

#[derive(Debug, Default)]
pub struct Scan {
    pub files: FileMap,
    pub dropped: Vec<Dropped>,
}

/// Parse a reply into a [`FileMap`]. Dropped fences are logged; a reply with
/// no usable fence is an [`Error::EmptyResponse`].
pub fn parse(raw: &str) -> Result<FileMap> {
    let scan = scan(raw);
    for dropped in &scan.dropped {
        match &dropped.reason {
            DropReason::Unlabeled => tracing::warn!(
                "dropping code block at line {}: no file path above it",
                dropped.line
            ),
            DropReason::Malformed(e) => {
                tracing::warn!("dropping code block at line {}: {}", dropped.line, e)
            }
            DropReason::Unterminated => tracing::warn!(
                "dropping code block at line {}: it is never closed (truncated reply?)",
                dropped.line
            ),
        }
    }

    if scan.files.is_empty() {
        return Err(Error::EmptyResponse);
    }
    Ok(scan.files)
}

/// Scan `raw` for labeled fences without logging.
pub fn scan(raw: &str) -> Scan {
    let lines = split_lines(raw);
    let mut result = Scan::default();
    let mut gap_start = 0;
    let mut i = 0;

    while i < lines.len() {
        let (start, line) = lines[i];
        let Some(opener) = opening_fence(line) else {
            i += 1;
            continue;
        };

        let Some(close) = (i + 1..lines.len()).find(|&j| is_closing(lines[j].1, &opener)) else {
            result.dropped.push(Dropped {
                line: i + 1,
                reason: DropReason::Unterminated,
            });
            break;
        };

        let body = &raw[start + line.len()..lines[close].0];
        let content = trim_one_newline(body);

        match find_marker(&lines[gap_start..i]) {
            Marker::Path { path, .. } => {
                if result.files.insert(path.clone(), content).is_some() {
                    tracing::debug!("{} appears more than once, keeping the later block", path);
                }
            }
            Marker::Malformed { path, reason, .. } => result.dropped.push(Dropped {
                line: i + 1,
                reason: DropReason::Malformed(Error::malformed_path(path, reason)),
            }),
            Marker::Prose => result.dropped.push(Dropped {
                line: i + 1,
                reason: DropReason::Unlabeled,
            }),
        }

        i = close + 1;
        gap_start = i;
    }

    result
}

/// Check that `path` is a plain relative path that stays inside the
/// repository, normalising a leading `./`.
pub fn validate_relative_path(path: &str) -> std::result::Result<String, String> {
    let path = path.strip_prefix("./").unwrap_or(path);
    if path.is_empty() {
        return Err("empty path".to_string());
    }
    if path.starts_with('/') {
        return Err("absolute path".to_string());
    }
    if let Some(c) = path
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '\\' | ':' | '\0' | '`' | '*'))
    {
        return Err(format!("contains {:?}", c));
    }
    for component in path.split('/') {
        match component {
            "" => return Err("empty path component".to_string()),
            "." | ".." => return Err(format!("'{}' component", component)),
            _ => {}
        }
    }
    Ok(path.to_string())
}

struct Opener {
    ch: char,
    len: usize,
}

#[derive(Debug, PartialEq)]
enum Marker {
    Path {
        path: String,
        labeled: bool,
    },
    Malformed {
        path: String,
        reason: String,
        labeled: bool,
    },
    Prose,
}

impl Marker {
    fn is_labeled(&self) -> bool {
        matches!(
            self,
            Marker::Path { labeled: true, .. } | Marker::Malformed { labeled: true, .. }
        )
    }
}

/// `(byte offset, line without terminator)` for every line.
fn split_lines(raw: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for piece in raw.split_inclusive('\n') {
        let content = piece.strip_suffix('\n').unwrap_or(piece);
        let content = content.strip_suffix('\r').unwrap_or(content);
        lines.push((offset, content));
        offset += piece.len();
    }
    lines
}

fn strip_indent(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches(' ');
    if line.len() - rest.len() > 3 {
        None
    } else {
        Some(rest)
    }
}

fn opening_fence(line: &str) -> Option<Opener> {
    let rest = strip_indent(line)?;
    let ch = rest.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let len = rest.chars().take_while(|&c| c == ch).count();
    if len < 3 {
        return None;
    }
    // A backtick info string may not contain backticks (inline code).
    if ch == '`' && rest[len..].contains('`') {
        return None;
    }
    Some(Opener { ch, len })
}

fn is_closing(line: &str, opener: &Opener) -> bool {
    let Some(rest) = strip_indent(line) else {
        return false;
    };
    let rest = rest.trim_end();
    rest.len() >= opener.len && rest.chars().all(|c| c == opener.ch)
}

fn trim_one_newline(body: &str) -> &str {
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);
    body.strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body)
}

fn find_marker(gap: &[(usize, &str)]) -> Marker {
    let mut lines = gap
        .iter()
        .rev()
        .map(|(_, line)| *line)
        .filter(|line| !line.trim().is_empty());

    let Some(nearest) = lines.next() else {
        return Marker::Prose;
    };
    let marker = parse_marker(nearest);
    if marker != Marker::Prose {
        return marker;
    }

    lines
        .map(parse_marker)
        .find(Marker::is_labeled)
        .unwrap_or(Marker::Prose)
}

fn parse_marker(line: &str) -> Marker {
    let text = line.trim().trim_start_matches('#').trim_start();
    let text = ["- ", "* ", "+ ", "> "]
        .iter()
        .find_map(|bullet| text.strip_prefix(bullet))
        .unwrap_or(text);
    let text: String = text.chars().filter(|&c| c != '*' && c != '`').collect();
    let text = text.trim();

    let (token, labeled) = match text.split_once(':') {
        Some((label, rest)) if LABELS.contains(&label.trim().to_lowercase().as_str()) => {
            (rest.trim(), true)
        }
        _ => (text, false),
    };
    let token = token.trim_end_matches(':').trim();

    if !labeled && !looks_like_path(token) {
        return Marker::Prose;
    }

    match validate_relative_path(token) {
        Ok(path) => Marker::Path { path, labeled },
        Err(reason) => Marker::Malformed {
            path: token.to_string(),
            reason,
            labeled,
        },
    }
}

fn looks_like_path(token: &str) -> bool {
    !token.is_empty()
        && !token.chars().any(char::is_whitespace)
        && (token.contains('.') || token.contains('/'))
        && !token.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_labeled_fence() {
        let raw = "Here you go.\n\nFile: path/to/file.py\n```python\nimport os\n\nprint(os.getcwd())\n```\n\nDone.";
        let files = parse(raw).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(
            files.get("path/to/file.py"),
            Some("import os\n\nprint(os.getcwd())")
        );
    }

    #[test]
    fn test_only_one_newline_trimmed() {
        let raw = "a.py\n```\n\nbody\n\n```";
        let files = parse(raw).unwrap();
        assert_eq!(files.get("a.py"), Some("\nbody\n"));
    }

    #[test]
    fn test_body_reextracts_after_reinsertion() {
        let body = "def f():\n    return 1\n";
        let raw = format!("File: m.py\n```\n{}\n```\n", body);
        let first = parse(&raw).unwrap();
        let again = format!("File: m.py\n```\n{}\n```\n", first.get("m.py").unwrap());
        assert_eq!(parse(&again).unwrap().get("m.py"), Some(body));
    }

    #[test]
    fn test_crlf_reply() {
        let raw = "File: a.py\r\n```\r\nx = 1\r\n```\r\n";
        assert_eq!(parse(raw).unwrap().get("a.py"), Some("x = 1"));
    }

    #[test]
    fn test_empty_fence_body() {
        let raw = "File: pkg/__init__.py\n```\n```\n";
        assert_eq!(parse(raw).unwrap().get("pkg/__init__.py"), Some(""));
    }

    #[test]
    fn test_no_fences_is_empty_response() {
        let err = parse("I could not generate anything useful.").unwrap_err();
        assert!(matches!(err, Error::EmptyResponse));
        assert!(matches!(parse("").unwrap_err(), Error::EmptyResponse));
    }

    #[test]
    fn test_unlabeled_fence_dropped() {
        let raw = "Here is the code:\n```python\nprint(1)\n```\n";
        let scan = scan(raw);
        assert!(scan.files.is_empty());
        assert_eq!(scan.dropped.len(), 1);
        assert_eq!(scan.dropped[0].line, 2);
        assert!(matches!(scan.dropped[0].reason, DropReason::Unlabeled));
        assert!(matches!(parse(raw).unwrap_err(), Error::EmptyResponse));
    }

    #[test]
    fn test_later_duplicate_wins() {
        let raw = "a.py\n```\n1\n```\nActually, fix that:\n\na.py\n```\n2\n```\n";
        let files = parse(raw).unwrap();
        assert_eq!(files, FileMap::from_iter([("a.py", "2")]));
    }

    #[test]
    fn test_multiple_files_with_prose() {
        let raw = "\
I'll add a test and update the module.

### File: `src/app/util.py`
```python
def add(a, b):
    return a + b
```

Then the test:

**tests/app/test_util.py**
```python
from app.util import add


def test_add():
    assert add(1, 2) == 3
```

That's all.
";
        let files = parse(raw).unwrap();
        assert_eq!(
            files.paths().collect::<Vec<_>>(),
            vec!["src/app/util.py", "tests/app/test_util.py"]
        );
        assert_eq!(
            files.get("src/app/util.py"),
            Some("def add(a, b):\n    return a + b")
        );
    }

    #[test]
    fn test_labeled_marker_found_past_prose() {
        let raw = "File: a.py\nHere is the updated file:\n\n```\nx = 2\n```\n";
        assert_eq!(parse(raw).unwrap().get("a.py"), Some("x = 2"));
    }

    #[test]
    fn test_marker_not_shared_between_fences() {
        let raw = "File: a.py\n```\n1\n```\n```\n2\n```\n";
        let scan = scan(raw);
        assert_eq!(scan.files, FileMap::from_iter([("a.py", "1")]));
        assert_eq!(scan.dropped.len(), 1);
        assert!(matches!(scan.dropped[0].reason, DropReason::Unlabeled));
    }

    #[test]
    fn test_malformed_paths_dropped() {
        let raw = "\
File: ../outside.py
```
evil
```
/etc/passwd
```
root
```
File: ok.py
```
fine
```
";
        let scan = scan(raw);
        assert_eq!(scan.files, FileMap::from_iter([("ok.py", "fine")]));
        assert_eq!(scan.dropped.len(), 2);
        for dropped in &scan.dropped {
            match &dropped.reason {
                DropReason::Malformed(e) => {
                    assert_eq!(e.kind(), crate::error::ErrorKind::MalformedPath)
                }
                other => panic!("unexpected drop reason {:?}", other),
            }
        }
    }

    #[test]
    fn test_labeled_marker_with_spaces_is_malformed() {
        let raw = "File: my file.py\n```\nx\n```\n";
        let scan = scan(raw);
        assert!(matches!(scan.dropped[0].reason, DropReason::Malformed(_)));
    }

    #[test]
    fn test_longer_outer_fence_keeps_inner_fences() {
        let raw = "File: README.md\n````markdown\n# Title\n\n```bash\npip install x\n```\n````\n";
        let files = parse(raw).unwrap();
        assert_eq!(
            files.get("README.md"),
            Some("# Title\n\n```bash\npip install x\n```")
        );
    }

    #[test]
    fn test_tilde_fence() {
        let raw = "notes/todo.md\n~~~\n- item\n~~~\n";
        assert_eq!(parse(raw).unwrap().get("notes/todo.md"), Some("- item"));
    }

    #[test]
    fn test_unterminated_fence_dropped() {
        let raw = "File: a.py\n```\nx = 1\n```\nFile: b.py\n```\ny = ";
        let scan = scan(raw);
        assert_eq!(scan.files, FileMap::from_iter([("a.py", "x = 1")]));
        assert!(matches!(
            scan.dropped.last().map(|d| &d.reason),
            Some(DropReason::Unterminated)
        ));
    }

    #[test]
    fn test_leading_dot_slash_normalised() {
        let raw = "File: ./README.md\n```\nhi\n```\n";
        assert_eq!(parse(raw).unwrap().get("README.md"), Some("hi"));
    }

    #[test]
    fn test_validate_relative_path() {
        assert_eq!(validate_relative_path("a/b.py").unwrap(), "a/b.py");
        assert!(validate_relative_path("a//b.py").is_err());
        assert!(validate_relative_path("a/../b.py").is_err());
        assert!(validate_relative_path("C:/x.py").is_err());
        assert!(validate_relative_path("a\\b.py").is_err());
        assert!(validate_relative_path("").is_err());
    }

    #[test]
    fn test_parse_marker_variants() {
        assert_eq!(
            parse_marker("- **Filename:** `pkg/__init__.py`"),
            Marker::Path {
                path: "pkg/__init__.py".into(),
                labeled: true
            }
        );
        assert_eq!(parse_marker("Here it is:"), Marker::Prose);
        assert_eq!(parse_marker("e.g. this"), Marker::Prose);
        assert_eq!(
            parse_marker("Makefile."),
            Marker::Prose,
            "sentence-ending period is not a path"
        );
        assert_eq!(parse_marker("1. a.py"), Marker::Prose);
        assert_eq!(
            parse_marker("## _private/__main__.py"),
            Marker::Path {
                path: "_private/__main__.py".into(),
                labeled: false
            }
        );
    }
}
