use crate::error::{ErrorKind, Result};
use crate::instructions;
use crate::parser;
use crate::providers::ChatClient;
use crate::repo::source_to_test_path;
use crate::writer::{self, Confirm, WriteOutcome};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    UnitTest,
    Readme,
    Mypy,
    TyperLog,
}

impl Command {
    /// What the command does to one item, for messages.
    pub fn action(&self) -> &'static str {
        match self {
            Command::UnitTest => "create test for",
            Command::Readme => "create",
            Command::Mypy => "fix mypy errors for",
            Command::TyperLog => "improve typer logs for",
        }
    }
}

/// One request to the model and the files it should see.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub item: String,
    pub instructions: Vec<&'static str>,
    pub prompt_files: Vec<PathBuf>,
    pub final_prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Run(Job),
    Skip { item: String, reason: String },
}

#[derive(Debug)]
pub enum ItemOutcome {
    Written(Vec<WriteOutcome>),
    Skipped(String),
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug)]
pub struct ItemResult {
    pub item: String,
    pub outcome: ItemOutcome,
}

impl ItemResult {
    /// Failed outright, or every file it produced failed to write.
    pub fn is_failure(&self) -> bool {
        match &self.outcome {
            ItemOutcome::Failed { .. } => true,
            ItemOutcome::Written(writes) => {
                !writes.is_empty() && writes.iter().all(|w| w.result.is_err())
            }
            ItemOutcome::Skipped(_) => false,
        }
    }
}

/// Turn a command and the tracked files into tasks. `readme` ignores the
/// tracked files and produces a single job.
pub fn plan(command: Command, tracked: &[String]) -> Vec<Task> {
    if command == Command::Readme {
        return vec![Task::Run(job_for(command, "README.md"))];
    }

    tracked
        .iter()
        .map(|file| {
            let skips_init = matches!(command, Command::UnitTest | Command::TyperLog);
            if skips_init && file.ends_with("__init__.py") {
                return Task::Skip {
                    item: file.clone(),
                    reason: "__init__.py file".to_string(),
                };
            }
            Task::Run(job_for(command, file))
        })
        .collect()
}

fn job_for(command: Command, file: &str) -> Job {
    let src = PathBuf::from(file);
    let (instruction, prompt_files, final_prompt) = match command {
        Command::UnitTest => (
            instructions::UNIT_TEST,
            vec![src.clone(), source_to_test_path(&src)],
            format!(r#"Focus only on creating a test for "{}""#, file),
        ),
        Command::Mypy => (
            instructions::MYPY,
            vec![src],
            format!("Focus on fixing only mypy errors related to {}", file),
        ),
        Command::TyperLog => (
            instructions::TYPER_LOG,
            vec![src],
            format!("Focus on only {}", file),
        ),
        Command::Readme => (
            instructions::README,
            vec![PathBuf::from("README.md")],
            r#"Focus only on creating a single "README.md""#.to_string(),
        ),
    };

    Job {
        item: file.to_string(),
        instructions: vec![instructions::RESPONSE_FORMAT, instruction],
        prompt_files,
        final_prompt,
    }
}

/// Send one job, parse the reply and write the files it names.
pub async fn run_job(
    client: &ChatClient,
    job: &Job,
    force: bool,
    confirm: &mut dyn Confirm,
) -> Result<Vec<WriteOutcome>> {
    let response = client
        .send_message(&job.instructions, &job.prompt_files, &job.final_prompt)
        .await?;
    let files = parser::parse(&response)?;
    tracing::debug!(item = %job.item, files = files.len(), "parsed response");
    Ok(writer::write_files(client.root(), files, force, confirm))
}

/// Run tasks one after another. A failing item is recorded and the batch
/// moves on; `on_item` sees each result as soon as it is known.
pub async fn run_batch<F>(
    client: &ChatClient,
    tasks: Vec<Task>,
    force: bool,
    confirm: &mut dyn Confirm,
    mut on_item: F,
) -> Vec<ItemResult>
where
    F: FnMut(&ItemResult),
{
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        let result = match task {
            Task::Skip { item, reason } => ItemResult {
                item,
                outcome: ItemOutcome::Skipped(reason),
            },
            Task::Run(job) => {
                let outcome = match run_job(client, &job, force, confirm).await {
                    Ok(writes) => ItemOutcome::Written(writes),
                    Err(e) => ItemOutcome::Failed {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                };
                ItemResult {
                    item: job.item,
                    outcome,
                }
            }
        };
        on_item(&result);
        results.push(result);
    }
    results
}

/// A batch fails only when it had work and every piece of it failed.
pub fn batch_failed(results: &[ItemResult]) -> bool {
    let attempted: Vec<_> = results
        .iter()
        .filter(|r| !matches!(r.outcome, ItemOutcome::Skipped(_)))
        .collect();
    !attempted.is_empty() && attempted.iter().all(|r| r.is_failure())
}

/// Tracked paths that exist under `root`; missing ones are logged and
/// dropped so a stale store does not produce empty requests.
pub fn existing_files(root: &Path, tracked: &[String]) -> Vec<String> {
    tracked
        .iter()
        .filter(|file| {
            let exists = root.join(file).is_file();
            if !exists {
                tracing::warn!("tracked file {} does not exist, skipping", file);
            }
            exists
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, Provider, Settings};
    use crate::error::Error;
    use crate::providers::create_client;
    use crate::providers::transport::mock::MockTransport;
    use crate::writer::WriteStatus;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn client(provider: Provider, mock: &Arc<MockTransport>, root: &Path) -> ChatClient {
        let settings = Settings {
            model: ModelConfig::for_provider(provider, None).unwrap(),
            api_key: "k".to_string(),
            api_base_url: None,
        };
        create_client(settings, Box::new(mock.clone())).with_root(root)
    }

    fn openai_reply(text: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}]})
    }

    fn no_prompt(path: &str, _: &str, _: &str) -> bool {
        panic!("unexpected prompt for {}", path)
    }

    #[tokio::test]
    async fn test_end_to_end_forced_write() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "print(1)").unwrap();
        let mock = Arc::new(MockTransport::new());
        mock.push_reply(Ok(openai_reply(
            "Updated:\n\nFile: a.py\n```python\nprint(2)\n```\n",
        )));

        let client = client(Provider::OpenAI, &mock, dir.path());
        let job = Job {
            item: "a.py".to_string(),
            instructions: vec!["Do X"],
            prompt_files: vec![PathBuf::from("a.py")],
            final_prompt: "go".to_string(),
        };
        let writes = run_job(&client, &job, true, &mut no_prompt).await.unwrap();

        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].result.as_ref().unwrap(), &WriteStatus::Overwritten);
        assert_eq!(fs::read_to_string(dir.path().join("a.py")).unwrap(), "print(2)");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let messages = requests[0].body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], json!({"role": "system", "content": "Do X"}));
        assert_eq!(
            messages[1],
            json!({"role": "user", "content": "File: a.py\n```\nprint(1)\n```"})
        );
        assert_eq!(messages[2], json!({"role": "user", "content": "go"}));
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        for name in ["a.py", "b.py", "c.py"] {
            fs::write(dir.path().join(name), "x = 0").unwrap();
        }
        let mock = Arc::new(MockTransport::new());
        mock.push_reply(Err(Error::Transport("API error (529): overloaded".into())));
        mock.push_reply(Ok(openai_reply("No code, sorry.")));
        mock.push_reply(Ok(openai_reply("File: c.py\n```\nx = 3\n```")));

        let client = client(Provider::OpenAI, &mock, dir.path());
        let tracked = vec!["a.py".to_string(), "b.py".to_string(), "c.py".to_string()];
        let mut seen = Vec::new();
        let results = run_batch(
            &client,
            plan(Command::Mypy, &tracked),
            true,
            &mut no_prompt,
            |r| seen.push(r.item.clone()),
        )
        .await;

        assert_eq!(seen, tracked);
        assert!(matches!(
            results[0].outcome,
            ItemOutcome::Failed {
                kind: ErrorKind::Transport,
                ..
            }
        ));
        match &results[1].outcome {
            ItemOutcome::Failed { kind, message } => {
                assert_eq!(*kind, ErrorKind::EmptyResponse);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(matches!(results[2].outcome, ItemOutcome::Written(_)));
        assert_eq!(fs::read_to_string(dir.path().join("c.py")).unwrap(), "x = 3");
        assert_eq!(fs::read_to_string(dir.path().join("a.py")).unwrap(), "x = 0");
        assert!(!batch_failed(&results));
    }

    #[tokio::test]
    async fn test_response_format_error_is_recorded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "").unwrap();
        let mock = Arc::new(MockTransport::new());
        mock.push_reply(Ok(json!({"unexpected": true})));

        let client = client(Provider::Anthropic, &mock, dir.path());
        let results = run_batch(
            &client,
            plan(Command::TyperLog, &["a.py".to_string()]),
            false,
            &mut no_prompt,
            |_| {},
        )
        .await;

        assert!(matches!(
            results[0].outcome,
            ItemOutcome::Failed {
                kind: ErrorKind::ResponseFormat,
                ..
            }
        ));
        assert!(batch_failed(&results));
    }

    #[test]
    fn test_plan_unit_test() {
        let tracked = vec!["src/pkg/mod.py".to_string(), "src/pkg/__init__.py".to_string()];
        let tasks = plan(Command::UnitTest, &tracked);

        assert_eq!(tasks.len(), 2);
        match &tasks[0] {
            Task::Run(job) => {
                assert_eq!(
                    job.prompt_files,
                    vec![
                        PathBuf::from("src/pkg/mod.py"),
                        PathBuf::from("tests/pkg/test_mod.py")
                    ]
                );
                assert_eq!(
                    job.instructions,
                    vec![instructions::RESPONSE_FORMAT, instructions::UNIT_TEST]
                );
                assert_eq!(
                    job.final_prompt,
                    r#"Focus only on creating a test for "src/pkg/mod.py""#
                );
            }
            other => panic!("expected a job, got {:?}", other),
        }
        assert!(matches!(&tasks[1], Task::Skip { item, .. } if item == "src/pkg/__init__.py"));
    }

    #[test]
    fn test_plan_mypy_keeps_init() {
        let tasks = plan(Command::Mypy, &["pkg/__init__.py".to_string()]);
        assert!(matches!(&tasks[0], Task::Run(job) if job.prompt_files == vec![PathBuf::from("pkg/__init__.py")]));
    }

    #[test]
    fn test_plan_readme_ignores_tracked() {
        let tasks = plan(Command::Readme, &["a.py".to_string(), "b.py".to_string()]);
        assert_eq!(tasks.len(), 1);
        assert!(matches!(&tasks[0], Task::Run(job) if job.item == "README.md"));
    }

    #[test]
    fn test_batch_failed_rules() {
        let failed = || ItemResult {
            item: "x".into(),
            outcome: ItemOutcome::Failed {
                kind: ErrorKind::Transport,
                message: "m".into(),
            },
        };
        let skipped = || ItemResult {
            item: "y".into(),
            outcome: ItemOutcome::Skipped("s".into()),
        };
        assert!(!batch_failed(&[]));
        assert!(!batch_failed(&[skipped()]));
        assert!(batch_failed(&[failed(), skipped()]));
        assert!(!batch_failed(&[
            failed(),
            ItemResult {
                item: "z".into(),
                outcome: ItemOutcome::Written(vec![]),
            }
        ]));
    }

    #[test]
    fn test_item_with_only_failed_writes_is_failure() {
        let write = |path: &str, result: Result<WriteStatus>| WriteOutcome {
            path: path.into(),
            result,
        };
        let all_failed = ItemResult {
            item: "a.py".into(),
            outcome: ItemOutcome::Written(vec![
                write("a.py", Err(Error::malformed_path("a.py", "resolves outside the repository"))),
                write("b.py", Err(Error::malformed_path("b.py", "resolves outside the repository"))),
            ]),
        };
        assert!(all_failed.is_failure());
        assert!(batch_failed(&[all_failed]));

        let partly_written = ItemResult {
            item: "a.py".into(),
            outcome: ItemOutcome::Written(vec![
                write("a.py", Err(Error::malformed_path("a.py", "x"))),
                write("b.py", Ok(WriteStatus::Created)),
            ]),
        };
        assert!(!partly_written.is_failure());
        assert!(!batch_failed(&[partly_written]));
    }

    #[test]
    fn test_existing_files_filters_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("here.py"), "").unwrap();
        let files = existing_files(dir.path(), &["here.py".to_string(), "gone.py".to_string()]);
        assert_eq!(files, vec!["here.py".to_string()]);
    }
}
