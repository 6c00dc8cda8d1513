use crate::pipeline::{Command, ItemOutcome, ItemResult};
use crate::writer::{WriteOutcome, WriteStatus};
use colored::Colorize;

/// Print one item's result to stderr as soon as it is known.
pub fn report_item(command: Command, result: &ItemResult) {
    match &result.outcome {
        ItemOutcome::Written(writes) => {
            for write in writes {
                report_write(write);
            }
        }
        ItemOutcome::Skipped(reason) => {
            eprintln!(
                "{}",
                format!("⚠️  Skipping {}: {}", result.item, reason).yellow()
            );
        }
        ItemOutcome::Failed { message, .. } => {
            eprintln!(
                "{}",
                format!(
                    "❌ Failed to {} {:?}: {}",
                    command.action(),
                    result.item,
                    message
                )
                .red()
            );
        }
    }
}

fn report_write(write: &WriteOutcome) {
    let line = match &write.result {
        Ok(WriteStatus::Created) => format!("✅ Created {}", write.path).green(),
        Ok(WriteStatus::Overwritten) => format!("✅ Updated {}", write.path).green(),
        Ok(WriteStatus::Unchanged) => format!("   Unchanged {}", write.path).dimmed(),
        Ok(WriteStatus::Skipped) => format!("⚠️  Kept existing {}", write.path).yellow(),
        Err(e) => format!("❌ Could not write {}: {}", write.path, e).red(),
    };
    eprintln!("{}", line);
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub written: usize,
    pub unchanged: usize,
    pub kept: usize,
    pub write_errors: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_results(results: &[ItemResult]) -> Self {
        let mut summary = Summary::default();
        for result in results {
            match &result.outcome {
                ItemOutcome::Written(writes) => {
                    for write in writes {
                        match write.result {
                            Ok(WriteStatus::Created | WriteStatus::Overwritten) => {
                                summary.written += 1
                            }
                            Ok(WriteStatus::Unchanged) => summary.unchanged += 1,
                            Ok(WriteStatus::Skipped) => summary.kept += 1,
                            Err(_) => summary.write_errors += 1,
                        }
                    }
                }
                ItemOutcome::Skipped(_) => summary.skipped += 1,
                ItemOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn print(&self) {
        let text = format!(
            "{} written, {} unchanged, {} kept, {} skipped, {} failed",
            self.written,
            self.unchanged,
            self.kept,
            self.skipped,
            self.failed + self.write_errors
        );
        if self.failed + self.write_errors > 0 {
            eprintln!("{}", text.red().bold());
        } else {
            eprintln!("{}", text.bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};

    #[test]
    fn test_summary_counts() {
        let results = vec![
            ItemResult {
                item: "a.py".into(),
                outcome: ItemOutcome::Written(vec![
                    WriteOutcome {
                        path: "a.py".into(),
                        result: Ok(WriteStatus::Overwritten),
                    },
                    WriteOutcome {
                        path: "tests/test_a.py".into(),
                        result: Ok(WriteStatus::Created),
                    },
                    WriteOutcome {
                        path: "b.py".into(),
                        result: Ok(WriteStatus::Skipped),
                    },
                    WriteOutcome {
                        path: "../c.py".into(),
                        result: Err(Error::malformed_path("../c.py", "'..' component")),
                    },
                ]),
            },
            ItemResult {
                item: "pkg/__init__.py".into(),
                outcome: ItemOutcome::Skipped("__init__.py file".into()),
            },
            ItemResult {
                item: "d.py".into(),
                outcome: ItemOutcome::Failed {
                    kind: ErrorKind::Transport,
                    message: "boom".into(),
                },
            },
        ];

        assert_eq!(
            Summary::from_results(&results),
            Summary {
                written: 2,
                unchanged: 0,
                kept: 1,
                write_errors: 1,
                skipped: 1,
                failed: 1,
            }
        );
    }
}
