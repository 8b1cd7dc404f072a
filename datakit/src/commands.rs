//! Commands offered by the `datakit` binary.

use std::path::PathBuf;

use anyhow::{bail, Context};
use log::debug;

use crate::config::Config;
use crate::csv_line::parse_line;
use crate::line_reader::{read_file, read_files, split_file};
use crate::prompt::Prompt;
use crate::scheduler::Scheduler;

pub fn prompt(config: &Config) -> Prompt {
    let split_config = config.clone();
    let count_config = config.clone();
    let count_files_config = config.clone();

    Prompt::new()
        .command(
            "split",
            "split <base> <ext> <column>: split <base>.<ext> into <base>/<value>.<ext> by a CSV column",
            move |args| split(args, split_config.clone()),
        )
        .command(
            "count",
            "count <dir> <ext>: count the lines of every <ext> file in a directory",
            move |args| count(args, count_config.clone()),
        )
        .command(
            "count-files",
            "count-files <ext> <file>...: count the lines of several files concurrently",
            move |args| count_files(args, count_files_config.clone()),
        )
}

pub async fn split(args: Vec<String>, config: Config) -> anyhow::Result<String> {
    let [base, ext, column] = args.as_slice() else {
        bail!("usage: split <base> <ext> <column>");
    };
    let column: usize = column
        .parse()
        .with_context(|| format!("Invalid column index {column}"))?;

    let count = split_file(
        base,
        ext,
        |line, _| parse_line(line).into_iter().nth(column),
        config.read,
        config.output,
    )
    .await?;

    Ok(format!("Split {count} line(s) of {base}.{ext} into {base}/"))
}

pub async fn count(args: Vec<String>, config: Config) -> anyhow::Result<String> {
    let [dir, ext] = args.as_slice() else {
        bail!("usage: count <dir> <ext>");
    };

    let mut files = 0;
    let total = read_files(
        dir,
        ext,
        |name| {
            debug!("Counting lines of {name}");
            files += 1;
            Ok(())
        },
        |_, _, _| {},
        config.read,
    )
    .await?;

    Ok(format!("Read {total} line(s) from {files} file(s) in {dir}"))
}

/// Counts lines of `<file>.<ext>` for every file argument through the
/// scheduler, so the configured concurrency and failure policy apply.
pub async fn count_files(args: Vec<String>, config: Config) -> anyhow::Result<String> {
    let [ext, files @ ..] = args.as_slice() else {
        bail!("usage: count-files <ext> <file>...");
    };
    if files.is_empty() {
        bail!("usage: count-files <ext> <file>...");
    }

    let paths: Vec<PathBuf> = files
        .iter()
        .map(|file| PathBuf::from(format!("{file}.{ext}")))
        .collect();
    let read = config.read;

    let results = Scheduler::new(
        paths.clone(),
        config.scheduler,
        |path: PathBuf, _: usize| async move { read_file(&path, |_, _| {}, read).await },
    )
    .run()
    .await?;

    let mut total = 0;
    let mut lines = Vec::with_capacity(paths.len());
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(count) => {
                total += count;
                lines.push(format!("{}: {count}", path.display()));
            }
            Err(err) => lines.push(format!("{}: failed: {err}", path.display())),
        }
    }
    lines.push(format!("total: {total}"));

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use common::test_utils::fresh_test_dir;

    use super::*;
    use crate::prompt::PromptOutcome;
    use crate::scheduler::{FailurePolicy, SchedulerConfig};

    fn arg(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn test_split_by_column() {
        let dir = fresh_test_dir("commands_split");
        let base = dir.join("sales");
        std::fs::write(dir.join("sales.csv"), "1,\"north, east\"\n2,south\n3,south\n").unwrap();

        let message = split(vec![arg(&base), "csv".into(), "1".into()], Config::default())
            .await
            .unwrap();

        assert!(message.starts_with("Split 3 line(s)"));
        assert_eq!(
            std::fs::read_to_string(base.join("south.csv")).unwrap(),
            "2,south\n3,south\n"
        );
        assert_eq!(
            std::fs::read_to_string(base.join("north, east.csv")).unwrap(),
            "1,\"north, east\"\n"
        );
    }

    #[tokio::test]
    async fn test_split_rejects_bad_arguments() {
        assert!(split(args(&["only"]), Config::default()).await.is_err());
        let err = split(args(&["base", "csv", "first"]), Config::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid column index first"));
    }

    #[tokio::test]
    async fn test_count_lines_in_directory() {
        let dir = fresh_test_dir("commands_count");
        std::fs::write(dir.join("a.log"), "1\n2\n").unwrap();
        std::fs::write(dir.join("b.log"), "3\n").unwrap();
        std::fs::write(dir.join("c.txt"), "4\n").unwrap();

        let message = count(vec![arg(&dir), "log".into()], Config::default())
            .await
            .unwrap();
        assert_eq!(message, format!("Read 3 line(s) from 2 file(s) in {}", dir.display()));
    }

    #[tokio::test]
    async fn test_count_files_honours_the_failure_policy() {
        let dir = fresh_test_dir("commands_count_files");
        std::fs::write(dir.join("a.txt"), "1\n2\n").unwrap();
        std::fs::write(dir.join("b.txt"), "3\n").unwrap();
        let a = arg(&dir.join("a"));
        let b = arg(&dir.join("b"));
        let missing = arg(&dir.join("missing"));

        let mut config = Config::default();
        config.scheduler = SchedulerConfig::new(2, FailurePolicy::FailFast);
        let message = count_files(vec!["txt".into(), a.clone(), b.clone()], config.clone())
            .await
            .unwrap();
        assert_eq!(message, format!("{a}.txt: 2\n{b}.txt: 1\ntotal: 3"));

        assert!(
            count_files(vec!["txt".into(), a.clone(), missing.clone()], config.clone())
                .await
                .is_err()
        );

        config.scheduler.policy = FailurePolicy::CollectErrors;
        let message = count_files(vec!["txt".into(), a.clone(), missing.clone()], config)
            .await
            .unwrap();
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines[0], format!("{a}.txt: 2"));
        assert!(lines[1].starts_with(&format!("{missing}.txt: failed:")));
        assert_eq!(lines[2], "total: 2");
    }

    #[tokio::test]
    async fn test_count_files_needs_files() {
        assert!(count_files(args(&["txt"]), Config::default()).await.is_err());
        assert!(count_files(Vec::new(), Config::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_prompt_dispatches_to_commands() {
        let dir = fresh_test_dir("commands_prompt");
        std::fs::write(dir.join("only.log"), "x\ny\n").unwrap();

        let prompt = prompt(&Config::default());
        let menu = prompt.menu();
        for name in ["split - ", "count - ", "count-files - "] {
            assert!(menu.contains(name), "menu lacks {name}");
        }

        let input = format!("count {} log\n", dir.display());
        let mut output: Vec<u8> = Vec::new();
        let outcome = prompt.run(input.as_bytes(), &mut output).await.unwrap();

        assert_eq!(
            outcome,
            PromptOutcome::Completed(format!("Read 2 line(s) from 1 file(s) in {}", dir.display()))
        );
    }
}
