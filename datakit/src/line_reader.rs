//! Line-oriented file reading with progress reporting.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::memory::memory_usage;
use crate::output_streams::{OutputStreams, OutputStreamsConfig, OutputStreamsError};

#[derive(Debug, Error)]
pub enum LineReaderError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Output(#[from] OutputStreamsError),
    #[error("File {name} was rejected: {reason:#}")]
    Rejected { name: String, reason: anyhow::Error },
}

pub type LineReaderResult<T> = Result<T, LineReaderError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Log the line count and duration once a file is read.
    #[serde(skip_serializing_if = "common::serde::is_false")]
    pub info_on_end: bool,
    /// Log progress every this many lines.
    pub info_on_row: Option<usize>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LineReaderError + '_ {
    move |source| LineReaderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Pulls lines from a file one at a time.
pub struct LineReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    options: ReadOptions,
    count: usize,
    finished: bool,
    started: Instant,
    last_report: Instant,
}

impl LineReader {
    pub async fn open(path: impl AsRef<Path>, options: ReadOptions) -> LineReaderResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(io_error(path))?;
        debug!("Reading lines from {}", path.display());

        let now = Instant::now();
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            options,
            count: 0,
            finished: false,
            started: now,
            last_report: now,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines returned so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Next line without its terminator, or `None` at the end of the file.
    pub async fn next_line(&mut self) -> LineReaderResult<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        let line = self
            .lines
            .next_line()
            .await
            .map_err(io_error(&self.path))?;

        match line {
            Some(line) => {
                self.report_progress();
                self.count += 1;
                Ok(Some(line))
            }
            None => {
                self.finished = true;
                self.report_end();
                Ok(None)
            }
        }
    }

    fn report_progress(&mut self) {
        let Some(every) = self.options.info_on_row else {
            return;
        };
        if every == 0 || self.count == 0 || self.count % every != 0 {
            return;
        }

        info!(
            "Read {} line(s), memory: {}, time: {} ms",
            self.count,
            memory_usage(),
            self.last_report.elapsed().as_millis()
        );
        self.last_report = Instant::now();
    }

    fn report_end(&self) {
        if self.options.info_on_end {
            info!(
                "Finished reading {}: {} line(s) in {} ms",
                self.path.display(),
                self.count,
                self.started.elapsed().as_millis()
            );
        }
    }
}

/// Calls `on_line(line, index)` for every line of a file and returns the
/// number of lines.
pub async fn read_file<F>(
    path: impl AsRef<Path>,
    mut on_line: F,
    options: ReadOptions,
) -> LineReaderResult<usize>
where
    F: FnMut(&str, usize),
{
    let mut reader = LineReader::open(path, options).await?;
    while let Some(line) = reader.next_line().await? {
        on_line(&line, reader.count() - 1);
    }
    Ok(reader.count())
}

/// Splits `<base>.<ext>` into files under the `<base>/` directory.
///
/// `to_file(line, index)` names the target file for each line, which is
/// appended with a trailing newline to `<base>/<name>.<ext>`; `None` skips the
/// line. Names that are empty, `.`, `..` or contain a path separator would
/// leave `<base>/`, so their lines are skipped with a warning. Returns the
/// number of lines read.
pub async fn split_file<F>(
    base: impl AsRef<Path>,
    ext: &str,
    mut to_file: F,
    options: ReadOptions,
    output: OutputStreamsConfig,
) -> LineReaderResult<usize>
where
    F: FnMut(&str, usize) -> Option<String>,
{
    let base = base.as_ref();
    let source = with_extension_appended(base, ext);

    tokio::fs::create_dir_all(base)
        .await
        .map_err(io_error(base))?;

    let mut streams = OutputStreams::new(output);
    let copied = async {
        let mut reader = LineReader::open(&source, options).await?;
        while let Some(line) = reader.next_line().await? {
            let index = reader.count() - 1;
            let Some(name) = to_file(&line, index) else {
                continue;
            };
            if !is_plain_file_name(&name) {
                warn!(
                    "Skipping line {index} of {}: bad target name {name:?}",
                    source.display()
                );
                continue;
            }

            let target = base.join(format!("{name}.{ext}"));
            streams.write_to(target, format!("{line}\n")).await?;
        }
        Ok::<_, LineReaderError>(reader.count())
    }
    .await;

    let files = streams.len();
    let closed = streams.close_all().await;
    let count = copied?;
    closed?;

    debug!("Split {} into {files} file(s)", source.display());
    Ok(count)
}

/// Reads every `*.<ext>` file of a directory in name order.
///
/// `on_each_file(name)` is called with the file name minus its extension
/// before the file is read and may reject it, which aborts the whole run.
/// `on_each_line(name, line, index)` is called for every line. Returns the
/// total number of lines read.
pub async fn read_files<FF, FL>(
    dir: impl AsRef<Path>,
    ext: &str,
    mut on_each_file: FF,
    mut on_each_line: FL,
    options: ReadOptions,
) -> LineReaderResult<usize>
where
    FF: FnMut(&str) -> anyhow::Result<()>,
    FL: FnMut(&str, &str, usize),
{
    let dir = dir.as_ref();
    let suffix = format!(".{ext}");

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error(dir))?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error(dir))? {
        let file_type = entry.file_type().await.map_err(io_error(&entry.path()))?;
        if !file_type.is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some(name) = file_name.strip_suffix(&suffix) {
            names.push(name.to_string());
        }
    }
    names.sort();

    let mut total = 0;
    for name in names {
        on_each_file(&name).map_err(|reason| LineReaderError::Rejected {
            name: name.clone(),
            reason,
        })?;

        let path = dir.join(format!("{name}{suffix}"));
        total += read_file(
            &path,
            |line, index| on_each_line(&name, line, index),
            options,
        )
        .await?;
    }

    Ok(total)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

fn with_extension_appended(base: &Path, ext: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use common::test_utils::fresh_test_dir;

    use super::*;

    async fn write(path: &Path, contents: &str) {
        tokio::fs::write(path, contents).await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_lines_with_indices() {
        let dir = fresh_test_dir("line_reader_read_file");
        let path = dir.join("lines.txt");
        write(&path, "first\r\nsecond\nthird\n").await;

        let mut seen = Vec::new();
        let count = read_file(
            &path,
            |line, index| seen.push((line.to_string(), index)),
            ReadOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            seen,
            vec![
                ("first".to_string(), 0),
                ("second".to_string(), 1),
                ("third".to_string(), 2)
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_file_and_missing_trailing_newline() {
        let dir = fresh_test_dir("line_reader_edges");
        let empty = dir.join("empty.txt");
        let unterminated = dir.join("unterminated.txt");
        write(&empty, "").await;
        write(&unterminated, "a\nb").await;

        let options = ReadOptions {
            info_on_end: true,
            info_on_row: Some(1),
        };
        assert_eq!(read_file(&empty, |_, _| {}, options).await.unwrap(), 0);
        assert_eq!(read_file(&unterminated, |_, _| {}, options).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reader_stays_finished() {
        let dir = fresh_test_dir("line_reader_finished");
        let path = dir.join("one.txt");
        write(&path, "only\n").await;

        let mut reader = LineReader::open(&path, ReadOptions::default()).await.unwrap();
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("only"));
        assert_eq!(reader.next_line().await.unwrap(), None);
        assert_eq!(reader.next_line().await.unwrap(), None);
        assert_eq!(reader.count(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_reports_its_path() {
        let dir = fresh_test_dir("line_reader_missing");
        let path = dir.join("absent.txt");

        match read_file(&path, |_, _| {}, ReadOptions::default()).await {
            Err(LineReaderError::Io { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_split_file_routes_lines_by_name() {
        let dir = fresh_test_dir("line_reader_split");
        let base = dir.join("people");
        write(
            &dir.join("people.csv"),
            "name,city\nann,oslo\nbob,rome\ncid,oslo\n",
        )
        .await;

        let count = split_file(
            &base,
            "csv",
            |line, index| {
                (index > 0).then(|| line.split(',').nth(1).unwrap_or_default().to_string())
            },
            ReadOptions::default(),
            OutputStreamsConfig { max_chunks: 1 },
        )
        .await
        .unwrap();

        assert_eq!(count, 4);
        let oslo = tokio::fs::read_to_string(base.join("oslo.csv")).await.unwrap();
        let rome = tokio::fs::read_to_string(base.join("rome.csv")).await.unwrap();
        assert_eq!(oslo, "ann,oslo\ncid,oslo\n");
        assert_eq!(rome, "bob,rome\n");
        assert!(!base.join("city.csv").exists());
    }

    #[tokio::test]
    async fn test_split_file_skips_names_that_leave_the_directory() {
        let dir = fresh_test_dir("line_reader_split_escape");
        let base = dir.join("nested").join("rows");
        tokio::fs::create_dir_all(dir.join("nested")).await.unwrap();
        write(
            &dir.join("nested").join("rows.csv"),
            "ok,1\n../../escaped,2\nsub/dir,3\n..,4\n,5\nok,6\n",
        )
        .await;

        let count = split_file(
            &base,
            "csv",
            |line, _| line.split(',').next().map(str::to_string),
            ReadOptions::default(),
            OutputStreamsConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(count, 6);
        let ok = tokio::fs::read_to_string(base.join("ok.csv")).await.unwrap();
        assert_eq!(ok, "ok,1\nok,6\n");
        assert!(!dir.join("escaped.csv").exists());
        assert!(!base.join("sub").exists());

        let mut written = Vec::new();
        let mut entries = tokio::fs::read_dir(&base).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            written.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(written, vec!["ok.csv"]);
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("oslo"));
        assert!(is_plain_file_name("north, east"));
        assert!(is_plain_file_name("v1.2"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("."));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../x"));
        assert!(!is_plain_file_name("a/b"));
        assert!(!is_plain_file_name("a\\b"));
    }

    #[tokio::test]
    async fn test_read_files_in_name_order() {
        let dir = fresh_test_dir("line_reader_read_files");
        write(&dir.join("b.log"), "b1\nb2\n").await;
        write(&dir.join("a.log"), "a1\n").await;
        write(&dir.join("c.txt"), "ignored\n").await;
        tokio::fs::create_dir(dir.join("nested.log")).await.unwrap();

        let mut files = Vec::new();
        let mut lines = Vec::new();
        let total = read_files(
            &dir,
            "log",
            |name| {
                files.push(name.to_string());
                Ok(())
            },
            |name, line, index| lines.push(format!("{name}:{index}:{line}")),
            ReadOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(total, 3);
        assert_eq!(files, vec!["a", "b"]);
        assert_eq!(lines, vec!["a:0:a1", "b:0:b1", "b:1:b2"]);
    }

    #[tokio::test]
    async fn test_rejected_file_aborts_reading() {
        let dir = fresh_test_dir("line_reader_rejected");
        write(&dir.join("a.log"), "a1\n").await;
        write(&dir.join("b.log"), "b1\n").await;

        let mut lines = Vec::new();
        let result = read_files(
            &dir,
            "log",
            |name| {
                if name == "b" {
                    anyhow::bail!("not today");
                }
                Ok(())
            },
            |_, line, _| lines.push(line.to_string()),
            ReadOptions::default(),
        )
        .await;

        match result {
            Err(LineReaderError::Rejected { name, reason }) => {
                assert_eq!(name, "b");
                assert_eq!(reason.to_string(), "not today");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(lines, vec!["a1"]);
    }
}
