pub mod collect;
pub mod commands;
pub mod config;
pub mod csv_line;
pub mod line_reader;
pub mod memory;
pub mod multi_key;
pub mod output_streams;
pub mod prompt;
pub mod scheduler;

pub use config::{Config, ConfigSource};
pub use csv_line::{parse_line, stringify_line, CsvFormat};
pub use line_reader::{
    read_file, read_files, split_file, LineReader, LineReaderError, ReadOptions,
};
pub use multi_key::{MultiKeyError, MultiKeyObject};
pub use output_streams::{OutputStreams, OutputStreamsConfig, OutputStreamsError};
pub use prompt::{Prompt, PromptError, PromptOutcome};
pub use scheduler::{
    run_limited, run_limited_collect, sync_task, try_run_limited, FailurePolicy, Scheduler,
    SchedulerConfig,
};
