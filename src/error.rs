use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LyricError {
    #[error("Invalid player config: {0}")]
    Config(String),

    #[error("Invalid lyric source: {0}")]
    Source(String),

    #[error("Cannot access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
