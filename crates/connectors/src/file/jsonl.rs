use crate::{cdc::stream::CdcRecordSender, error::SourceError};
use model::records::record::InputRecord;
use std::path::{Path, PathBuf};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Replays change records from a JSON-lines file, one `InputRecord` per line.
pub struct JsonlRecordReader {
    path: PathBuf,
    lines: tokio::io::Lines<BufReader<File>>,
}

impl JsonlRecordReader {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        Ok(JsonlRecordReader {
            path,
            lines: BufReader::new(file).lines(),
        })
    }

    /// Feeds every record into `sender` until the file ends, the consumer goes
    /// away or `cancel` fires. Returns the number of records sent.
    pub async fn pump(
        mut self,
        sender: CdcRecordSender,
        cancel: CancellationToken,
    ) -> Result<u64, SourceError> {
        let mut sent = 0u64;
        let mut line_no = 0usize;

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(path = %self.path.display(), sent, "Reader cancelled");
                    break;
                }
                line = self.lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            line_no += 1;

            if line.trim().is_empty() {
                continue;
            }
            let record: InputRecord =
                serde_json::from_str(&line).map_err(|e| SourceError::InvalidRecord {
                    line: line_no,
                    message: e.to_string(),
                })?;

            match sender.send(record).await {
                Ok(()) => sent += 1,
                Err(SourceError::Closed) => {
                    debug!(path = %self.path.display(), sent, "Consumer stopped reading");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        info!(path = %self.path.display(), records = sent, "Finished reading change records");
        Ok(sent)
    }
}
