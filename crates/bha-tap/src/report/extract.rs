//! Report archive download and line streaming
//!
//! The archive holds a single CSV entry laid out as:
//!
//! ```text
//! "Report Name: Performance"          <- banner, skipped
//! "Report Time: 1/1/2024-1/31/2024"   <- banner, skipped
//! "Time Zone: UTC"                    <- banner, skipped
//! "HotelId","Clicks","Impressions"    <- header
//! "42","1,000","5"                    <- rows...
//! ```

use csv::{ReaderBuilder, StringRecordsIter};
use std::io::{BufRead, BufReader, Cursor, Read};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::auth::Session;
use crate::error::{Result, TapError};

/// Fixed metadata lines preceding the header
pub const BANNER_LINES: usize = 3;

/// Download the archive at the pre-signed `url`.
///
/// Fails with [`TapError::Download`] on a non-success status.
pub async fn download_report(session: &Session, url: &str) -> Result<ReportArchive> {
    info!("Downloading report archive");

    let response = session
        .get_unauthenticated(url)
        .await
        .map_err(|e| match e {
            TapError::Http(e) => TapError::download(e.to_string()),
            other => other,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TapError::download(format!("server returned {status}")));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| TapError::download(format!("body read failed: {e}")))?;

    debug!(bytes = bytes.len(), "Report archive downloaded");
    ReportArchive::from_bytes(bytes.to_vec())
}

/// A downloaded report archive
pub struct ReportArchive {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ReportArchive {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data))?;
        if archive.len() == 0 {
            return Err(TapError::Archive("archive has no entries".to_string()));
        }
        if archive.len() > 1 {
            debug!(entries = archive.len(), "Archive has extra entries, reading the first");
        }
        Ok(Self { archive })
    }

    /// Open the report entry as a line stream positioned after the header
    pub fn open(&mut self) -> Result<ReportStream<impl Read + '_>> {
        let entry = self.archive.by_index(0)?;
        debug!(entry = entry.name(), size = entry.size(), "Opening report entry");
        ReportStream::new(entry)
    }
}

/// Forward-only CSV row stream over a report entry
pub struct ReportStream<R: Read> {
    headers: Vec<String>,
    reader: csv::Reader<BufReader<R>>,
}

impl<R: Read> ReportStream<R> {
    /// Skip the banner, read the header and leave the reader on the first row
    pub fn new(source: R) -> Result<Self> {
        let mut buffered = BufReader::new(source);

        let mut line = Vec::new();
        for index in 0..BANNER_LINES {
            line.clear();
            if buffered.read_until(b'\n', &mut line)? == 0 {
                return Err(TapError::Archive(format!(
                    "report ended after {index} of {BANNER_LINES} banner lines"
                )));
            }
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(buffered);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(String::is_empty) {
            return Err(TapError::Archive("report has no header line".to_string()));
        }

        Ok(Self { headers, reader })
    }

    /// Raw column names from the header line
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Remaining data rows; blank lines are skipped
    pub fn rows(&mut self) -> StringRecordsIter<'_, BufReader<R>> {
        self.reader.records()
    }
}
