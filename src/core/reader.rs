use crate::domain::model::{Chunk, EndpointDescriptor, FieldValue, Record};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_delimiter, validate_file_extension, validate_positive_number};
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "txt", "tsv", "xml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited(u8),
    Xml,
}

/// 讀取失敗的 chunk，保留其序號
#[derive(Debug)]
pub struct FailedChunk {
    pub index: usize,
    pub error: EtlError,
}

pub type ChunkRead = std::result::Result<Chunk, FailedChunk>;

/// 逐 chunk 讀取來源檔，不會一次載入整個檔案
///
/// 解析失敗的列只讓所屬 chunk 失敗，該 chunk 其餘的列照樣讀完以維持後續 chunk 的邊界。
#[derive(Debug, Clone)]
pub struct ChunkedReader {
    path: PathBuf,
    format: SourceFormat,
    chunk_size: usize,
}

impl ChunkedReader {
    pub fn new<P: Into<PathBuf>>(path: P, format: SourceFormat, chunk_size: usize) -> Result<Self> {
        validate_positive_number("chunk_size", chunk_size, 1)?;
        Ok(Self {
            path: path.into(),
            format,
            chunk_size,
        })
    }

    /// 依副檔名選擇讀取方式；csv 預設逗號，txt/tsv 預設 tab
    pub fn for_endpoint(descriptor: &EndpointDescriptor, chunk_size: usize) -> Result<Self> {
        let extension =
            validate_file_extension("file_name", descriptor.identifier(), SUPPORTED_EXTENSIONS)?;

        let format = match extension.as_str() {
            "xml" => SourceFormat::Xml,
            "csv" => SourceFormat::Delimited(validate_delimiter(
                "delimiter",
                descriptor.delimiter().unwrap_or(","),
            )?),
            _ => SourceFormat::Delimited(validate_delimiter(
                "delimiter",
                descriptor.delimiter().unwrap_or("\t"),
            )?),
        };

        Self::new(descriptor.identifier(), format, chunk_size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 在 blocking 執行緒上開檔並讀取標題列，避免佔用 async runtime
    pub async fn open(&self) -> Result<ChunkStream> {
        let reader = self.clone();
        tokio::task::spawn_blocking(move || reader.stream())
            .await
            .map_err(|e| EtlError::IoError(std::io::Error::other(e.to_string())))?
    }

    /// 從頭開始讀取，無法從中途續讀
    pub fn stream(&self) -> Result<ChunkStream> {
        let file = File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::SourceNotFoundError {
                    path: self.path.display().to_string(),
                }
            } else {
                EtlError::IoError(e)
            }
        })?;
        let reader = BufReader::new(file);

        let rows = match self.format {
            SourceFormat::Delimited(delimiter) => RowSource::Delimited(DelimitedRows::new(reader, delimiter)?),
            SourceFormat::Xml => RowSource::Xml(XmlRows::new(reader)),
        };

        tracing::debug!(
            "Opened {} as {:?} with chunk size {}",
            self.path.display(),
            self.format,
            self.chunk_size
        );

        Ok(ChunkStream {
            rows,
            chunk_size: self.chunk_size,
            next_index: 0,
            exhausted: false,
        })
    }
}

struct RowError {
    record: u64,
    reason: String,
    /// 之後的資料無法再讀取
    fatal: bool,
}

type RowResult = std::result::Result<Record, RowError>;

enum RowSource {
    Delimited(DelimitedRows),
    Xml(XmlRows),
}

impl RowSource {
    fn next_row(&mut self) -> Option<RowResult> {
        match self {
            RowSource::Delimited(rows) => rows.next_row(),
            RowSource::Xml(rows) => rows.next_row(),
        }
    }
}

pub struct ChunkStream {
    rows: RowSource,
    chunk_size: usize,
    next_index: usize,
    exhausted: bool,
}

impl Iterator for ChunkStream {
    type Item = ChunkRead;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let index = self.next_index;
        let mut records = Vec::with_capacity(self.chunk_size);
        let mut first_error: Option<RowError> = None;
        let mut rows_read = 0;

        while rows_read < self.chunk_size {
            match self.rows.next_row() {
                Some(Ok(record)) => {
                    rows_read += 1;
                    if first_error.is_none() {
                        records.push(record);
                    }
                }
                Some(Err(err)) => {
                    rows_read += 1;
                    let fatal = err.fatal;
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    if fatal {
                        self.exhausted = true;
                        break;
                    }
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        if rows_read == 0 {
            return None;
        }
        self.next_index += 1;

        match first_error {
            Some(err) => Some(Err(FailedChunk {
                index,
                error: EtlError::MalformedRecordError {
                    chunk_index: index,
                    record: err.record,
                    reason: err.reason,
                },
            })),
            None => Some(Ok(Chunk::new(index, records))),
        }
    }
}

struct DelimitedRows {
    headers: Vec<String>,
    rows: csv::StringRecordsIntoIter<BufReader<File>>,
    ordinal: u64,
}

impl DelimitedRows {
    fn new(reader: BufReader<File>, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| EtlError::MalformedRecordError {
                chunk_index: 0,
                record: 0,
                reason: format!("unreadable header row: {}", e),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Self {
            headers,
            rows: csv_reader.into_records(),
            ordinal: 0,
        })
    }

    fn next_row(&mut self) -> Option<RowResult> {
        let row = self.rows.next()?;
        self.ordinal += 1;

        match row {
            Ok(row) => Some(Ok(self
                .headers
                .iter()
                .zip(row.iter())
                .map(|(name, value)| (name.clone(), FieldValue::from_raw(value)))
                .collect())),
            Err(e) => Some(Err(RowError {
                record: self.ordinal,
                fatal: e.is_io_error(),
                reason: e.to_string(),
            })),
        }
    }
}

/// 根節點底下的每個子元素是一筆記錄，其子元素與屬性是欄位
struct XmlRows {
    reader: quick_xml::Reader<BufReader<File>>,
    depth: usize,
    ordinal: u64,
    finished: bool,
}

impl XmlRows {
    fn new(reader: BufReader<File>) -> Self {
        let mut reader = quick_xml::Reader::from_reader(reader);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            depth: 0,
            ordinal: 0,
            finished: false,
        }
    }

    fn fail(&mut self, reason: String) -> Option<RowResult> {
        self.finished = true;
        Some(Err(RowError {
            record: self.ordinal + 1,
            reason,
            fatal: true,
        }))
    }

    fn next_row(&mut self) -> Option<RowResult> {
        if self.finished {
            return None;
        }

        let mut buf = Vec::new();
        let mut current: Option<Record> = None;
        let mut field: Option<(String, String)> = None;

        loop {
            buf.clear();
            let position = self.reader.buffer_position();
            let event = match self.reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => return self.fail(format!("invalid XML near byte {}: {}", position, e)),
            };

            match event {
                Event::Start(start) => {
                    self.depth += 1;
                    match self.depth {
                        2 => match record_from_attributes(&start) {
                            Ok(record) => current = Some(record),
                            Err(reason) => return self.fail(reason),
                        },
                        3 => field = Some((element_name(&start), String::new())),
                        _ => {}
                    }
                }
                Event::Empty(empty) => match self.depth + 1 {
                    2 => {
                        return match record_from_attributes(&empty) {
                            Ok(record) => {
                                self.ordinal += 1;
                                Some(Ok(record))
                            }
                            Err(reason) => self.fail(reason),
                        };
                    }
                    3 => {
                        if let Some(record) = current.as_mut() {
                            record.insert(&element_name(&empty), FieldValue::Null);
                        }
                    }
                    _ => {}
                },
                Event::Text(text) => {
                    if let (3, Some((_, value))) = (self.depth, field.as_mut()) {
                        match text.unescape() {
                            Ok(text) => value.push_str(&text),
                            Err(e) => return self.fail(format!("invalid XML text: {}", e)),
                        }
                    }
                }
                Event::CData(data) => {
                    if let (3, Some((_, value))) = (self.depth, field.as_mut()) {
                        value.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    let closing = self.depth;
                    self.depth = self.depth.saturating_sub(1);
                    match closing {
                        3 => {
                            if let (Some(record), Some((name, value))) = (current.as_mut(), field.take()) {
                                record.insert(&name, FieldValue::from_raw(value.trim()));
                            }
                        }
                        2 => {
                            if let Some(record) = current.take() {
                                self.ordinal += 1;
                                return Some(Ok(record));
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    if self.depth > 1 {
                        return self.fail("unexpected end of document".to_string());
                    }
                    return None;
                }
                _ => {}
            }
        }
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn record_from_attributes(start: &BytesStart<'_>) -> std::result::Result<Record, String> {
    let mut record = Record::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| format!("invalid XML attribute: {}", e))?;
        let name = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| format!("invalid XML attribute value: {}", e))?;
        record.insert(&name, FieldValue::from_raw(&value));
    }
    Ok(record)
}
