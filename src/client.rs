//! Client-side upload controller.
//!
//! The UI state is a plain [`UploadState`] driven by the pure [`reduce`]
//! function. [`Uploader`] performs the network half of a run through a
//! [`Transport`] and feeds the outcome back through the reducer, so the
//! same transitions apply whether a UI or a test is driving it.

use crate::types::{TargetFormat, FILE_FIELD, FORMAT_FIELD};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Most files a single selection may hold.
pub const MAX_FILES: usize = 10;

/// Extensions the picker accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file in the selection: either an upload or a conversion result.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub mime_type: String,
    pub content: Bytes,
    pub converted: bool,
}

impl FileEntry {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
            converted: false,
        }
    }

    fn from_blob(name: String, blob: ConvertedBlob) -> Self {
        Self {
            name,
            mime_type: blob.mime_type,
            content: blob.content,
            converted: true,
        }
    }

    /// Name up to the first dot.
    pub fn stem(&self) -> &str {
        self.name.split('.').next().unwrap_or("file")
    }

    pub fn is_accepted(&self) -> bool {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ACCEPTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Selecting,
    Converting,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Success,
    Warning,
}

/// Transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    pub files: Vec<FileEntry>,
    pub format: Option<TargetFormat>,
    pub phase: Phase,
    /// Percent complete, 0-100.
    pub progress: u8,
    pub notice: Option<Notice>,
    /// Results of the run in progress; swapped into `files` on success.
    pub pending: Vec<FileEntry>,
}

impl UploadState {
    /// Writes every converted entry as `converted_<index>.<ext>` under `dir`.
    pub async fn save_converted(&self, dir: &Path) -> Result<Vec<PathBuf>, ClientError> {
        let extension = match self.format {
            Some(format) => format.extension(),
            None => return Ok(Vec::new()),
        };

        let mut written = Vec::new();
        for (index, file) in self.files.iter().enumerate().filter(|(_, file)| file.converted) {
            let path = dir.join(format!("converted_{}.{}", index, extension));
            tokio::fs::write(&path, &file.content).await?;
            written.push(path);
        }
        Ok(written)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddFiles(Vec<FileEntry>),
    RemoveFile(usize),
    SelectFormat(TargetFormat),
    StartConversion,
    FileConverted { total: usize, file: FileEntry },
    ConversionFinished,
    ConversionFailed(String),
    Reset,
    DismissNotice,
}

/// `round(100 * completed / total)`, clamped to 100.
pub fn percent_complete(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((100.0 * completed as f64 / total as f64).round() as u64).min(100) as u8
}

pub fn reduce(mut state: UploadState, action: Action) -> UploadState {
    match action {
        Action::AddFiles(files) => {
            if matches!(state.phase, Phase::Converting | Phase::Complete) {
                return state;
            }
            let room = MAX_FILES.saturating_sub(state.files.len());
            let accepted: Vec<FileEntry> =
                files.into_iter().filter(FileEntry::is_accepted).collect();
            if accepted.len() > room {
                state.notice = Some(Notice::new(
                    NoticeLevel::Warning,
                    format!("You can convert up to {} files at once", MAX_FILES),
                ));
            }
            state.files.extend(accepted.into_iter().take(room));
            if !state.files.is_empty() {
                state.phase = Phase::Selecting;
            }
        }
        Action::RemoveFile(index) => {
            if state.phase == Phase::Converting || index >= state.files.len() {
                return state;
            }
            state.files.remove(index);
            state.phase = if state.files.is_empty() {
                Phase::Idle
            } else {
                Phase::Selecting
            };
        }
        Action::SelectFormat(format) => {
            if state.phase != Phase::Converting {
                state.format = Some(format);
            }
        }
        Action::StartConversion => {
            if matches!(state.phase, Phase::Converting | Phase::Complete) {
                return state;
            }
            if state.files.is_empty() {
                state.notice = Some(Notice::new(NoticeLevel::Warning, "Please select a file"));
            } else if state.format.is_none() {
                state.notice = Some(Notice::new(
                    NoticeLevel::Warning,
                    "Please select a target format",
                ));
            } else {
                state.phase = Phase::Converting;
                state.progress = 0;
                state.pending.clear();
            }
        }
        Action::FileConverted { total, file } => {
            if state.phase == Phase::Converting {
                state.pending.push(file);
                state.progress = percent_complete(state.pending.len(), total);
            }
        }
        Action::ConversionFinished => {
            if state.phase == Phase::Converting {
                state.files = std::mem::take(&mut state.pending);
                state.phase = Phase::Complete;
                state.notice = Some(Notice::new(
                    NoticeLevel::Success,
                    "Conversion completed successfully!",
                ));
            }
        }
        Action::ConversionFailed(message) => {
            if state.phase == Phase::Converting {
                // Partial results are dropped; the original selection stays for a retry.
                state.pending.clear();
                state.phase = Phase::Failed;
                state.notice = Some(Notice::new(NoticeLevel::Error, message));
            }
        }
        Action::Reset => return UploadState::default(),
        Action::DismissNotice => state.notice = None,
    }
    state
}

/// Bytes and content type returned by the conversion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedBlob {
    pub mime_type: String,
    pub content: Bytes,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `files` with the `format` token in one request.
    async fn convert(&self, files: &[FileEntry], format: &str)
        -> Result<ConvertedBlob, ClientError>;
}

/// Posts to a running server's `/api/convert`.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/convert", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn convert(
        &self,
        files: &[FileEntry],
        format: &str,
    ) -> Result<ConvertedBlob, ClientError> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.content.to_vec())
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)?;
            form = form.part(FILE_FIELD, part);
        }
        form = form.text(FORMAT_FIELD, format.to_string());

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let content = response.bytes().await?;
        Ok(ConvertedBlob { mime_type, content })
    }
}

pub struct Uploader<T> {
    transport: T,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn convert(&self, state: UploadState) -> UploadState {
        self.convert_with_progress(state, |_| {}).await
    }

    /// Runs one conversion. Raster targets go one file per request, in
    /// order; PDF sends everything in a single request. `on_progress`
    /// sees every progress update.
    pub async fn convert_with_progress<F>(
        &self,
        state: UploadState,
        mut on_progress: F,
    ) -> UploadState
    where
        F: FnMut(u8) + Send,
    {
        let state = reduce(state, Action::StartConversion);
        let format = match (state.phase, state.format) {
            (Phase::Converting, Some(format)) => format,
            _ => return state,
        };
        on_progress(state.progress);

        if format == TargetFormat::Pdf {
            return match self.transport.convert(&state.files, format.extension()).await {
                Ok(blob) => {
                    let name = format!("converted-{}.pdf", chrono::Utc::now().timestamp_millis());
                    let state = reduce(
                        state,
                        Action::FileConverted {
                            total: 1,
                            file: FileEntry::from_blob(name, blob),
                        },
                    );
                    on_progress(state.progress);
                    reduce(state, Action::ConversionFinished)
                }
                Err(e) => {
                    log::warn!("PDF conversion of {} file(s) failed: {}", state.files.len(), e);
                    let message = match e {
                        ClientError::Rejected { body, .. } => {
                            format!("Failed to convert files to PDF: {}", body)
                        }
                        other => format!("Failed to convert files to PDF: {}", other),
                    };
                    reduce(state, Action::ConversionFailed(message))
                }
            };
        }

        let total = state.files.len();
        let mut state = state;
        for index in 0..total {
            let file = state.files[index].clone();
            match self.transport.convert(std::slice::from_ref(&file), format.extension()).await {
                Ok(blob) => {
                    let name = format!("{}.{}", file.stem(), format.extension());
                    state = reduce(
                        state,
                        Action::FileConverted {
                            total,
                            file: FileEntry::from_blob(name, blob),
                        },
                    );
                    on_progress(state.progress);
                }
                Err(e) => {
                    log::warn!("Converting {} to {} failed: {}", file.name, format, e);
                    let message = format!("Failed to convert {}", file.name);
                    return reduce(state, Action::ConversionFailed(message));
                }
            }
        }

        reduce(state, Action::ConversionFinished)
    }
}
