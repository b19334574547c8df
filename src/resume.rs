use crate::error::{AppError, Result};

const PDF: &str = "application/pdf";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    Pdf,
    PlainText,
}

/// Works out the format from the declared content type, falling back to the file extension.
pub fn detect_format(content_type: Option<&str>, file_name: Option<&str>) -> Result<ResumeFormat> {
    let content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match (content_type.as_deref(), extension.as_deref()) {
        (Some(PDF), _) | (_, Some("pdf")) => Ok(ResumeFormat::Pdf),
        (Some("text/plain"), _) | (_, Some("txt")) => Ok(ResumeFormat::PlainText),
        (Some(DOCX), _) | (_, Some("docx")) => Err(AppError::UnsupportedMedia(
            "Word documents are not supported; upload a PDF or plain text file".to_string(),
        )),
        (ct, _) => Err(AppError::UnsupportedMedia(
            ct.unwrap_or("unknown").to_string(),
        )),
    }
}

pub fn extract_text(format: ResumeFormat, bytes: &[u8]) -> Result<String> {
    match format {
        ResumeFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| AppError::ParseError(format!("Could not read PDF: {}", e))),
        ResumeFormat::PlainText => String::from_utf8(bytes.to_vec())
            .map_err(|e| AppError::ParseError(format!("Resume is not valid UTF-8: {}", e))),
    }
}

/// Runs extraction on the blocking pool; PDF parsing is CPU-bound and a panic
/// inside the parser is reported as an unreadable file.
pub async fn read_resume(format: ResumeFormat, bytes: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || extract_text(format, &bytes))
        .await
        .map_err(|e| AppError::ParseError(format!("Could not read resume: {}", e)))?
}
