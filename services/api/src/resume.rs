use anyhow::{Context, Result};

/// Resume text beyond this many characters is not sent to the model.
pub const MAX_RESUME_CHARS: usize = 6000;

/// Extracts the plain text of a PDF, truncated to [`MAX_RESUME_CHARS`].
pub fn extract_text(pdf: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(pdf).context("Failed to read PDF")?;
    Ok(truncate_chars(text.trim(), MAX_RESUME_CHARS))
}

/// Keeps at most `max` characters, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
