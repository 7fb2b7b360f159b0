//! Error types for the embedding service.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("config error: {0}")]
    Config(String),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned status {status}: {snippet}")]
    HttpStatus { status: u16, snippet: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("vector size mismatch: got={got}, want={want}")]
    VectorSizeMismatch { got: usize, want: usize },
}

/// Shortens a response body to a single-line snippet safe for logs and
/// error messages.
pub(crate) fn make_snippet(body: &str) -> String {
    const MAX: usize = 200;
    let line = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.len() <= MAX {
        line
    } else {
        let cut = line
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &line[..cut])
    }
}
