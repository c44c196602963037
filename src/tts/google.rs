//! Google Translate speech endpoint, the same one gTTS uses.
//!
//! The endpoint refuses long input, so text is cut into chunks of at most
//! [`MAX_CHUNK_CHARS`] characters, each chunk is fetched separately and the
//! MP3 segments are concatenated in order.  MP3 frames are self-delimiting,
//! so the concatenation plays back as one stream.
//!
//! ```text
//! "first sentence. second sentence, …"
//!        │ split_text (punctuation, then whitespace, then hard cut)
//!        ▼
//! [chunk 0] [chunk 1] … ──GET translate_tts?q=…&idx=i&total=n──▶ mp3 bytes
//!                                                                  │
//!                                               concatenate ◀──────┘
//! ```

use async_trait::async_trait;

use crate::config::TtsConfig;
use crate::http_util::{api_error_message, join_url};
use crate::tts::engine::{SynthesizedAudio, Synthesizer, TtsError};

/// Longest chunk the endpoint accepts, in characters.
pub const MAX_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Sentence and clause boundaries, Latin and Arabic.
const BREAKS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '\n', '،', '؛', '؟', '…', '¿', '¡', '(', ')', '[', ']', '—',
];

// ---------------------------------------------------------------------------
// Text chunking
// ---------------------------------------------------------------------------

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Cuts at punctuation first, then at whitespace; a single word longer than
/// the limit is cut mid-word.  Adjacent short pieces are joined back
/// together with a space while they fit.  Pieces with no letters or digits
/// are dropped.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if BREAKS.contains(&ch) {
            push_piece(&mut pieces, &current, max_chars);
            current.clear();
        }
    }
    push_piece(&mut pieces, &current, max_chars);

    merge_pieces(pieces, max_chars)
}

fn push_piece(out: &mut Vec<String>, piece: &str, max_chars: usize) {
    let piece = piece.trim();
    if !piece.chars().any(char::is_alphanumeric) {
        return;
    }
    if piece.chars().count() <= max_chars {
        out.push(piece.to_string());
        return;
    }

    let mut line = String::new();
    let mut line_len = 0;
    for word in piece.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !line.is_empty() {
                out.push(std::mem::take(&mut line));
                line_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            out.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let needed = if line.is_empty() { word_len } else { line_len + 1 + word_len };
        if needed > max_chars {
            out.push(std::mem::take(&mut line));
            line.push_str(word);
            line_len = word_len;
        } else {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
            line_len = needed;
        }
    }
    if !line.is_empty() {
        out.push(line);
    }
}

fn merge_pieces(pieces: Vec<String>, max_chars: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let fits = match merged.last() {
            Some(last) => last.chars().count() + 1 + piece.chars().count() <= max_chars,
            None => false,
        };
        match merged.last_mut() {
            Some(last) if fits => {
                last.push(' ');
                last.push_str(&piece);
            }
            _ => merged.push(piece),
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// GoogleTranslateTts
// ---------------------------------------------------------------------------

/// Keyless MP3 synthesis through `{google_base_url}/translate_tts`.
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    base_url: String,
    default_language: String,
}

impl GoogleTranslateTts {
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.google_base_url.clone(),
            default_language: config.language.clone(),
        }
    }

    /// URL for chunk `idx` of `total`.
    pub fn chunk_url(
        &self,
        chunk: &str,
        language: &str,
        idx: usize,
        total: usize,
    ) -> Result<reqwest::Url, TtsError> {
        let mut url = reqwest::Url::parse(&join_url(&self.base_url, "translate_tts"))
            .map_err(|e| TtsError::Request(format!("invalid speech URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("ie", "UTF-8")
            .append_pair("q", chunk)
            .append_pair("tl", language)
            .append_pair("client", "tw-ob")
            .append_pair("ttsspeed", "1")
            .append_pair("total", &total.to_string())
            .append_pair("idx", &idx.to_string())
            .append_pair("textlen", &chunk.chars().count().to_string());
        Ok(url)
    }

    fn language_for<'a>(&'a self, requested: &'a str) -> &'a str {
        match requested {
            "" | "auto" if self.default_language.is_empty() || self.default_language == "auto" => "en",
            "" | "auto" => &self.default_language,
            other => other,
        }
    }

    async fn fetch_chunk(&self, url: reqwest::Url) -> Result<bytes::Bytes, TtsError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, "http://translate.google.com/")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl Synthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedAudio, TtsError> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(TtsError::EmptyText);
        }
        let language = self.language_for(language);
        let total = chunks.len();
        log::debug!("tts: {total} chunk(s) for {} chars ({language})", text.chars().count());

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, language, idx, total)?;
            let segment = self.fetch_chunk(url).await?;
            audio.extend_from_slice(&segment);
        }

        if audio.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        Ok(SynthesizedAudio::new(audio, "audio/mpeg"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tts() -> GoogleTranslateTts {
        GoogleTranslateTts::from_config(&TtsConfig::default())
    }

    #[test]
    fn short_sentences_are_merged_into_one_chunk() {
        let chunks = split_text("مرحبا. كيف حالك؟", MAX_CHUNK_CHARS);
        assert_eq!(chunks, vec!["مرحبا. كيف حالك؟".to_string()]);
    }

    #[test]
    fn long_text_splits_on_whitespace_within_limit() {
        let text = "word ".repeat(60);
        let chunks = split_text(&text, MAX_CHUNK_CHARS);

        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_CHUNK_CHARS);
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert_eq!(words, 60);
    }

    #[test]
    fn overlong_word_is_cut_mid_word() {
        let word = "ب".repeat(250);
        let chunks = split_text(&word, MAX_CHUNK_CHARS);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![100, 100, 50]);
    }

    #[test]
    fn punctuation_only_text_yields_nothing() {
        assert!(split_text(" ... ?! ، ", MAX_CHUNK_CHARS).is_empty());
        assert!(split_text("", MAX_CHUNK_CHARS).is_empty());
    }

    #[test]
    fn sentences_that_do_not_fit_together_stay_apart() {
        let a = format!("{}.", "a".repeat(60));
        let b = format!("{}.", "b".repeat(60));
        let chunks = split_text(&format!("{a} {b}"), MAX_CHUNK_CHARS);
        assert_eq!(chunks, vec![a, b]);
    }

    #[test]
    fn chunk_url_carries_gtts_parameters() {
        let url = tts().chunk_url("أهلا بك", "ar", 0, 2).unwrap();
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/translate_tts");
        assert_eq!(pairs["q"], "أهلا بك");
        assert_eq!(pairs["tl"], "ar");
        assert_eq!(pairs["client"], "tw-ob");
        assert_eq!(pairs["total"], "2");
        assert_eq!(pairs["idx"], "0");
        assert_eq!(pairs["textlen"], "7");
    }

    #[test]
    fn auto_language_falls_back_to_configured_one() {
        let tts = tts();
        assert_eq!(tts.language_for("auto"), "ar");
        assert_eq!(tts.language_for(""), "ar");
        assert_eq!(tts.language_for("en"), "en");
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_request() {
        let err = tts().synthesize("  ", "ar").await.unwrap_err();
        assert!(matches!(err, TtsError::EmptyText));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        let config = TtsConfig {
            google_base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..TtsConfig::default()
        };
        let err = GoogleTranslateTts::from_config(&config)
            .synthesize("hello", "en")
            .await
            .unwrap_err();
        assert!(matches!(err, TtsError::Request(_) | TtsError::Timeout));
    }
}
