use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::capture::CapturedImage;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend URL {0:?}")]
    InvalidUrl(String),
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected backend response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Network(e.to_string())
    }
}

/// A question tagged with the page it was asked from.
#[derive(Debug, Clone)]
pub struct Question {
    pub document_id: String,
    pub page: u32,
    pub text: String,
    pub image: Option<CapturedImage>,
}

/// One past exchange as stored by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryEntry {
    pub question_query: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub page_number: Option<u32>,
}

pub trait ConversationBackend: Send {
    fn ask(&self, question: &Question) -> Result<String, BackendError>;

    fn history(&self, _document_id: &str) -> Result<Vec<HistoryEntry>, BackendError> {
        Ok(Vec::new())
    }
}

/// Answers arrive either as a JSON string, an object with an `answer`
/// field, or plain text.
pub fn parse_answer(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(answer)) => answer,
        Ok(Value::Object(map)) => match map.get("answer").and_then(Value::as_str) {
            Some(answer) => answer.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}

pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let base_url = base_url.into();
        reqwest::Url::parse(&base_url).map_err(|_| BackendError::InvalidUrl(base_url.clone()))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("pagechat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base_url, client })
    }

    pub fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, BackendError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Download the PDF published under `document_id`.
    pub fn fetch_document(&self, document_id: &str) -> Result<Vec<u8>, BackendError> {
        let url = self.endpoint(&["pdfs", document_id])?;
        log::info!("Downloading {}", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/pdf")
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl ConversationBackend for HttpBackend {
    fn ask(&self, question: &Question) -> Result<String, BackendError> {
        let mut form = Form::new()
            .text("public_id", question.document_id.clone())
            .text("page_number", question.page.to_string())
            .text("question_query", question.text.clone());
        if let Some(image) = &question.image {
            let part = Part::bytes(image.png.clone())
                .file_name("capture.png")
                .mime_str("image/png")?;
            form = form.part("image_file", part);
        }

        let response = self
            .client
            .post(self.endpoint(&["chat", "query"])?)
            .multipart(form)
            .send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(parse_answer(&body))
    }

    fn history(&self, document_id: &str) -> Result<Vec<HistoryEntry>, BackendError> {
        let response = self
            .client
            .get(self.endpoint(&["chat", "history", document_id])?)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub page: Option<u32>,
    /// Pixel size of the attached capture, if any.
    pub attachment: Option<(u32, u32)>,
}

/// Messages in display order plus the number of unanswered questions.
#[derive(Debug, Default)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
    waiting: usize,
}

impl ChatTranscript {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting > 0
    }

    pub fn push_question(&mut self, question: &Question) {
        self.messages.push(ChatMessage {
            sender: Sender::User,
            text: question.text.clone(),
            page: Some(question.page),
            attachment: question.image.as_ref().map(|i| (i.width, i.height)),
        });
        self.waiting += 1;
    }

    pub fn push_reply(&mut self, reply: Result<String, BackendError>) {
        self.waiting = self.waiting.saturating_sub(1);
        let message = match reply {
            Ok(text) => ChatMessage {
                sender: Sender::Assistant,
                text,
                page: None,
                attachment: None,
            },
            Err(e) => ChatMessage {
                sender: Sender::Error,
                text: format!("Could not get an answer: {}", e),
                page: None,
                attachment: None,
            },
        };
        self.messages.push(message);
    }

    /// Prepend stored exchanges ahead of anything asked this session.
    pub fn load_history(&mut self, entries: Vec<HistoryEntry>) {
        let mut restored = Vec::with_capacity(entries.len() * 2);
        for entry in entries {
            restored.push(ChatMessage {
                sender: Sender::User,
                text: entry.question_query,
                page: entry.page_number,
                attachment: None,
            });
            if !entry.answer.is_empty() {
                restored.push(ChatMessage {
                    sender: Sender::Assistant,
                    text: entry.answer,
                    page: None,
                    attachment: None,
                });
            }
        }
        restored.append(&mut self.messages);
        self.messages = restored;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, image: bool) -> Question {
        Question {
            document_id: "doc".into(),
            page: 3,
            text: text.into(),
            image: image.then(|| CapturedImage {
                serial: 1,
                png: vec![0x89, b'P', b'N', b'G'],
                width: 40,
                height: 30,
            }),
        }
    }

    #[test]
    fn test_parse_answer_variants() {
        assert_eq!(parse_answer(r#""the derivative is 2x""#), "the derivative is 2x");
        assert_eq!(parse_answer(r#"{"answer": "42", "sources": []}"#), "42");
        assert_eq!(parse_answer("plain words"), "plain words");
        assert_eq!(parse_answer(r#"{"detail": "x"}"#), r#"{"detail": "x"}"#);
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let backend = HttpBackend::new("http://localhost:8000").unwrap();
        assert_eq!(
            backend.endpoint(&["chat", "query"]).unwrap().as_str(),
            "http://localhost:8000/chat/query"
        );
        let nested = HttpBackend::new("http://example.com/api/").unwrap();
        assert_eq!(
            nested.endpoint(&["chat", "history", "a b"]).unwrap().as_str(),
            "http://example.com/api/chat/history/a%20b"
        );
        assert!(HttpBackend::new("not a url").is_err());
    }

    #[test]
    fn test_transcript_tracks_pending_and_errors() {
        let mut transcript = ChatTranscript::default();
        transcript.push_question(&question("what is this?", true));
        assert!(transcript.is_waiting());
        assert_eq!(transcript.messages()[0].attachment, Some((40, 30)));

        transcript.push_reply(Err(BackendError::Status {
            status: 500,
            body: "boom".into(),
        }));
        assert!(!transcript.is_waiting());
        let last = transcript.messages().last().unwrap();
        assert_eq!(last.sender, Sender::Error);
        assert!(last.text.contains("500"));
    }

    #[test]
    fn test_history_goes_before_live_messages() {
        let mut transcript = ChatTranscript::default();
        transcript.push_question(&question("new", false));
        let entries: Vec<HistoryEntry> = serde_json::from_str(
            r#"[{"question_query": "old", "answer": "reply", "page_number": 2, "chat_history_id": 9}]"#,
        )
        .unwrap();
        transcript.load_history(entries);
        let texts: Vec<&str> = transcript.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["old", "reply", "new"]);
        assert_eq!(transcript.messages()[0].page, Some(2));
    }
}
