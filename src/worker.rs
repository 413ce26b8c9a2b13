use std::sync::mpsc;
use std::thread;

use crate::chat::{BackendError, ConversationBackend, HistoryEntry, Question};

pub enum ChatRequest {
    Ask(Question),
    History(String),
}

/// Replies carry the document they belong to so late arrivals for a
/// closed document can be dropped.
pub enum ChatReply {
    Answer {
        document_id: String,
        answer: Result<String, BackendError>,
    },
    History {
        document_id: String,
        entries: Result<Vec<HistoryEntry>, BackendError>,
    },
}

/// Runs backend calls on a dedicated thread so the event loop never waits
/// on the network. Replies come back in request order.
pub struct ChatWorker {
    tx: mpsc::Sender<ChatRequest>,
    rx: mpsc::Receiver<ChatReply>,
    in_flight: usize,
}

impl ChatWorker {
    pub fn new(backend: Box<dyn ConversationBackend>) -> std::io::Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<ChatRequest>();
        let (res_tx, res_rx) = mpsc::channel::<ChatReply>();

        thread::Builder::new()
            .name("chat-worker".into())
            .spawn(move || {
                while let Ok(request) = req_rx.recv() {
                    let reply = match request {
                        ChatRequest::Ask(question) => {
                            log::info!(
                                "Asking about page {} of {} (image: {})",
                                question.page,
                                question.document_id,
                                question.image.is_some()
                            );
                            let answer = backend.ask(&question);
                            if let Err(e) = &answer {
                                log::warn!("Question failed: {}", e);
                            }
                            ChatReply::Answer {
                                document_id: question.document_id,
                                answer,
                            }
                        }
                        ChatRequest::History(document_id) => {
                            let entries = backend.history(&document_id);
                            if let Err(e) = &entries {
                                log::warn!("Could not load history for {}: {}", document_id, e);
                            }
                            ChatReply::History {
                                document_id,
                                entries,
                            }
                        }
                    };
                    if res_tx.send(reply).is_err() {
                        break; // viewer dropped its receiver
                    }
                }
                log::info!("Chat worker thread exiting");
            })?;

        Ok(Self {
            tx: req_tx,
            rx: res_rx,
            in_flight: 0,
        })
    }

    /// Non-blocking submit. Returns false if the worker thread is gone.
    pub fn submit(&mut self, request: ChatRequest) -> bool {
        if self.tx.send(request).is_ok() {
            self.in_flight += 1;
            true
        } else {
            false
        }
    }

    /// Non-blocking poll for a completed reply.
    pub fn poll(&mut self) -> Option<ChatReply> {
        match self.rx.try_recv() {
            Ok(reply) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(reply)
            }
            Err(_) => None,
        }
    }

    /// True if there are no pending requests.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }
}
