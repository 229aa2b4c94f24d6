//! Testing utilities for code that sends DAP messages.
//!
//! [`RecordingChannel`] captures every outbound message, with the sequence
//! number it would have been written with, so tests can assert on responses
//! and events without decoding bytes.

use serde_json::Value;

use crate::channel::MessageSink;
use crate::error::CodecError;
use crate::message::{OutgoingEvent, OutgoingMessage, OutgoingResponse, Seq, SequencedMessage};

/// A [`MessageSink`] that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    messages: Vec<SequencedMessage>,
    sequence_number: Seq,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, oldest first.
    pub fn messages(&self) -> &[SequencedMessage] {
        &self.messages
    }

    /// Remove and return all messages sent so far.
    pub fn take(&mut self) -> Vec<SequencedMessage> {
        std::mem::take(&mut self.messages)
    }

    pub fn responses(&self) -> impl Iterator<Item = &OutgoingResponse> {
        self.messages.iter().filter_map(|m| m.message.as_response())
    }

    pub fn events(&self) -> impl Iterator<Item = &OutgoingEvent> {
        self.messages.iter().filter_map(|m| m.message.as_event())
    }

    /// The most recent response to the request with sequence `request_seq`.
    pub fn response_to(&self, request_seq: Seq) -> Option<&OutgoingResponse> {
        self.responses()
            .filter(|r| r.request_seq == request_seq)
            .last()
    }

    /// Bodies of every event named `name`, oldest first.
    pub fn event_bodies(&self, name: &str) -> Vec<&Value> {
        self.events()
            .filter(|e| e.event == name)
            .map(|e| &e.body)
            .collect()
    }
}

impl MessageSink for RecordingChannel {
    fn send(&mut self, message: OutgoingMessage) -> Result<Seq, CodecError> {
        let seq = self.sequence_number;
        self.sequence_number += 1;
        self.messages.push(SequencedMessage { seq, message });
        Ok(seq)
    }

    fn reset_sequence(&mut self) {
        self.sequence_number = 0;
    }
}
