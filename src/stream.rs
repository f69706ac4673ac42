//! Frames emitted by streamed project operations.
//!
//! A streamed invocation produces zero or more `status` and `output` frames
//! followed by exactly one terminal frame, `complete` or `error`. The
//! terminal frame can only be sent by consuming the [`FrameSender`], so no
//! invocation can end twice or keep going after it ended.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::models::{ProjectSnapshot, Story};
use crate::sandbox::OutputStream;

/// One unit of a streamed operation's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Status { message: String },
    Output { stream: OutputStream, data: String },
    Complete(Completion),
    Error { message: String },
}

impl Frame {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error { .. })
    }
}

/// Payload of a `complete` frame. Planning fills in the artifacts;
/// iteration only carries a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog: Option<Vec<Story>>,
}

impl Completion {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// What a project publishes to everyone watching it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ProjectEvent {
    Frame(Frame),
    State(ProjectSnapshot),
}

/// Sending half of one streamed invocation.
///
/// Frames go to the invoking caller and are mirrored to the project's
/// broadcast channel. A caller that went away is not an error.
pub struct FrameSender {
    caller: mpsc::UnboundedSender<Frame>,
    watchers: broadcast::Sender<ProjectEvent>,
}

impl FrameSender {
    pub fn new(watchers: broadcast::Sender<ProjectEvent>) -> (Self, FrameStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                caller: tx,
                watchers,
            },
            FrameStream { rx },
        )
    }

    pub fn status(&self, message: impl Into<String>) {
        self.send(Frame::Status {
            message: message.into(),
        });
    }

    pub fn output(&self, stream: OutputStream, data: String) {
        self.send(Frame::Output { stream, data });
    }

    /// Emit the terminal frame for `result` and close the stream.
    pub fn finish(self, result: crate::Result<Completion>) {
        let frame = match result {
            Ok(completion) => Frame::Complete(completion),
            Err(e) => Frame::Error {
                message: e.to_string(),
            },
        };
        self.send(frame);
    }

    fn send(&self, frame: Frame) {
        let _ = self.watchers.send(ProjectEvent::Frame(frame.clone()));
        let _ = self.caller.send(frame);
    }
}

/// Receiving half of one streamed invocation.
pub struct FrameStream {
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl FrameStream {
    /// The next frame, or `None` once the terminal frame has been received.
    pub async fn next(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Drain every frame of the invocation, terminal frame last.
    pub async fn collect(mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next().await {
            frames.push(frame);
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn finish_emits_a_single_terminal_frame_last() {
        let (watchers, _) = broadcast::channel(16);
        let (sender, stream) = FrameSender::new(watchers);

        sender.status("Starting");
        sender.output(OutputStream::Primary, "hi\n".to_string());
        sender.finish(Ok(Completion::message("done")));

        let frames = stream.collect().await;
        assert_eq!(frames.len(), 3);
        assert!(frames[2].is_terminal());
        assert_eq!(frames.iter().filter(|f| f.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn failure_becomes_error_frame() {
        let (watchers, _) = broadcast::channel(16);
        let (sender, stream) = FrameSender::new(watchers);

        sender.finish(Err(Error::InvalidInput("nope".to_string())));

        let frames = stream.collect().await;
        assert_eq!(
            frames,
            vec![Frame::Error {
                message: "Invalid input: nope".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn watchers_see_the_same_frames() {
        let (watchers, mut rx) = broadcast::channel(16);
        let (sender, _stream) = FrameSender::new(watchers);

        sender.status("Starting");

        match rx.recv().await.unwrap() {
            ProjectEvent::Frame(Frame::Status { message }) => assert_eq!(message, "Starting"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn frames_serialize_with_type_tag() {
        let output = serde_json::to_value(Frame::Output {
            stream: OutputStream::Secondary,
            data: "x".to_string(),
        })
        .unwrap();
        assert_eq!(
            output,
            serde_json::json!({"type": "output", "stream": "secondary", "data": "x"})
        );

        let complete = serde_json::to_value(Frame::Complete(Completion::message("ok"))).unwrap();
        assert_eq!(complete, serde_json::json!({"type": "complete", "message": "ok"}));
    }
}
