//! RTMP transport abstraction used by `StreamMuxer`/`Sender` (spec §4.10).
//!
//! Wraps ffmpeg-next's own RTMP client and FLV muxer (`format::output_as`
//! against an `rtmp://` URL) rather than hand-rolling FLV tag bodies or the
//! RTMP handshake — libavformat already implements both, and the spec
//! requires this crate never construct FLV tags by hand. Reconnect/backoff
//! state lives in `Sender`; this type only knows how to open and write.

use crate::error::TransportError;
use ffmpeg_next as ffmpeg;
use tracing::{info, warn};

pub struct RtmpTransport {
    url: String,
    output: Option<ffmpeg::format::context::Output>,
}

impl RtmpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output: None,
        }
    }

    pub fn connect(&mut self) -> Result<(), TransportError> {
        info!(url = %self.url, "connecting rtmp transport");
        let output =
            ffmpeg::format::output_as(&self.url, "flv").map_err(|e| TransportError::ConnectFailed {
                target: self.url.clone(),
                reason: e.to_string(),
            })?;
        self.output = Some(output);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.output.is_some()
    }

    pub fn output_mut(&mut self) -> Option<&mut ffmpeg::format::context::Output> {
        self.output.as_mut()
    }

    pub fn disconnect(&mut self) {
        if self.output.take().is_some() {
            warn!(url = %self.url, "rtmp transport disconnected");
        }
    }
}
