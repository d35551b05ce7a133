use crate::backend::FrameStream;
use eda_core::{ProtocolError, SessionError, StreamEvent, StreamUpdate};
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt, stream};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tracing::{debug, trace, warn};

/// Upper bound on the bytes buffered for one not-yet-complete event.
pub const MAX_EVENT_BYTES: usize = 16 * 1024 * 1024;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<SessionError>>> + Send>>;

/// Turns the raw frames of one analysis stream into typed updates.
///
/// Updates come out in the order their frames arrived. The sequence always
/// ends with exactly one terminal update (`Ended` or `Failed`), after which
/// the transport is released and nothing more is produced. A decoder is not
/// restartable; every session opens its own.
pub struct StreamDecoder {
    events: EventStream,
    /// Bytes received since the last complete event.
    buffered: Arc<AtomicUsize>,
    pending: VecDeque<StreamUpdate>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new(frames: FrameStream) -> Self {
        Self::with_event_limit(frames, MAX_EVENT_BYTES)
    }

    /// Like [`StreamDecoder::new`], failing the stream once more than `limit`
    /// bytes arrive without completing an event.
    pub fn with_event_limit(frames: FrameStream, limit: usize) -> Self {
        let buffered = Arc::new(AtomicUsize::new(0));
        let counter = buffered.clone();
        let bounded = frames.map(move |chunk| {
            let chunk = chunk.map_err(SessionError::from)?;
            let total = counter.fetch_add(chunk.len(), Ordering::Relaxed) + chunk.len();
            if total > limit {
                return Err(SessionError::Protocol(ProtocolError::EventTooLarge(limit)));
            }
            Ok(chunk)
        });
        Self {
            events: Box::pin(bounded.eventsource()),
            buffered,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Waits for the next update, or `None` once the sequence is over.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. All progress is stored on `self` between
    /// polls, so dropping the future inside `tokio::select!` loses nothing.
    pub async fn next_update(&mut self) -> Option<StreamUpdate> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                if update.is_terminal() {
                    self.finish();
                }
                return Some(update);
            }
            if self.finished {
                return None;
            }
            match self.events.next().await {
                Some(Ok(event)) => {
                    self.buffered.store(0, Ordering::Relaxed);
                    self.ingest(event);
                }
                Some(Err(err)) => {
                    let err = match err {
                        EventStreamError::Transport(err) => err,
                        EventStreamError::Utf8(_) => ProtocolError::InvalidUtf8.into(),
                        EventStreamError::Parser(err) => {
                            ProtocolError::Framing(err.to_string()).into()
                        }
                    };
                    warn!(kind = err.kind(), error = %err, "Analysis stream failed");
                    self.pending.push_back(StreamUpdate::Failed(err));
                }
                None => {
                    if self.buffered.load(Ordering::Relaxed) > 0 {
                        debug!("Stream closed with an incomplete event; discarding it");
                    }
                    self.pending.push_back(StreamUpdate::Ended);
                }
            }
        }
    }

    /// The updates as a lazy sequence.
    pub fn into_stream(self) -> impl Stream<Item = StreamUpdate> + Send {
        stream::unfold(self, |mut decoder| async move {
            decoder.next_update().await.map(|update| (update, decoder))
        })
    }

    fn ingest(&mut self, event: Event) {
        // Keep-alives and data-less events carry nothing to decode.
        if event.data.is_empty() {
            trace!(event = %event.event, "Skipping event without data");
            return;
        }
        match StreamEvent::decode(&event.data) {
            Ok(decoded) => {
                for update in decoded.into_updates() {
                    let terminal = update.is_terminal();
                    self.pending.push_back(update);
                    if terminal {
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Undecodable stream frame");
                self.pending
                    .push_back(StreamUpdate::Failed(SessionError::Protocol(err)));
            }
        }
    }

    /// Drops the transport and any updates queued behind the terminal one.
    fn finish(&mut self) {
        self.finished = true;
        self.pending.clear();
        self.events = Box::pin(stream::empty());
    }
}
