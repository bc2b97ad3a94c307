use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{BrokerMessage, MessageSource, SourceError};

/// One scripted poll outcome.
#[derive(Debug, Clone)]
pub enum ScriptedPoll {
    Message(BrokerMessage),
    /// No message within the poll timeout.
    Idle,
    Transient(String),
    Fatal(String),
}

/// A source that replays a fixed script of poll outcomes.
///
/// Once the script is exhausted every poll idles for the full timeout. If a
/// cancellation token was attached, it is cancelled on the first idle poll after
/// the script ran out, which mimics a shutdown signal arriving once the
/// broker has nothing left to deliver.
#[derive(Debug)]
pub struct ScriptedSource {
    script: VecDeque<ScriptedPoll>,
    cancel_when_exhausted: Option<CancellationToken>,
    fail_subscribe: bool,
    state: Arc<ProbeState>,
}

/// Observes a [`ScriptedSource`] after it was moved into an ingestor.
#[derive(Debug, Clone)]
pub struct SourceProbe {
    state: Arc<ProbeState>,
}

#[derive(Debug, Default)]
struct ProbeState {
    subscribed: AtomicBool,
    closed: AtomicBool,
    polls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = ScriptedPoll>) -> Self {
        Self {
            script: script.into_iter().collect(),
            cancel_when_exhausted: None,
            fail_subscribe: false,
            state: Arc::default(),
        }
    }

    /// Creates a source that delivers the messages in order.
    pub fn from_messages(messages: impl IntoIterator<Item = BrokerMessage>) -> Self {
        Self::new(messages.into_iter().map(ScriptedPoll::Message))
    }

    pub fn cancel_when_exhausted(mut self, ct: CancellationToken) -> Self {
        self.cancel_when_exhausted = Some(ct);
        self
    }

    pub fn fail_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    pub fn probe(&self) -> SourceProbe {
        SourceProbe {
            state: self.state.clone(),
        }
    }
}

impl SourceProbe {
    pub fn is_subscribed(&self) -> bool {
        self.state.subscribed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.state.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn subscribe(&mut self) -> Result<(), SourceError> {
        if self.fail_subscribe {
            return Err(SourceError::Subscribe {
                topics: Vec::new(),
                message: "scripted subscribe failure".to_string(),
            });
        }

        self.state.subscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerMessage>, SourceError> {
        self.state.polls.fetch_add(1, Ordering::SeqCst);

        match self.script.pop_front() {
            Some(ScriptedPoll::Message(message)) => Ok(Some(message)),
            Some(ScriptedPoll::Idle) => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
            Some(ScriptedPoll::Transient(message)) => Err(SourceError::Transient { message }),
            Some(ScriptedPoll::Fatal(message)) => Err(SourceError::Fatal { message }),
            None => {
                if let Some(ct) = self.cancel_when_exhausted.as_ref() {
                    ct.cancel();
                }
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
