//! Step-mode gates: the external continue signal.

use async_trait::async_trait;
use nodetape_core::StepId;
use tokio::sync::{Mutex, mpsc};

/// What a gate is asked before a step runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPrompt {
    /// 1-based position of the step
    pub position: usize,
    /// Steps in the sequence
    pub total: usize,
    /// Step id
    pub step_id: StepId,
    /// Node about to run
    pub node_name: String,
}

/// Signal sent to a [`ChannelGate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    /// Run the next step
    Continue,
    /// Cancel the rest of the sequence
    Decline,
}

/// Decides whether step mode proceeds to the next step
#[async_trait]
pub trait StepGate: Send + Sync {
    /// Wait for a decision; `false` cancels the remaining steps
    async fn proceed(&self, prompt: &StepPrompt) -> bool;
}

/// Gate that always continues
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoContinue;

#[async_trait]
impl StepGate for AutoContinue {
    async fn proceed(&self, _prompt: &StepPrompt) -> bool {
        true
    }
}

/// Gate fed by a channel; a closed channel declines
#[derive(Debug)]
pub struct ChannelGate {
    rx: Mutex<mpsc::Receiver<GateSignal>>,
}

impl ChannelGate {
    /// Wrap a receiver
    #[must_use]
    pub fn new(rx: mpsc::Receiver<GateSignal>) -> Self {
        Self { rx: Mutex::new(rx) }
    }

    /// Create a gate and the sender that drives it
    #[must_use]
    pub fn channel(buffer: usize) -> (mpsc::Sender<GateSignal>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl StepGate for ChannelGate {
    async fn proceed(&self, prompt: &StepPrompt) -> bool {
        tracing::info!(
            position = prompt.position,
            total = prompt.total,
            node_name = %prompt.node_name,
            "waiting for continue signal"
        );
        let signal = self.rx.lock().await.recv().await;
        matches!(signal, Some(GateSignal::Continue))
    }
}
