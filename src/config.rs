use std::time::Duration;

/// Which pub/sub implementation connects the nodes of a running DAG.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FabricKind {
    /// [`PubSub`](crate::pubsub::PubSub): all logs behind one lock.
    #[default]
    Shared,
    /// [`PubSubMulti`](crate::pubsub::PubSubMulti): one channel and fan-out thread per node.
    /// Falls back to `Shared` when the `multi-fabric` feature is off.
    Multi,
}

/// Settings for [`Interpreter`](crate::interpreter::Interpreter).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Pub/sub implementation between nodes.
    pub fabric: FabricKind,
    /// Longest a blocked subscriber waits before re-checking cancellation.
    pub poll_interval: Duration,
    /// Per-node in-flight bound of the channel fabric.
    pub channel_capacity: usize,
    /// Fire every window still buffered once a Window node's input finishes.
    pub force_flush_on_finish: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            fabric: FabricKind::Shared,
            poll_interval: Duration::from_millis(10),
            channel_capacity: 1024,
            force_flush_on_finish: true,
        }
    }
}

impl InterpreterConfig {
    #[must_use]
    pub fn with_fabric(mut self, fabric: FabricKind) -> Self {
        self.fabric = fabric;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_force_flush_on_finish(mut self, enabled: bool) -> Self {
        self.force_flush_on_finish = enabled;
        self
    }
}
