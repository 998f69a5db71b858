/// Protocol errors returned by every pub/sub implementation.
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// Offsets are assigned by the log; callers must publish with offset 0.
    #[error("publish with non-zero offset {0}")]
    PublishWithOffset(i64),

    #[error("log {0:?} is finished")]
    Finished(String),

    #[error("no publisher registered for {0:?}")]
    NoPublisher(String),

    #[error("context done")]
    ContextDone,

    #[error("offset {0} not found")]
    OffsetNotFound(i64),

    /// The subscriber callback failed; the subscription stopped.
    #[error("handler returned error: {0:#}")]
    HandlerReturnErr(anyhow::Error),

    /// A channel fabric could not start its fan-out thread.
    #[error("spawning fan-out thread: {0}")]
    Spawn(#[from] std::io::Error),
}
