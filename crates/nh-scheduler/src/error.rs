use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("queue error: {0}")]
    Queue(#[from] nh_queue::QueueError),

    #[error("scheduler shutdown timed out")]
    ShutdownTimeout,
}
