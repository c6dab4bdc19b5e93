mod poller;

pub use poller::{
    past_grace_period,
    OrderPollerConfig,
    OrderStatusPoller,
    PollError,
    PollReport,
    ORDER_STATUS_JOB_NAME,
};
