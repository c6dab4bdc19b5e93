mod helpers;

mod misc;
mod sync;
mod webhooks;
