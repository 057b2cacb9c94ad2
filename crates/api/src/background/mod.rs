//! Background jobs spawned by the server binary. Each takes a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and returns
//! once it is cancelled.

pub mod parent_completion;
