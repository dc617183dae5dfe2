//! Built-in suites exercising the bot end to end without network access

mod intent;
mod support;
mod whatsapp_flow;

use std::future::Future;

use crate::runner::Suite;

/// Every built-in suite, in run order
pub fn all() -> Vec<Suite> {
    vec![intent::suite(), support::suite(), whatsapp_flow::suite()]
}

/// Drive an async flow from a synchronous case
pub(crate) fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
