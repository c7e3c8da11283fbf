//! Subtype lifecycle wrappers (§4.4).
//!
//! Each subtype wraps the base [`TaskStore`](decapod_task_store::TaskStore)
//! transition with whatever additional, best-effort CAS updates on related
//! documents the subtype requires. None of this is transactional with the
//! base transition — a hook failure is reported via
//! [`crate::error::QueueError::HookFailed`] without rolling the base
//! transition back, so every hook must be safe to retry.

mod cancel;
mod playbook;
mod server_discovery;

pub use cancel::CancelPlaybookPluginTask;
pub use playbook::PlaybookPluginTask;
pub use server_discovery::ServerDiscoveryTask;
