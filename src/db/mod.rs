pub mod db;
pub mod memorydb;
pub mod notificationdb;
pub mod ticketdb;

use self::{notificationdb::NotificationExt, ticketdb::TicketExt};

/// Everything the services need from persistence. Implemented by the
/// Postgres-backed `DBClient` and by the in-memory `MemoryDB`.
pub trait HelpdeskStore: TicketExt + NotificationExt + std::fmt::Debug + Send + Sync {}

impl<T> HelpdeskStore for T where T: TicketExt + NotificationExt + std::fmt::Debug + Send + Sync {}
