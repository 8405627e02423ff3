/**
 * The local index: a durable projection of every ingested
 *  event and its decrypted body, queried by the drive
 *  operations and never by the network.
 */
mod record;
mod store;

pub use record::DriveRecord;
pub use store::{EventIndex, IndexError, RecordQuery};
