pub mod backend;
pub mod client;
pub mod memory;
pub mod realtime;
mod record;
pub mod storage;
#[cfg(test)]
mod test_db;
