pub mod csv_log;
pub mod data_server;

pub use csv_log::CsvLog;
