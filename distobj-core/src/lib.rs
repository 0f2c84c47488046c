pub mod config;
pub mod core_object;
pub mod logging;
pub mod metrics;
pub mod test_utils;

pub use core_object::{
    DistributedObject, ObjectError, ObjectResult, ObjectStore, ObjectValue, ObjectWatcher, RestoreHandle,
    RestoreOutcome, StatusNotifier,
};
pub use config::Config;
pub use logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        assert_eq!(ObjectError::StoreNotOpen.code(), 4);
    }
}
