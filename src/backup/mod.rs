pub mod archiver;
pub mod backup_config;
pub mod naming;
pub mod pass;
pub mod result_error;
pub mod retention;
pub mod scheduler;
pub mod snapshot;
pub mod target;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
