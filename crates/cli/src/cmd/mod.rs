mod build;
mod clean;
mod configure;
mod fetch;
mod info;
mod options;
mod run;
mod stage;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use configure::cmd_configure;
pub use fetch::cmd_fetch;
pub use info::cmd_info;
pub use options::cmd_options;
pub use run::cmd_run;
pub use stage::cmd_stage;
