//! buildstage-lib: fetch, configure, build and stage native libraries
//!
//! A build runs four components in a fixed order:
//! - `source`: checks out a pinned tag of the upstream repository
//! - `configure`: translates options + platform into CMake variables
//! - `build`: runs the configure and compile phases
//! - `stage`: copies outputs into a package and records consumer metadata
//!
//! `pipeline` chains them; each is also usable on its own.

pub mod build;
pub mod configure;
pub mod consts;
pub mod options;
pub mod pipeline;
pub mod platform;
pub mod recipe;
pub mod source;
pub mod stage;
pub mod util;
pub mod workdir;
