pub const APP_NAME: &str = "buildstage";

/// Checkout of the upstream sources inside a work directory.
pub const SOURCE_SUBDIR: &str = "source";
/// CMake binary directory inside a work directory.
pub const BUILD_SUBDIR: &str = "build";
/// `CMAKE_INSTALL_PREFIX` inside a work directory.
pub const INSTALL_SUBDIR: &str = "install";

/// Stamp written into the build directory after a successful configure.
pub const CONFIGURE_STAMP: &str = ".buildstage-configured";
/// Advisory lock guarding a work directory.
pub const WORKDIR_LOCK: &str = ".buildstage.lock";
/// Consumer metadata written into the package directory after staging.
pub const PACKAGE_INFO_FILE: &str = "buildstage-package.json";
