//! Built-in recipe for the PyTorch C++ library.

use std::collections::BTreeMap;

use crate::options::{OptionDecl, OptionSchema};
use crate::platform::{CompilerKind, Os};
use crate::recipe::{
  CompilerConstraint, CopyRule, Recipe, Requirement, RequirementRule, SourcePatch, StageRoot, StagingSpec, SystemLibs,
};

pub const NAME: &str = "libtorch";
pub const VERSION: &str = "1.3.1";
pub const URL: &str = "https://github.com/pytorch/pytorch.git";

/// Boolean options that map one-to-one onto a CMake cache variable.
const FLAGS: &[(&str, bool, &str)] = &[
  ("shared", true, "BUILD_SHARED_LIBS"),
  ("aten_no_test", false, "ATEN_NO_TEST"),
  ("build_binary", true, "BUILD_BINARY"),
  ("build_docs", false, "BUILD_DOCS"),
  ("build_custom_protobuf", false, "BUILD_CUSTOM_PROTOBUF"),
  ("build_python", true, "BUILD_PYTHON"),
  ("build_caffe2_ops", true, "BUILD_CAFFE2_OPS"),
  ("build_caffe2_mobile", true, "BUILD_CAFFE2_MOBILE"),
  ("build_named_tensor", false, "BUILD_NAMEDTENSOR"),
  ("use_static_dispatch", false, "USE_STATIC_DISPATCH"),
  ("build_test", false, "BUILD_TEST"),
  ("use_asan", false, "USE_ASAN"),
  ("use_cuda", false, "USE_CUDA"),
  ("use_rocm", false, "USE_ROCM"),
  ("use_fbgemm", true, "USE_FBGEMM"),
  ("use_ffmpeg", false, "USE_FFMPEG"),
  ("use_gflags", false, "USE_GFLAGS"),
  ("use_glog", false, "USE_GLOG"),
  ("use_leveldb", false, "USE_LEVELDB"),
  ("use_lite_proto", false, "USE_LITE_PROTO"),
  ("use_lmdb", false, "USE_LMDB"),
  ("use_metal", true, "USE_METAL"),
  ("use_native_arch", false, "USE_NATIVE_ARCH"),
  ("use_nnapi", false, "USE_NNAPI"),
  ("use_nnpack", true, "USE_NNPACK"),
  ("use_numpy", true, "USE_NUMPY"),
  ("use_observers", false, "USE_OBSERVERS"),
  ("use_opencl", false, "USE_OPENCL"),
  ("use_opencv", false, "USE_OPENCV"),
  ("use_openmp", true, "USE_OPENMP"),
  ("use_prof", false, "USE_PROF"),
  ("use_qnnpack", true, "USE_QNNPACK"),
  ("use_pytorch_qnnpack", true, "USE_PYTORCH_QNNPACK"),
  ("use_redis", false, "USE_REDIS"),
  ("use_rocksdb", false, "USE_ROCKSDB"),
  ("use_snpe", false, "USE_SNPE"),
  ("use_system_eigen_install", true, "USE_SYSTEM_EIGEN_INSTALL"),
  ("use_tensorrt", false, "USE_TENSORRT"),
  ("use_zmq", false, "USE_ZMQ"),
  ("use_zstd", false, "USE_ZSTD"),
  ("use_distributed", true, "USE_DISTRIBUTED"),
  ("use_tbb", false, "USE_TBB"),
  ("build_with_torch_libs", true, "BUILDING_WITH_TORCH_LIBS"),
];

/// CPU feature flags the caffe2 perf kernels need regardless of options.
const FORCED_PERF_FLAGS: &[&str] = &["CAFFE2_PERF_WITH_AVX", "CAFFE2_PERF_WITH_AVX2", "CAFFE2_PERF_WITH_AVX512"];

pub fn recipe() -> Recipe {
  let mut options = OptionSchema::new()
    .declare(
      "enable_parallel_build",
      OptionDecl::switch(true).describe("Let the build tool run compile jobs in parallel"),
    )
    .declare(
      "use_ninja_build",
      OptionDecl::switch(true).describe("Generate Ninja files instead of Makefiles"),
    )
    .declare(
      "fPIC",
      OptionDecl::flag(true, "CMAKE_POSITION_INDEPENDENT_CODE").unsupported_on(Os::Windows),
    );
  for (name, default, variable) in FLAGS {
    options = options.declare(name, OptionDecl::flag(*default, variable));
  }

  let mut forced_variables: BTreeMap<String, String> = FORCED_PERF_FLAGS
    .iter()
    .map(|flag| (flag.to_string(), "ON".to_string()))
    .collect();
  forced_variables.insert("CMAKE_VERBOSE_MAKEFILE".to_string(), "ON".to_string());

  let configure_env = FORCED_PERF_FLAGS
    .iter()
    .map(|flag| (flag.to_string(), "ON".to_string()))
    .collect();

  Recipe {
    name: NAME.to_string(),
    version: VERSION.to_string(),
    url: URL.to_string(),
    tag: None,
    description: Some("Tensors and dynamic neural networks with strong GPU acceleration".to_string()),
    license: Some("BSD-3-Clause".to_string()),
    options,
    requirements: vec![
      RequirementRule::when(
        "build_custom_protobuf",
        false,
        vec![Requirement::new("protobuf", "3.8.0").with_channel("forwardmeasure/stable")],
      ),
      RequirementRule::when(
        "use_system_eigen_install",
        true,
        vec![Requirement::new("eigen", "3.3.7").with_channel("conan/stable")],
      ),
      RequirementRule::when(
        "build_test",
        true,
        vec![
          Requirement::new("benchmark", "1.4.1").with_channel("bincrafters/stable"),
          Requirement::new("gflags", "2.2.2").with_channel("bincrafters/stable"),
          Requirement::new("gtest", "1.8.1").with_channel("bincrafters/stable"),
        ],
      ),
    ],
    compilers: vec![CompilerConstraint {
      compiler: CompilerKind::VisualStudio,
      min_version: 14,
    }],
    forced_variables,
    configure_env,
    generator_option: Some("use_ninja_build".to_string()),
    parallel_option: Some("enable_parallel_build".to_string()),
    patches: vec![SourcePatch {
      file: "caffe2/CMakeLists.txt".to_string(),
      find: "--yaml_dir=${CMAKE_CURRENT_BINARY_DIR}/../aten/src/ATen".to_string(),
      replace: "--yaml_dir=${CMAKE_CURRENT_BINARY_DIR}/../../aten/src/ATen".to_string(),
    }],
    staging: StagingSpec {
      rules: vec![
        CopyRule::new("LICENSE", StageRoot::Source, "licenses").required(),
        CopyRule::new("include/*", StageRoot::Install, ""),
        CopyRule::new("lib/*", StageRoot::Install, "").required(),
        CopyRule::new("bin/*", StageRoot::Install, ""),
        CopyRule::new("share/*", StageRoot::Install, ""),
        CopyRule::new("*.pdb", StageRoot::Build, "lib").flatten(),
      ],
      system_libs: vec![SystemLibs {
        compiler: CompilerKind::VisualStudio,
        libs: vec!["wsock32".to_string(), "ws2_32".to_string()],
      }],
      ..StagingSpec::default()
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::OptionValue;

  #[test]
  fn recipe_is_valid() {
    recipe().validate().unwrap();
  }

  #[test]
  fn declares_full_option_table() {
    let recipe = recipe();
    assert_eq!(recipe.options.len(), FLAGS.len() + 3);
    assert_eq!(recipe.options.len(), 46);
  }

  #[test]
  fn documented_defaults() {
    let recipe = recipe();
    let default = |name: &str| recipe.options.get(name).map(|d| d.default.clone());

    assert_eq!(default("shared"), Some(OptionValue::Bool(true)));
    assert_eq!(default("use_cuda"), Some(OptionValue::Bool(false)));
    assert_eq!(default("use_distributed"), Some(OptionValue::Bool(true)));
    assert_eq!(default("use_ninja_build"), Some(OptionValue::Bool(true)));
    assert_eq!(default("build_custom_protobuf"), Some(OptionValue::Bool(false)));
  }

  #[test]
  fn tag_is_v_prefixed() {
    assert_eq!(recipe().tag(), "v1.3.1");
  }

  #[test]
  fn license_is_required_and_debug_symbols_optional() {
    let rules = recipe().staging.rules;
    let license = rules.iter().find(|r| r.pattern == "LICENSE").unwrap();
    let pdb = rules.iter().find(|r| r.pattern == "*.pdb").unwrap();

    assert!(license.required);
    assert!(!pdb.required);
    assert!(!pdb.keep_path);
  }
}
