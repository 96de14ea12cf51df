//! Pre-build dependency resolution.

use tracing::debug;

use crate::options::ResolvedOptions;
use crate::recipe::{Requirement, RequirementRule};

/// Collect the requirements whose rule matches the resolved options.
///
/// Rules are evaluated in declaration order; duplicates keep their first
/// position. A rule whose option was dropped for the platform never fires.
pub fn resolve_requirements(rules: &[RequirementRule], options: &ResolvedOptions) -> Vec<Requirement> {
  let mut requirements: Vec<Requirement> = Vec::new();

  for rule in rules {
    let Some(value) = options.get(&rule.option) else {
      continue;
    };
    if *value != rule.when {
      continue;
    }

    for requirement in &rule.requires {
      if !requirements.contains(requirement) {
        debug!(requirement = %requirement, option = %rule.option, "adding build requirement");
        requirements.push(requirement.clone());
      }
    }
  }

  requirements
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::{OptionSet, resolve};
  use crate::platform::Os;
  use crate::recipe::libtorch;

  fn names(set: OptionSet) -> Vec<String> {
    let recipe = libtorch::recipe();
    let resolved = resolve(&recipe.options, &set, Os::Linux).unwrap();
    resolve_requirements(&recipe.requirements, &resolved)
      .into_iter()
      .map(|r| r.to_string())
      .collect()
  }

  #[test]
  fn defaults_need_protobuf_and_eigen() {
    assert_eq!(
      names(OptionSet::new()),
      vec!["protobuf/3.8.0@forwardmeasure/stable", "eigen/3.3.7@conan/stable"]
    );
  }

  #[test]
  fn custom_protobuf_skips_the_package() {
    let set = OptionSet::new()
      .with("build_custom_protobuf", true)
      .with("use_system_eigen_install", false);
    assert!(names(set).is_empty());
  }

  #[test]
  fn tests_pull_in_test_frameworks() {
    let set = OptionSet::new().with("build_test", true);
    let names = names(set);
    assert_eq!(names.len(), 5);
    assert!(names.contains(&"gtest/1.8.1@bincrafters/stable".to_string()));
    assert!(names.contains(&"benchmark/1.4.1@bincrafters/stable".to_string()));
  }

  #[test]
  fn duplicates_are_collapsed() {
    let req = Requirement::new("zlib", "1.2.11");
    let rules = vec![
      RequirementRule::when("a", true, vec![req.clone()]),
      RequirementRule::when("b", true, vec![req.clone()]),
    ];
    let mut options = ResolvedOptions::default();
    options.insert("a", true.into());
    options.insert("b", true.into());

    assert_eq!(resolve_requirements(&rules, &options), vec![req]);
  }
}
