//! End-to-end pipeline tests with fake sources and a scripted build tool.

mod common;
mod lua_recipe_tests;
mod pipeline_tests;
