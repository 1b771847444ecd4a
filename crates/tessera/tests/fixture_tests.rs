//! Integration tests using shared test cases from tests/fixtures/*.json

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tessera::render;

#[derive(Debug, Deserialize)]
struct TestSuite {
    #[allow(dead_code)]
    description: String,
    tests: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
struct TestCase {
    name: String,
    template: String,
    data: serde_json::Value,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_test_suite(filename: &str) -> TestSuite {
    let path = fixtures_dir().join(filename);
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Failed to read {}", path.display()));
    serde_json::from_str(&content).unwrap_or_else(|e| panic!("Failed to parse {filename}: {e}"))
}

fn run_test_case(case: &TestCase) {
    let result = render(&case.template, case.data.clone());

    if let Some(expected) = &case.expected {
        match result {
            Ok(output) => assert_eq!(
                &output, expected,
                "Test '{}' failed: expected '{}', got '{}'",
                case.name, expected, output
            ),
            Err(e) => panic!(
                "Test '{}' should succeed with '{}', but got error: {:?}",
                case.name, expected, e
            ),
        }
    } else if let Some(error_type) = &case.error {
        match result {
            Ok(output) => panic!(
                "Test '{}' should fail with {}, but succeeded with '{}'",
                case.name, error_type, output
            ),
            Err(e) => {
                let error_name = format!("{e:?}");
                assert!(
                    error_name.starts_with(error_type.as_str()),
                    "Test '{}' expected error type '{}', got '{:?}'",
                    case.name,
                    error_type,
                    e
                );
            }
        }
    }
}

fn run_test_suite(filename: &str) {
    let suite = load_test_suite(filename);
    for case in &suite.tests {
        run_test_case(case);
    }
    eprintln!("{}: {} tests passed", filename, suite.tests.len());
}

#[test]
fn test_basic() {
    run_test_suite("basic.json");
}

#[test]
fn test_conditionals() {
    run_test_suite("conditionals.json");
}

#[test]
fn test_iteration() {
    run_test_suite("iteration.json");
}

#[test]
fn test_format() {
    run_test_suite("format.json");
}

#[test]
fn test_errors() {
    run_test_suite("errors.json");
}
