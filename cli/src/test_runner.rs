use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use retemplate::{Definition, Pattern};

const TEST_SUFFIX: &str = ".retest";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Template to compile. Defaults to the definition's entry template.
    #[serde(default)]
    pub entry: Option<String>,

    /// Expected compiled pattern text (exact comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected failure: some definition or compile error must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Expected unbound placeholder names, checked before compiling.
    #[serde(default)]
    pub expect_unassigned: Option<Vec<String>>,

    /// Inputs the compiled pattern must match.
    #[serde(default)]
    pub matches: Vec<String>,

    /// Inputs the compiled pattern must not match.
    #[serde(default)]
    pub rejects: Vec<String>,
}

/// Split a `.retest` file into its TOML frontmatter config and definition body.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix("\r\n")
        .or_else(|| after_open.strip_prefix('\n'))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let frontmatter = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, body))
}

#[derive(Debug, PartialEq)]
pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(TEST_SUFFIX))
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, body) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };

    tracing::debug!(path = %path.display(), "running test");
    TestResult {
        path: path.to_path_buf(),
        description: config.description.clone(),
        outcome: evaluate(&config, body),
    }
}

/// Check a definition body against the expectations in `config`.
fn evaluate(config: &TestConfig, body: &str) -> TestOutcome {
    let definition = match Definition::parse(body, 0) {
        Ok(d) => d,
        Err(errors) => {
            let messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
            return expect_failure(config, &messages);
        }
    };

    let name = match config.entry.as_deref().or_else(|| definition.entry_name()) {
        Some(name) => name,
        None => return TestOutcome::Fail("definition has no entry template".into()),
    };
    let Some(template) = definition.get(name) else {
        return TestOutcome::Fail(format!("template '{}' is not defined", name));
    };

    if let Some(expected) = &config.expect_unassigned {
        let actual = template.unassigned_vars();
        if actual != *expected {
            return TestOutcome::Fail(format!(
                "unassigned mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    let compiled = match template.compile_source() {
        Ok(text) => text,
        Err(e) => return expect_failure(config, &[e.to_string()]),
    };

    if let Some(expected_err) = &config.expect_error {
        return TestOutcome::Fail(format!(
            "expected error containing \"{}\", but compiled to: {}",
            expected_err, compiled
        ));
    }

    if let Some(expected) = &config.expect_output {
        if *expected != compiled {
            return TestOutcome::Fail(format!(
                "output mismatch\n  expected: {}\n  actual:   {}",
                expected, compiled
            ));
        }
    }

    if config.matches.is_empty() && config.rejects.is_empty() {
        return TestOutcome::Pass;
    }

    let regex = match Pattern::new(compiled).to_regex() {
        Ok(r) => r,
        Err(e) => return TestOutcome::Fail(e.to_string()),
    };
    if let Some(input) = config.matches.iter().find(|input| !regex.is_match(input)) {
        return TestOutcome::Fail(format!("expected a match for \"{}\"", input));
    }
    if let Some(input) = config.rejects.iter().find(|input| regex.is_match(input)) {
        return TestOutcome::Fail(format!("expected no match for \"{}\"", input));
    }

    TestOutcome::Pass
}

fn expect_failure(config: &TestConfig, messages: &[String]) -> TestOutcome {
    match &config.expect_error {
        Some(expected) if messages.iter().any(|m| m.contains(expected.as_str())) => TestOutcome::Pass,
        Some(expected) => TestOutcome::Fail(format!(
            "expected error containing \"{}\", got: {}",
            expected,
            messages.join("; ")
        )),
        None => TestOutcome::Fail(format!("unexpected error: {}", messages.join("; "))),
    }
}

/// Discover `.retest` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(TEST_SUFFIX))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, s: &str, code: &str) -> String {
        if self.no_color {
            s.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, s)
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, s: &str) -> String {
        self.paint(s, "1")
    }
}

/// Select the categories to run. Unknown requests are reported and skipped.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run all `.retest` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };

    let all_categories = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover_categorized(path)
    };

    if all_categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return 1;
    }

    let selected = if path.is_file() {
        select_categories(&all_categories, &[])
    } else {
        select_categories(&all_categories, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
        }

        for file in files.iter() {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("ok", "32"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("FAILED", "31"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"
[[template]]
name = "t"
fragments = ['/^/', '/\VAR{x}/', '/$/']
vars = { x = '/a+b/' }
"#;

    fn write_test(dir: &Path, name: &str, frontmatter: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("---\n{}\n---\n{}", frontmatter, body)).unwrap();
        path
    }

    #[test]
    fn splits_frontmatter_and_body() {
        let (config, body) =
            parse_test_file("---\ndescription = \"d\"\nmatches = [\"ab\"]\n---\nbody\n").unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(config.matches, vec!["ab"]);
        assert_eq!(body, "body\n");
    }

    #[test]
    fn rejects_missing_delimiters() {
        assert!(parse_test_file("no frontmatter").is_err());
        assert!(parse_test_file("---\nentry = \"t\"\n").is_err());
    }

    #[test]
    fn passing_output_and_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test(
            dir.path(),
            "ok.retest",
            "expect_output = \"^a+b$\"\nmatches = [\"aab\"]\nrejects = [\"ba\"]",
            DEFINITION,
        );
        assert_eq!(run_single_test(&path).outcome, TestOutcome::Pass);
    }

    #[test]
    fn reports_output_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test(dir.path(), "bad.retest", "expect_output = \"nope\"", DEFINITION);
        let result = run_single_test(&path);
        assert!(matches!(result.outcome, TestOutcome::Fail(ref r) if r.contains("output mismatch")));
        assert_eq!(result.label(), "bad");
    }

    #[test]
    fn expected_compile_error() {
        let config = TestConfig {
            expect_error: Some("unbound placeholder".into()),
            expect_unassigned: Some(vec!["y".into()]),
            ..TestConfig::default()
        };
        let body = "[[template]]\nname = \"t\"\nfragments = ['/\\VAR{y}/']\n";
        assert_eq!(evaluate(&config, body), TestOutcome::Pass);
    }

    #[test]
    fn expected_definition_error() {
        let config = TestConfig {
            expect_error: Some("unsupported fragment kind".into()),
            ..TestConfig::default()
        };
        let body = "[[template]]\nname = \"t\"\nfragments = [1]\n";
        assert_eq!(evaluate(&config, body), TestOutcome::Pass);
    }

    #[test]
    fn unexpected_success_fails() {
        let config = TestConfig {
            expect_error: Some("anything".into()),
            ..TestConfig::default()
        };
        assert!(matches!(evaluate(&config, DEFINITION), TestOutcome::Fail(_)));
    }

    #[test]
    fn runs_directory_by_category() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("good")).unwrap();
        std::fs::create_dir(dir.path().join("bad")).unwrap();
        write_test(&dir.path().join("good"), "a.retest", "matches = [\"ab\"]", DEFINITION);
        write_test(&dir.path().join("bad"), "b.retest", "matches = [\"zz\"]", DEFINITION);

        assert_eq!(run_tests(dir.path(), true, &["good".into()]), 0);
        assert_eq!(run_tests(dir.path(), true, &[]), 1);
        assert_eq!(run_tests(dir.path(), true, &["missing".into()]), 1);
    }

    #[test]
    fn bundled_fixtures_pass() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        assert_eq!(run_tests(&fixtures, true, &[]), 0);
    }
}
