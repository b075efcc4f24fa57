//! Test file grammar: the first line holds the case count `T`, followed by
//! one payload line per case, matched positionally. Answer files share the
//! shape; when theirs does not add up, every case gets a placeholder answer.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use tokio::fs;

use crate::{constants::MISSING_ANSWER, core::domain::TestCase};

#[derive(Debug, thiserror::Error)]
pub enum TestDataError {
    #[error("failed to read test input {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("test input must start with the number of test cases, got {line:?}")]
    BadCount { line: String },
    #[error("test input declares no test cases")]
    NoCases,
    #[error("test input declares {declared} test cases but only {found} follow")]
    Truncated { declared: usize, found: usize },
}

pub async fn load(
    input_path: &Path,
    answer_path: Option<&Path>,
) -> Result<Vec<TestCase>, TestDataError> {
    let input = fs::read_to_string(input_path)
        .await
        .map_err(|source| TestDataError::Read {
            path: input_path.to_path_buf(),
            source,
        })?;

    let answer = match answer_path {
        Some(path) => match fs::read_to_string(path).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::warn!("Cannot read answer file {}: {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    parse(&input, answer.as_deref())
}

pub fn parse(input: &str, answer: Option<&str>) -> Result<Vec<TestCase>, TestDataError> {
    let mut lines = input.lines();
    let first = lines.next().unwrap_or_default().trim();
    let count: usize = first.parse().map_err(|_| TestDataError::BadCount {
        line: first.to_string(),
    })?;
    if count == 0 {
        return Err(TestDataError::NoCases);
    }

    let inputs = lines.take(count).map(str::trim_end).collect_vec();
    if inputs.len() < count {
        return Err(TestDataError::Truncated {
            declared: count,
            found: inputs.len(),
        });
    }

    let answers = answer
        .and_then(|answer| parse_answers(answer, count))
        .unwrap_or_else(|| vec![MISSING_ANSWER.to_string(); count]);

    Ok(inputs
        .into_iter()
        .zip(answers)
        .enumerate()
        .map(|(index, (input, answer))| TestCase {
            index,
            input: input.to_string(),
            answer,
        })
        .collect())
}

/// Per-case answers, or `None` if the file disagrees with `expected`.
fn parse_answers(answer: &str, expected: usize) -> Option<Vec<String>> {
    let mut lines = answer.lines();
    let declared = lines.next().and_then(|line| line.trim().parse::<usize>().ok());
    if declared != Some(expected) {
        tracing::warn!(
            "Answer file declares {:?} test cases, input has {}; using placeholder answers",
            declared,
            expected
        );
        return None;
    }

    let answers = lines
        .take(expected)
        .map(|line| line.trim().to_string())
        .collect_vec();
    if answers.len() < expected {
        tracing::warn!(
            "Answer file has {} of {} answers; using placeholder answers",
            answers.len(),
            expected
        );
        return None;
    }

    Some(answers)
}

/// What the competitor reads before the first query: `T`, then every input.
pub fn initial_block(cases: &[TestCase]) -> String {
    let mut block = format!("{}\n", cases.len());
    for line in cases.iter().map(|case| case.input.as_str()) {
        block.push_str(line);
        block.push('\n');
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs_inputs_with_answers() {
        let cases = parse("2\nfirst\nsecond\n", Some("2\n17\n256\n")).unwrap();

        assert_eq!(
            cases,
            vec![
                TestCase {
                    index: 0,
                    input: "first".into(),
                    answer: "17".into()
                },
                TestCase {
                    index: 1,
                    input: "second".into(),
                    answer: "256".into()
                },
            ]
        );
        assert_eq!(cases[1].number(), 2);
    }

    #[test]
    fn test_answer_count_mismatch_uses_placeholder() {
        let cases = parse("3\na\nb\nc\n", Some("2\n1\n2\n")).unwrap();

        assert_eq!(cases.len(), 3);
        assert!(cases.iter().all(|case| case.answer == MISSING_ANSWER));
    }

    #[test]
    fn test_short_answer_file_uses_placeholder() {
        let cases = parse("2\na\nb\n", Some("2\n1\n")).unwrap();
        assert!(cases.iter().all(|case| case.answer == MISSING_ANSWER));
    }

    #[test]
    fn test_missing_answer_file_uses_placeholder() {
        let cases = parse("1\n\n", None).unwrap();
        assert_eq!(cases[0].input, "");
        assert_eq!(cases[0].answer, MISSING_ANSWER);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            parse("many\nx\n", None),
            Err(TestDataError::BadCount { line }) if line == "many"
        ));
        assert!(matches!(parse("", None), Err(TestDataError::BadCount { .. })));
        assert!(matches!(parse("0\n", None), Err(TestDataError::NoCases)));
        assert!(matches!(
            parse("3\nonly one\n", None),
            Err(TestDataError::Truncated {
                declared: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn test_crlf_lines() {
        let cases = parse("1\r\nhello\r\n", Some("1\r\n5\r\n")).unwrap();
        assert_eq!(cases[0].input, "hello");
        assert_eq!(cases[0].answer, "5");
    }

    #[test]
    fn test_initial_block() {
        let cases = parse("2\n10 20\n30\n", None).unwrap();
        assert_eq!(initial_block(&cases), "2\n10 20\n30\n");
    }

    #[tokio::test]
    async fn test_load_missing_input_file() {
        let result = load(Path::new("/nonexistent/interjudge/input.txt"), None).await;
        assert!(matches!(result, Err(TestDataError::Read { .. })));
    }
}
