//! Turns a problem directory and a built submission into a [`JudgeRequest`].
//!
//! Layout of a problem directory:
//!
//! ```text
//! interactor.py | interactor        reference program, first match wins
//! answer/<stem>_answer<ext>         answers for test <stem><ext>
//! queries/<stem>_queries<ext>       static query budget for the test
//! ```

use std::path::{Path, PathBuf};

use crate::{
    constants::DEFAULT_STATIC_BUDGET,
    core::domain::{JudgeRequest, Language, QueryBudget},
};

#[derive(Debug, thiserror::Error)]
pub enum ProblemError {
    #[error("no runnable interactor in {0}")]
    InteractorNotFound(PathBuf),
    #[error("test file {0} does not exist")]
    MissingTestFile(PathBuf),
}

/// Everything needed to judge one built submission on one test file.
#[derive(Clone, Debug)]
pub struct Submission {
    pub executable: PathBuf,
    pub language: Language,
    pub problem_dir: PathBuf,
    pub test_path: PathBuf,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
    pub query_budget: BudgetSource,
    pub idle_limit_ms: Option<u64>,
}

/// How the request's [`QueryBudget`] is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BudgetSource {
    /// Read from the problem's `queries/` file.
    File,
    Global,
    #[default]
    PerCase,
}

impl Language {
    /// Command line that runs an already-built artifact.
    pub fn command(&self, artifact: &Path) -> Vec<String> {
        let artifact_str = artifact.display().to_string();
        match self {
            Language::GnuCpp => vec![artifact_str],
            Language::Python => vec!["python3".to_string(), artifact_str],
            Language::Java => {
                let class_dir = artifact
                    .parent()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_else(|| ".".to_string());
                let class_name = artifact
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                vec!["java".to_string(), "-cp".to_string(), class_dir, class_name]
            }
        }
    }
}

/// `interactor.py` via `python3`, else a prebuilt `interactor` binary.
/// Sources such as `interactor.cpp` have to be built beforehand.
pub fn find_interactor(problem_dir: &Path) -> Option<Vec<String>> {
    let script = problem_dir.join("interactor.py");
    if script.is_file() {
        return Some(vec!["python3".to_string(), script.display().to_string()]);
    }

    let binary = problem_dir.join("interactor");
    if binary.is_file() {
        return Some(vec![binary.display().to_string()]);
    }

    None
}

pub fn answer_path(problem_dir: &Path, test_path: &Path) -> PathBuf {
    sibling_file(problem_dir, "answer", test_path, "_answer")
}

pub fn queries_path(problem_dir: &Path, test_path: &Path) -> PathBuf {
    sibling_file(problem_dir, "queries", test_path, "_queries")
}

fn sibling_file(problem_dir: &Path, subdir: &str, test_path: &Path, suffix: &str) -> PathBuf {
    let stem = test_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = test_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    problem_dir
        .join(subdir)
        .join(format!("{}{}{}", stem, suffix, extension))
}

/// Query budget stored in a file, or the default if it cannot be read.
pub fn static_budget(path: &Path) -> u32 {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.trim().parse().unwrap_or_else(|e| {
            tracing::warn!(
                "Bad query limit in {}: {}, using {}",
                path.display(),
                e,
                DEFAULT_STATIC_BUDGET
            );
            DEFAULT_STATIC_BUDGET
        }),
        Err(e) => {
            tracing::warn!(
                "Cannot read query limit from {}: {}, using {}",
                path.display(),
                e,
                DEFAULT_STATIC_BUDGET
            );
            DEFAULT_STATIC_BUDGET
        }
    }
}

impl Submission {
    pub fn into_request(self) -> Result<JudgeRequest, ProblemError> {
        if !self.test_path.is_file() {
            return Err(ProblemError::MissingTestFile(self.test_path));
        }
        let interactor_cmd = find_interactor(&self.problem_dir)
            .ok_or_else(|| ProblemError::InteractorNotFound(self.problem_dir.clone()))?;

        let answer_path =
            Some(answer_path(&self.problem_dir, &self.test_path)).filter(|path| path.is_file());
        let query_budget = match self.query_budget {
            BudgetSource::File => {
                let path = queries_path(&self.problem_dir, &self.test_path);
                QueryBudget::Static(static_budget(&path))
            }
            BudgetSource::Global => QueryBudget::Global,
            BudgetSource::PerCase => QueryBudget::PerCase,
        };
        let test_name = self
            .test_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(JudgeRequest {
            solution_cmd: self.language.command(&self.executable),
            interactor_cmd,
            input_path: self.test_path,
            answer_path,
            time_limit_ms: self.time_limit_ms,
            memory_limit_mb: self.memory_limit_mb,
            test_name,
            query_budget,
            idle_limit_ms: self.idle_limit_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{temp_dir, write_file};

    fn submission(problem_dir: &Path, test_path: PathBuf) -> Submission {
        Submission {
            executable: PathBuf::from("/judge/build/solution"),
            language: Language::GnuCpp,
            problem_dir: problem_dir.to_path_buf(),
            test_path,
            time_limit_ms: 2000,
            memory_limit_mb: 256,
            query_budget: BudgetSource::PerCase,
            idle_limit_ms: None,
        }
    }

    #[test]
    fn test_language_commands() {
        assert_eq!(
            Language::GnuCpp.command(Path::new("/tmp/a.out")),
            vec!["/tmp/a.out"]
        );
        assert_eq!(
            Language::Python.command(Path::new("/tmp/sol.py")),
            vec!["python3", "/tmp/sol.py"]
        );
        assert_eq!(
            Language::Java.command(Path::new("/tmp/build/Main.class")),
            vec!["java", "-cp", "/tmp/build", "Main"]
        );
    }

    #[test]
    fn test_interactor_precedence() {
        let dir = temp_dir();
        assert_eq!(find_interactor(&dir), None);

        write_file(&dir, "interactor.cpp", "int main() {}");
        assert_eq!(find_interactor(&dir), None);

        let binary = write_file(&dir, "interactor", "");
        assert_eq!(find_interactor(&dir), Some(vec![binary.display().to_string()]));

        let script = write_file(&dir, "interactor.py", "print(1)");
        assert_eq!(
            find_interactor(&dir),
            Some(vec!["python3".to_string(), script.display().to_string()])
        );
    }

    #[test]
    fn test_sibling_paths() {
        let problem = Path::new("/problems/guess");
        let test = Path::new("/problems/guess/tests/03.txt");
        assert_eq!(
            answer_path(problem, test),
            PathBuf::from("/problems/guess/answer/03_answer.txt")
        );
        assert_eq!(
            queries_path(problem, test),
            PathBuf::from("/problems/guess/queries/03_queries.txt")
        );
    }

    #[test]
    fn test_static_budget() {
        let dir = temp_dir();
        let good = write_file(&dir, "q1.txt", " 25\n");
        let bad = write_file(&dir, "q2.txt", "twenty");

        assert_eq!(static_budget(&good), 25);
        assert_eq!(static_budget(&bad), DEFAULT_STATIC_BUDGET);
        assert_eq!(static_budget(&dir.join("missing.txt")), DEFAULT_STATIC_BUDGET);
    }

    #[test]
    fn test_into_request() {
        let dir = temp_dir();
        write_file(&dir, "interactor.py", "");
        let test = write_file(&dir, "tests/01.txt", "1\n\n");
        let answer = write_file(&dir, "answer/01_answer.txt", "1\n42\n");
        write_file(&dir, "queries/01_queries.txt", "12");

        let mut sub = submission(&dir, test.clone());
        sub.query_budget = BudgetSource::File;
        let request = sub.into_request().unwrap();

        assert_eq!(request.solution_cmd, vec!["/judge/build/solution"]);
        assert_eq!(request.interactor_cmd[0], "python3");
        assert_eq!(request.input_path, test);
        assert_eq!(request.answer_path, Some(answer));
        assert_eq!(request.query_budget, QueryBudget::Static(12));
        assert_eq!(request.test_name, "01.txt");
    }

    #[test]
    fn test_into_request_failures() {
        let dir = temp_dir();
        let test = write_file(&dir, "01.txt", "1\n\n");

        let result = submission(&dir, test).into_request();
        assert!(matches!(result, Err(ProblemError::InteractorNotFound(_))));

        let result = submission(&dir, dir.join("02.txt")).into_request();
        assert!(matches!(result, Err(ProblemError::MissingTestFile(_))));
    }

    #[test]
    fn test_missing_answer_file_is_none() {
        let dir = temp_dir();
        write_file(&dir, "interactor", "");
        let test = write_file(&dir, "01.txt", "1\n\n");

        let request = submission(&dir, test).into_request().unwrap();
        assert_eq!(request.answer_path, None);
        assert_eq!(request.query_budget, QueryBudget::PerCase);
    }
}
