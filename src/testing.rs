//! Helpers for tests that drive real processes through `sh`.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Number guessing over [1, 1000]: the answer line is the secret.
pub const GUESSING_INTERACTOR: &str = r#"
set -f
read secret
read cmd
set -- $cmd
case "$1" in
    MAX_QUERIES) echo 10 ;;
    '?')
        if [ "$2" -eq "$secret" ]; then echo '='
        elif [ "$secret" -lt "$2" ]; then echo '<'
        else echo '>'
        fi ;;
    '!')
        if [ "$2" -eq "$secret" ]; then echo AC; else echo WA; fi ;;
    *) exit 1 ;;
esac
"#;

/// Binary search competitor: reads T and the T input lines, then solves
/// every case with at most 10 queries.
pub const BINARY_SEARCH: &str = r#"
read t
i=0
while [ "$i" -lt "$t" ]; do read skipped; i=$((i + 1)); done
c=0
while [ "$c" -lt "$t" ]; do
    lo=1; hi=1000
    while :; do
        mid=$(( (lo + hi) / 2 ))
        echo "? $mid"
        read r
        case "$r" in
            '=') break ;;
            '<') hi=$((mid - 1)) ;;
            *) lo=$((mid + 1)) ;;
        esac
    done
    echo "! $mid"
    c=$((c + 1))
done
"#;

pub fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("interjudge_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(&path, contents).expect("Failed to write test file");
    path
}

/// Waits up to two seconds for `pid` to die. Zombies count as dead.
#[cfg(target_os = "linux")]
pub async fn dies_soon(pid: u32) -> bool {
    for _ in 0..40 {
        let running = std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .map(|stat| {
                let state = stat.rsplit(')').next().unwrap_or_default();
                !state.trim_start().starts_with('Z')
            })
            .unwrap_or(false);
        if !running {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    false
}
