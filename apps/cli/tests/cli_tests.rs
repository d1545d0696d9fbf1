//! End-to-end tests for the `lector` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CORPUS: &str = r#"{
    "instances": [
        {
            "support": ["Ada Lovelace wrote the first program in 1843."],
            "questions": [
                {
                    "question": "Who wrote the first program?",
                    "answers": [{"text": "Ada Lovelace", "span": [0, 12]}]
                }
            ]
        },
        {
            "support": ["The engine was designed by Charles Babbage."],
            "questions": [
                {
                    "question": "Who designed the engine?",
                    "answers": [{"text": "Charles Babbage", "span": [27, 42]}]
                }
            ]
        }
    ]
}"#;

fn lector() -> Command {
    Command::cargo_bin("lector").expect("binary builds")
}

fn write_workspace(temp: &TempDir) -> std::path::PathBuf {
    let corpus_path = temp.path().join("train.json");
    fs::write(&corpus_path, CORPUS).unwrap();

    let config_path = temp.path().join("reader.toml");
    fs::write(
        &config_path,
        "reader = \"lexical_span\"\n\
         train = \"train.json\"\n\
         dev = \"train.json\"\n\
         epochs = 2\n\
         batch_size = 2\n\
         seed = 7\n",
    )
    .unwrap();
    config_path
}

fn final_reader_dir(workspace: &Path) -> std::path::PathBuf {
    let training_root = workspace.join(".lector").join("training");
    let job_dir = fs::read_dir(&training_root)
        .expect("training root exists")
        .filter_map(Result::ok)
        .find(|e| e.path().is_dir())
        .expect("one job directory");
    job_dir.path().join("checkpoints").join("final")
}

#[test]
fn test_readers_lists_builtins() {
    lector()
        .arg("readers")
        .assert()
        .success()
        .stdout(predicate::str::contains("lexical_span"))
        .stdout(predicate::str::contains("lexical_mc"));
}

#[test]
fn test_train_answer_eval_round_trip() {
    let temp = TempDir::new().unwrap();
    let config_path = write_workspace(&temp);

    lector()
        .current_dir(temp.path())
        .args(["train", "--config"])
        .arg(&config_path)
        .args(["--workspace", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trained"));

    let reader_dir = final_reader_dir(temp.path());
    assert!(reader_dir.join("shared_resources.json").exists());
    assert!(reader_dir.join("model.json").exists());

    lector()
        .current_dir(temp.path())
        .args(["answer", "--reader"])
        .arg(&reader_dir)
        .args(["--input", "train.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("answers"));

    lector()
        .current_dir(temp.path())
        .args(["eval", "--reader"])
        .arg(&reader_dir)
        .args(["--data", "train.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exact match"));
}

#[test]
fn test_train_missing_config_fails() {
    let temp = TempDir::new().unwrap();
    lector()
        .current_dir(temp.path())
        .args(["train", "--config", "absent.toml"])
        .assert()
        .failure();
}
