use std::path::Path;
use std::process::Command;
use tempfile::tempdir;
use twpar::envelope::EnvelopeOptions;
use twpar::{read_par_file, write_par_file, Field, ParEntry, ParFile, ParList};

fn bin() -> String {
    env!("CARGO_BIN_EXE_twpar").to_string()
}

fn write_world(path: &Path, hp: i32, extra: bool, wrapped: bool) {
    let mut entries = vec![ParEntry::new("Orc01", vec![Field::Int32(hp), Field::Float32(2.5)])];
    if extra {
        entries.push(ParEntry::new("Orc99", vec![Field::Int32(99), Field::Float32(0.5)]));
    }
    let mut par = ParFile::new();
    par.lists.push(ParList { tag1: 1, tag2: 2, entries });
    par.was_wrapped = wrapped;
    write_par_file(path, &par, &EnvelopeOptions::default()).unwrap();
}

#[test]
fn cli_info_lists_entries() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("world.par");
    write_world(&file, 10, true, true);

    let out = Command::new(bin()).arg("info").arg(&file).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Orc99"));
    assert!(stdout.contains("int32, float32"));
}

#[test]
fn cli_export_import_roundtrip() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("world.par");
    let json = dir.path().join("world.json");
    let back = dir.path().join("back.par");
    write_world(&file, 10, true, true);

    let st = Command::new(bin()).arg("export").arg(&file).arg(&json).status().unwrap();
    assert!(st.success());
    let st = Command::new(bin()).arg("import").arg(&json).arg(&back).status().unwrap();
    assert!(st.success());

    assert_eq!(read_par_file(&back).unwrap(), read_par_file(&file).unwrap());
}

#[test]
fn cli_diff_and_merge() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.par");
    let input = dir.path().join("input.par");
    let merged = dir.path().join("merged.par");
    write_world(&source, 10, false, false);
    write_world(&input, 12, true, false);

    let out = Command::new(bin()).arg("diff").arg(&source).arg(&input).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("2 differences: 1 changed, 1 input only, 0 source only"));

    let st = Command::new(bin())
        .arg("merge")
        .arg(&source)
        .arg(&input)
        .arg("-o")
        .arg(&merged)
        .args(["--only", "input-only"])
        .status()
        .unwrap();
    assert!(st.success());

    let par = read_par_file(&merged).unwrap();
    assert_eq!(par.lists[0].entries.len(), 2);
    assert_eq!(par.lists[0].entries[0].fields[0], Field::Int32(10));
    assert!(!par.was_wrapped);
}

#[test]
fn cli_rejects_garbage() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("bad.par");
    std::fs::write(&file, b"not a par file").unwrap();

    let st = Command::new(bin()).arg("info").arg(&file).status().unwrap();
    assert!(!st.success());
}

#[test]
fn cli_entry_editing() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("world.par");
    let step1 = dir.path().join("step1.par");
    let step2 = dir.path().join("step2.par");
    let step3 = dir.path().join("step3.par");
    write_world(&file, 10, false, true);

    let st = Command::new(bin())
        .arg("duplicate").arg(&file).args(["--list", "0", "Orc01", "-o"]).arg(&step1)
        .status().unwrap();
    assert!(st.success());
    let st = Command::new(bin())
        .arg("rename").arg(&step1).args(["--list", "0", "Orc01", "Troll", "-o"]).arg(&step2)
        .status().unwrap();
    assert!(st.success());
    let st = Command::new(bin())
        .arg("add").arg(&step2).args(["--list", "0", "Blank", "-o"]).arg(&step3)
        .status().unwrap();
    assert!(st.success());

    let par = read_par_file(&step3).unwrap();
    assert!(par.was_wrapped);
    let names: Vec<&str> = par.lists[0].entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Troll", "Orc02", "Blank"]);
    assert_eq!(par.lists[0].entries[2].fields, vec![Field::Int32(0), Field::Float32(0.0)]);

    let st = Command::new(bin())
        .arg("delete").arg(&step3).args(["--list", "0", "Missing", "-o"]).arg(&step1)
        .status().unwrap();
    assert!(!st.success());
}
