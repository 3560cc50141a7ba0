use std::io::Read;
use std::path::Path;

use assert_cmd::Command;
use calamine::{open_workbook_auto, Reader};
use predicates::prelude::*;
use rust_xlsxwriter::{Format, Workbook};
use tempfile::{tempdir, TempDir};

fn sheetscrub() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

/// Name/Email/Phone sheet where rows 3 and 5 have a blank Email
fn contacts_xlsx(path: &Path) {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold().set_background_color("#DDEBF7");
    let highlight = Format::new().set_font_color("#C00000");

    let sheet = workbook.add_worksheet();
    sheet.set_name("Contacts").unwrap();
    for (col, name) in ["Name", "Email", "Phone"].iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *name, &header)
            .unwrap();
    }
    let rows = [
        ("A", "a@x.com", "111"),
        ("B", "", "222"),
        ("C", "c@x.com", ""),
        ("D", " ", "444"),
        ("E", "e@x.com", "555"),
    ];
    for (i, (name, email, phone)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string_with_format(row, 0, *name, &highlight).unwrap();
        if !email.is_empty() {
            sheet.write_string(row, 1, *email).unwrap();
        }
        if !phone.is_empty() {
            sheet.write_string(row, 2, *phone).unwrap();
        }
    }
    sheet.set_column_width(1, 30).unwrap();

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "keep").unwrap();

    workbook.save(path).unwrap();
}

fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<String>> {
    let mut workbook = open_workbook_auto(path).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    range
        .rows()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn first_column(path: &Path, sheet: &str) -> Vec<String> {
    read_sheet(path, sheet)
        .into_iter()
        .map(|row| row[0].clone())
        .collect()
}

fn zip_part(path: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let input = dir.path().join("contacts.xlsx");
    contacts_xlsx(&input);
    (dir, input)
}

#[test]
fn test_removes_rows_with_blank_email() {
    let (dir, input) = setup();
    let output = dir.path().join("out/clean.xlsx");

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Rows with missing values have been removed from the columns: \"Email\".",
        ))
        .stdout(predicate::str::contains(format!(
            "Cleaned file saved as: {}.",
            output.display()
        )));

    assert_eq!(first_column(&output, "Contacts"), vec!["Name", "A", "C", "E"]);
    assert_eq!(read_sheet(&output, "Contacts")[0], vec!["Name", "Email", "Phone"]);
}

#[test]
fn test_multiple_columns() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.xlsx");

    sheetscrub()
        .arg(&input)
        .args(["--column", "Email", "--column", "Phone", "--sheet", "Contacts", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("columns: \"Email\", \"Phone\"."));

    assert_eq!(first_column(&output, "Contacts"), vec!["Name", "A", "E"]);
}

#[test]
fn test_missing_column_writes_nothing() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.xlsx");

    sheetscrub()
        .arg(&input)
        .args(["-c", "Phone", "-c", "Fax", "-c", "Mobile", "-o"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Target columns not found: Fax, Mobile!"));

    assert!(!output.exists());
}

#[test]
fn test_missing_input_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("nope.xlsx");

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "-o"])
        .arg(dir.path().join("clean.xlsx"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(format!(
            "Input file not found: {}!",
            input.display()
        )));
}

#[test]
fn test_missing_sheet() {
    let (dir, input) = setup();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "-s", "Data", "-o"])
        .arg(dir.path().join("clean.xlsx"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Sheet not found: Data!"));
}

#[test]
fn test_rename_policy_picks_next_free_name() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.xlsx");
    std::fs::write(&output, b"existing").unwrap();
    std::fs::write(dir.path().join("clean_1.xlsx"), b"existing").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "--on-conflict", "rename", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("clean_2.xlsx"));

    assert_eq!(std::fs::read(&output).unwrap(), b"existing");
    assert_eq!(
        first_column(&dir.path().join("clean_2.xlsx"), "Contacts"),
        vec!["Name", "A", "C", "E"]
    );
}

#[test]
fn test_fail_policy() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.xlsx");
    std::fs::write(&output, b"existing").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "--on-conflict", "fail", "-o"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Output file already exists"));

    assert_eq!(std::fs::read(&output).unwrap(), b"existing");
}

#[test]
fn test_prompt_reasks_then_creates_new_file() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.xlsx");
    std::fs::write(&output, b"existing").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "-o"])
        .arg(&output)
        .write_stdin("maybe\n NEW \n")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Output file already exists: {}.",
            output.display()
        )))
        .stdout(predicate::str::contains(
            "Invalid response. Please enter 'overwrite', 'new', or 'cancel'.",
        ))
        .stdout(predicate::str::contains("clean_1.xlsx"));

    assert!(dir.path().join("clean_1.xlsx").is_file());
}

#[test]
fn test_prompt_cancel_exits_cleanly() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.xlsx");
    std::fs::write(&output, b"existing").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "-o"])
        .arg(&output)
        .write_stdin("cancel\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Process canceled!"))
        .stdout(predicate::str::contains("Cleaned file saved as").not());

    assert_eq!(std::fs::read(&output).unwrap(), b"existing");
    assert!(!dir.path().join("clean_1.xlsx").exists());
}

#[test]
fn test_prompt_overwrite() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.xlsx");
    std::fs::write(&output, b"existing").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "-o"])
        .arg(&output)
        .write_stdin("overwrite\n")
        .assert()
        .success();

    assert_eq!(first_column(&output, "Contacts"), vec!["Name", "A", "C", "E"]);
}

#[test]
fn test_preserve_formatting_keeps_styles() {
    let (dir, input) = setup();
    let output = dir.path().join("styled.xlsx");

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "--preserve-formatting", "-o"])
        .arg(&output)
        .assert()
        .success();

    assert_eq!(first_column(&output, "Contacts"), vec!["Name", "A", "C", "E"]);
    assert_eq!(first_column(&output, "Notes"), vec!["keep"]);

    let sheet_xml = zip_part(&output, "xl/worksheets/sheet1.xml");
    // Former row 6 (E) is now row 4 and keeps its font style
    assert!(sheet_xml.contains(r#"<c r="A4" s="#));
    assert!(!sheet_xml.contains(r#"<row r="5""#));
    assert!(sheet_xml.contains("<cols>"));
    assert_eq!(
        zip_part(&output, "xl/styles.xml"),
        zip_part(&input, "xl/styles.xml")
    );
}

#[test]
fn test_preserve_formatting_can_overwrite_input() {
    let (_dir, input) = setup();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "--preserve-formatting", "--on-conflict", "overwrite", "-o"])
        .arg(&input)
        .assert()
        .success();

    assert_eq!(first_column(&input, "Contacts"), vec!["Name", "A", "C", "E"]);
}

#[test]
fn test_preserve_formatting_rejects_csv() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.csv");
    std::fs::write(&input, "Name,Email\nA,\n").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "--preserve-formatting", "-o"])
        .arg(dir.path().join("out.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file format: csv"));
}

#[test]
fn test_csv_with_na_values() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "Name,Email\nA,a@x.com\nB,NA\nC,\nD,d@x.com\n").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "--na-value", "NA", "-o"])
        .arg(&output)
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "Name,Email\nA,a@x.com\nD,d@x.com\n"
    );
}

#[test]
fn test_column_name_with_comma() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "Name,\"City, State\"\nA,\"Austin, TX\"\nB,\n").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "City, State", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("columns: \"City, State\"."));

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "Name,\"City, State\"\nA,\"Austin, TX\"\n"
    );
}

#[test]
fn test_normalized_header_matching() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "Name, Email \nA,a@x.com\nB,\n").unwrap();

    sheetscrub()
        .arg(&input)
        .args(["-c", "email", "-o"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Target columns not found: email!"));

    sheetscrub()
        .arg(&input)
        .args(["-c", "email", "--match-normalized", "-o"])
        .arg(&output)
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "Name, Email \nA,a@x.com\n"
    );
}

#[test]
fn test_dry_run_lists_rows_and_writes_nothing() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.xlsx");

    sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "--dry-run", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run: 2 of 5 rows"))
        .stdout(predicate::str::contains("No file was written."));

    assert!(!output.exists());
}

#[test]
fn test_json_report() {
    let (dir, input) = setup();
    let output = dir.path().join("clean.csv");

    let assert = sheetscrub()
        .arg(&input)
        .args(["-c", "Email", "--format", "json", "-o"])
        .arg(&output)
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["sheet"], "Contacts");
    assert_eq!(report["mode"], "rebuild");
    assert_eq!(report["rows_scanned"], 5);
    assert_eq!(report["rows_removed"], 2);
    assert_eq!(report["removed_rows"][0]["source_line"], 3);
    assert_eq!(report["removed_rows"][1]["source_line"], 5);

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "Name,Email,Phone\nA,a@x.com,111\nC,c@x.com,\nE,e@x.com,555\n"
    );
}
