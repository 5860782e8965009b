use card_scanner::adapters::storage::LocalStorage;
use card_scanner::adapters::xlsx_sink::XlsxFileSink;
use card_scanner::core::card_service::{ContactService, ExportSettings};
use card_scanner::core::workbook::{read_rows, read_workbook};
use card_scanner::domain::model::{header_row, CardImages, Cell, ContactRecord, SINK_HEADER};
use card_scanner::domain::ports::{CardExtractor, ContactSink};
use card_scanner::{CardError, Result, SerializedSink};
use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;

struct UnusedExtractor;

#[async_trait]
impl CardExtractor for UnusedExtractor {
    async fn extract(&self, _images: &CardImages) -> Result<ContactRecord> {
        Err(CardError::extraction("not used in this test"))
    }
}

fn contact(organization: &str, name: &str) -> ContactRecord {
    ContactRecord {
        organization: organization.to_string(),
        name: name.to_string(),
        ..ContactRecord::default()
    }
}

fn local_sink(dir: &TempDir) -> XlsxFileSink<LocalStorage> {
    XlsxFileSink::new(
        LocalStorage::new(dir.path()),
        "card contacts.xlsx",
        "Business Cards",
    )
}

fn data_row(sequence_number: i64, organization: &str, name: &str) -> Vec<Cell> {
    let mut row = vec![Cell::Number(sequence_number), Cell::text(organization), Cell::text(name)];
    row.extend(std::iter::repeat(Cell::text("")).take(6));
    row
}

#[tokio::test]
async fn test_first_save_creates_file_with_header() {
    let temp_dir = TempDir::new().unwrap();
    let sink = local_sink(&temp_dir);

    let sequence_number = sink.append(&contact("Acme", "Jo")).await.unwrap();
    assert_eq!(sequence_number, 1);

    let path = temp_dir.path().join("card contacts.xlsx");
    assert!(path.exists());

    let rows = read_rows(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], header_row());
    assert_eq!(rows[1], data_row(1, "Acme", "Jo"));
}

#[tokio::test]
async fn test_sequence_continues_across_sink_instances() {
    let temp_dir = TempDir::new().unwrap();

    local_sink(&temp_dir).append(&contact("Acme", "Jo")).await.unwrap();
    local_sink(&temp_dir).append(&contact("Globex", "Hank")).await.unwrap();

    // 重新開啟檔案後序號應延續
    let sequence_number = local_sink(&temp_dir)
        .append(&contact("Initech", "Peter"))
        .await
        .unwrap();
    assert_eq!(sequence_number, 3);

    let rows = local_sink(&temp_dir).read_all().await.unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3], data_row(3, "Initech", "Peter"));
}

#[tokio::test]
async fn test_concurrent_saves_get_distinct_numbers() {
    let temp_dir = TempDir::new().unwrap();
    let sink = Arc::new(SerializedSink::new(local_sink(&temp_dir)));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { sink.append(&contact("Acme", &format!("Person {}", i))).await })
        })
        .collect();

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap());
    }
    numbers.sort_unstable();

    assert_eq!(numbers, (1..=8).collect::<Vec<u64>>());

    let rows = sink.read_all().await.unwrap();
    assert_eq!(rows.len(), 9);
}

#[tokio::test]
async fn test_export_returns_header_and_every_row() {
    let temp_dir = TempDir::new().unwrap();
    let sink: Arc<dyn ContactSink> = Arc::new(SerializedSink::new(local_sink(&temp_dir)));
    let service = ContactService::new(Arc::new(UnusedExtractor), Some(sink))
        .with_export(ExportSettings::default());

    assert_eq!(service.save_contact(&contact("Acme", "Jo")).await.unwrap(), 1);
    assert_eq!(service.save_contact(&contact("Globex", "Hank")).await.unwrap(), 2);

    let file = service.export_all().await.unwrap();
    assert_eq!(file.filename, "Business_Card_Contacts.xlsx");

    let rows = read_rows(&file.bytes).unwrap();
    assert_eq!(
        rows,
        vec![header_row(), data_row(1, "Acme", "Jo"), data_row(2, "Globex", "Hank")]
    );
}

#[tokio::test]
async fn test_export_before_any_save_is_empty_workbook() {
    let temp_dir = TempDir::new().unwrap();
    let sink: Arc<dyn ContactSink> = Arc::new(local_sink(&temp_dir));
    let service = ContactService::new(Arc::new(UnusedExtractor), Some(sink));

    let file = service.export_all().await.unwrap();

    assert!(!file.bytes.is_empty());
    assert!(read_rows(&file.bytes).unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_file_is_persistence_failure() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("card contacts.xlsx"), b"not a workbook").unwrap();

    let err = local_sink(&temp_dir)
        .append(&contact("Acme", "Jo"))
        .await
        .unwrap_err();

    assert!(matches!(err, CardError::PersistenceFailed { .. }));
}

#[tokio::test]
async fn test_append_keeps_other_sheets_and_cell_types() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("card contacts.xlsx");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let cards = workbook.add_worksheet();
    cards.set_name("Business Cards").unwrap();
    for (col, title) in SINK_HEADER.iter().enumerate() {
        cards.write_string(0, col as u16, *title).unwrap();
    }
    cards.write_number(1, 0, 1).unwrap();
    cards.write_string(1, 2, "Jo").unwrap();
    cards.write_number(1, 8, 12.5).unwrap();

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "Follow up at the expo").unwrap();
    notes.write_number(1, 0, 2.25).unwrap();
    notes.write_formula(2, 0, "=A2*2").unwrap();
    notes.write_boolean(3, 0, true).unwrap();
    workbook.save(&path).unwrap();

    let sequence_number = local_sink(&temp_dir)
        .append(&contact("Globex", "Hank"))
        .await
        .unwrap();
    assert_eq!(sequence_number, 2);

    let sheets = read_workbook(&std::fs::read(&path).unwrap()).unwrap();
    let names: Vec<&str> = sheets.iter().map(|sheet| sheet.name.as_str()).collect();
    assert_eq!(names, vec!["Business Cards", "Notes"]);

    let cards = &sheets[0].rows;
    assert_eq!(cards.len(), 3);
    assert_eq!(cards[1][8], Cell::Float(12.5));
    assert_eq!(cards[2], data_row(2, "Globex", "Hank"));

    let notes = &sheets[1].rows;
    assert_eq!(notes[0][0], Cell::text("Follow up at the expo"));
    assert_eq!(notes[1][0], Cell::Float(2.25));
    match &notes[2][0] {
        Cell::Formula { expression, .. } => {
            assert_eq!(expression.trim_start_matches('='), "A2*2")
        }
        other => panic!("expected a formula, got {:?}", other),
    }
    assert_eq!(notes[3][0], Cell::Bool(true));
}
