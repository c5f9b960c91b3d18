use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
use moneyspend::{
    SpendEntry,
    number_formatter::{CurrencyPosition, FormatOptions},
    permission::{Permission, PermissionGate},
    report::ReportOptions,
    store::{MemoryStore, SpendStore},
    tui::{Services, run_tui_with_events_test},
};
use std::sync::Arc;
use temp_dir::TempDir;
use tokio::runtime::Runtime;

struct TuiTestFixture {
    tempdir: TempDir,
    runtime: Runtime,
    store: MemoryStore,
}

impl TuiTestFixture {
    fn new() -> Self {
        TuiTestFixture {
            tempdir: TempDir::with_prefix("moneyspend-tui-test-").unwrap(),
            runtime: Runtime::new().unwrap(),
            store: MemoryStore::default(),
        }
    }

    fn with_entries(self, entries: &[(&str, &str, &str, &str)]) -> Self {
        for (key, date, amount, cause) in entries {
            let entry = SpendEntry {
                date: date.to_string(),
                amount: amount.to_string(),
                cause: cause.to_string(),
            };
            self.runtime
                .block_on(self.store.put(key, &entry))
                .unwrap();
        }
        self
    }

    fn report_dir(&self) -> std::path::PathBuf {
        self.tempdir.child("MyAppPDFs")
    }

    fn services(&self, gate: Arc<dyn PermissionGate>) -> Services<MemoryStore> {
        Services {
            store: self.store.clone(),
            gate,
            report: ReportOptions {
                output_dir: self.report_dir(),
                open_viewer: false,
                viewer: None,
            },
        }
    }

    /// Helper to create key event
    fn key_event(code: KeyCode) -> Event {
        Self::key_event_with(code, KeyModifiers::empty())
    }

    fn key_event_with(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        })
    }

    fn type_text(text: &str) -> impl Iterator<Item = Event> + '_ {
        text.chars().map(|c| Self::key_event(KeyCode::Char(c)))
    }

    /// Run TUI with events and return final buffer content
    fn run_with_events(&self, events: Vec<Event>) -> String {
        self.run_with(Arc::new(Permission::Granted), FormatOptions::default(), events)
    }

    fn run_with(
        &self,
        gate: Arc<dyn PermissionGate>,
        format_options: FormatOptions,
        events: Vec<Event>,
    ) -> String {
        run_tui_with_events_test(
            self.services(gate),
            self.runtime.handle(),
            format_options,
            events,
            120,
            30,
        )
        .expect("TUI test should succeed")
    }

    fn records(&self) -> std::collections::BTreeMap<String, SpendEntry> {
        self.runtime.block_on(self.store.snapshot())
    }
}

#[test]
fn test_initial_screen() {
    let fixture = TuiTestFixture::new();
    let screen = fixture.run_with_events(vec![]);

    assert!(screen.contains(" Spend Entry "));
    assert!(screen.contains("Date  "));
    assert!(screen.contains("Amount"));
    assert!(screen.contains("Cause "));
    assert!(screen.contains("No report generated yet"));
    assert!(screen.contains("Ctrl+R: Fetch & PDF"));

    let today = chrono::Local::now().date_naive().format("%d/%m/%Y").to_string();
    assert!(screen.contains(&today));
}

#[test]
fn test_save_entry() {
    let fixture = TuiTestFixture::new();

    let mut events: Vec<Event> = TuiTestFixture::type_text("50").collect();
    events.push(TuiTestFixture::key_event(KeyCode::Tab));
    events.extend(TuiTestFixture::type_text("Lunch"));
    // Cause -> Amount -> Date
    events.push(TuiTestFixture::key_event(KeyCode::BackTab));
    events.push(TuiTestFixture::key_event(KeyCode::BackTab));
    events.extend(std::iter::repeat_n(
        TuiTestFixture::key_event(KeyCode::Backspace),
        10,
    ));
    events.extend(TuiTestFixture::type_text("01/01/2024"));
    events.push(TuiTestFixture::key_event(KeyCode::Enter));

    let screen = fixture.run_with_events(events);

    assert!(screen.contains("Data saved successfully"));
    assert!(!screen.contains("Lunch"));
    assert_eq!(
        fixture.records().get("01012024"),
        Some(&SpendEntry {
            date: "01/01/2024".to_string(),
            amount: "50".to_string(),
            cause: "Lunch".to_string(),
        })
    );
}

#[test]
fn test_missing_field_keeps_form() {
    let fixture = TuiTestFixture::new();

    let mut events: Vec<Event> = TuiTestFixture::type_text("50").collect();
    events.push(TuiTestFixture::key_event(KeyCode::Enter));

    let screen = fixture.run_with_events(events);

    assert!(screen.contains("Error: Please fill in all fields"));
    assert!(screen.contains("Amount  50"));
    assert_eq!(fixture.store.write_count(), 0);
}

#[test]
fn test_invalid_date_never_writes() {
    let fixture = TuiTestFixture::new();

    let mut events: Vec<Event> = TuiTestFixture::type_text("5").collect();
    events.push(TuiTestFixture::key_event(KeyCode::Tab));
    events.extend(TuiTestFixture::type_text("Tea"));
    events.push(TuiTestFixture::key_event(KeyCode::Tab));
    events.extend(std::iter::repeat_n(
        TuiTestFixture::key_event(KeyCode::Backspace),
        10,
    ));
    events.extend(TuiTestFixture::type_text("31/02/2024"));
    events.push(TuiTestFixture::key_event(KeyCode::Enter));

    let screen = fixture.run_with_events(events);

    assert!(screen.contains("Error: Please ensure all fields are correctly filled."));
    assert_eq!(fixture.store.write_count(), 0);
}

#[test]
fn test_report_with_ctrl_r() {
    let fixture = TuiTestFixture::new().with_entries(&[
        ("02012024", "02/01/2024", "1200", "Rent"),
        ("03012024", "03/01/2024", "30", "Book"),
    ]);
    let format_options = FormatOptions {
        thousands_separator: ',',
        currency: CurrencyPosition::Suffix(" $".to_string()),
    };

    let events = vec![TuiTestFixture::key_event_with(
        KeyCode::Char('r'),
        KeyModifiers::CONTROL,
    )];
    let screen = fixture.run_with(Arc::new(Permission::Granted), format_options, events);

    assert!(screen.contains("PDF saved to"));
    assert!(screen.contains("Entries  2"));
    assert!(screen.contains("Total    1,230 $"));

    let reports: Vec<_> = std::fs::read_dir(fixture.report_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(reports.len(), 1);
    assert!(std::fs::read(&reports[0]).unwrap().starts_with(b"%PDF"));
}

#[test]
fn test_report_with_empty_store() {
    let fixture = TuiTestFixture::new();

    let events = vec![TuiTestFixture::key_event(KeyCode::F(5))];
    let screen = fixture.run_with_events(events);

    assert!(screen.contains("PDF saved to"));
    assert!(screen.contains("Entries  0"));
}

#[test]
fn test_report_permission_denied() {
    let fixture = TuiTestFixture::new().with_entries(&[("02012024", "02/01/2024", "20", "Bus")]);

    let events = vec![TuiTestFixture::key_event_with(
        KeyCode::Char('r'),
        KeyModifiers::CONTROL,
    )];
    let screen = fixture.run_with(
        Arc::new(Permission::Denied),
        FormatOptions::default(),
        events,
    );

    assert!(screen.contains("Error: Storage permission is required to create PDF"));
    assert!(screen.contains("No report generated yet"));
    assert!(!fixture.report_dir().exists());
}

#[test]
fn test_escape_quits_before_later_keys() {
    let fixture = TuiTestFixture::new();

    let mut events: Vec<Event> = TuiTestFixture::type_text("5").collect();
    events.push(TuiTestFixture::key_event(KeyCode::Tab));
    events.extend(TuiTestFixture::type_text("Tea"));
    events.push(TuiTestFixture::key_event(KeyCode::Esc));
    events.push(TuiTestFixture::key_event(KeyCode::Enter));

    fixture.run_with_events(events);

    assert_eq!(fixture.store.write_count(), 0);
}
