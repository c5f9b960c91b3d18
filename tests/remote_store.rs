use moneyspend::{
    AppError, EntryForm, SpendEntry, create_report,
    permission::Permission,
    report::ReportOptions,
    save_entry, server,
    store::{MemoryStore, RemoteStore, SpendStore, StoreError},
};
use reqwest::StatusCode;
use temp_dir::TempDir;
use tokio::net::TcpListener;

struct Emulator {
    store: MemoryStore,
    url: String,
}

impl Emulator {
    async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let store = MemoryStore::default();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}", listener.local_addr()?);
        tokio::spawn(server::serve(listener, store.clone()));
        Ok(Emulator { store, url })
    }

    fn client(&self) -> Result<RemoteStore, StoreError> {
        RemoteStore::new(&self.url, None)
    }
}

fn entry(date: &str, amount: &str, cause: &str) -> SpendEntry {
    SpendEntry {
        date: date.to_string(),
        amount: amount.to_string(),
        cause: cause.to_string(),
    }
}

#[tokio::test]
async fn fetch_empty_collection() -> Result<(), Box<dyn std::error::Error>> {
    let emulator = Emulator::start().await?;
    let entries = emulator.client()?.fetch_all().await?;
    assert!(entries.is_empty());
    Ok(())
}

#[tokio::test]
async fn put_then_fetch() -> Result<(), Box<dyn std::error::Error>> {
    let emulator = Emulator::start().await?;
    let client = emulator.client()?;

    client
        .put("02012024", &entry("02/01/2024", "20", "Bus"))
        .await?;
    client
        .put("03012024", &entry("03/01/2024", "30", "Book"))
        .await?;

    assert_eq!(
        client.fetch_all().await?,
        vec![
            entry("02/01/2024", "20", "Bus"),
            entry("03/01/2024", "30", "Book"),
        ]
    );
    assert_eq!(emulator.store.write_count(), 2);
    Ok(())
}

#[tokio::test]
async fn same_date_overwrites_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let emulator = Emulator::start().await?;
    let client = emulator.client()?;

    save_entry(&client, &EntryForm::new("01/01/2024", "50", "Lunch")).await?;
    save_entry(&client, &EntryForm::new("01/01/2024", "70", "Dinner")).await?;

    assert_eq!(
        client.fetch_all().await?,
        vec![entry("01/01/2024", "70", "Dinner")]
    );
    Ok(())
}

#[tokio::test]
async fn report_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let emulator = Emulator::start().await?;
    let client = emulator.client()?;
    save_entry(&client, &EntryForm::new("02/01/2024", "20", "Bus")).await?;
    save_entry(&client, &EntryForm::new("03/01/2024", "30", "Book")).await?;

    let tmp = TempDir::with_prefix("moneyspend-remote-")?;
    let options = ReportOptions {
        output_dir: tmp.child("MyAppPDFs"),
        open_viewer: false,
        viewer: None,
    };
    let generated = create_report(&client, &Permission::Granted, &options).await?;

    assert_eq!(generated.report.total(), 50);
    assert_eq!(generated.report.lines().len(), 2);
    assert!(generated.path.is_file());
    Ok(())
}

#[tokio::test]
async fn unreachable_store_fails_save() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let client = RemoteStore::new(&url, None)?;
    let err = save_entry(&client, &EntryForm::new("01/01/2024", "5", "Tea"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SaveFailed(StoreError::Transport(_))));
    Ok(())
}

#[tokio::test]
async fn unreachable_store_fails_report() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let tmp = TempDir::with_prefix("moneyspend-remote-")?;
    let options = ReportOptions {
        output_dir: tmp.child("MyAppPDFs"),
        open_viewer: false,
        viewer: None,
    };
    let client = RemoteStore::new(&url, None)?;
    let err = create_report(&client, &Permission::Granted, &options)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ReadFailed(_)));
    assert!(!tmp.child("MyAppPDFs").exists());
    Ok(())
}

#[tokio::test]
async fn unknown_path_is_status_error() -> Result<(), Box<dyn std::error::Error>> {
    let emulator = Emulator::start().await?;
    // Points one level too deep, so every request misses the emulator routes.
    let client = RemoteStore::new(&format!("{}/nested", emulator.url), None)?;

    let err = client.fetch_all().await.unwrap_err();
    assert!(matches!(err, StoreError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    Ok(())
}
