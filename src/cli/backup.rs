use std::path::PathBuf;

use rusqlite::backup::Backup;

use crate::error::{LedgerError, Result};
use crate::fmt::format_bytes;
use crate::settings::load_settings;
use crate::store::CodingStore;

pub fn run(output: Option<String>) -> Result<()> {
    let settings = load_settings();
    let store_path = settings.store_path();
    if !store_path.exists() {
        return Err(LedgerError::Other(format!(
            "No coding store at {}. Run `cardledger init` first.",
            store_path.display()
        )));
    }
    let store = CodingStore::open(&store_path)?;

    let dest_path = match output {
        Some(p) => PathBuf::from(p),
        None => {
            let backups_dir = settings.data_path().join("backups");
            std::fs::create_dir_all(&backups_dir)?;
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            backups_dir.join(format!("coding_history-{stamp}.db"))
        }
    };

    let mut dest_conn = rusqlite::Connection::open(&dest_path)?;
    let backup = Backup::new(store.connection(), &mut dest_conn)?;
    backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;
    drop(backup);
    store.close()?;

    let size = std::fs::metadata(&dest_path)?.len();
    println!("Backup saved to {}", dest_path.display());
    println!("Size: {}", format_bytes(size));
    Ok(())
}
