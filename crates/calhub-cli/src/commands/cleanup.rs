use std::path::PathBuf;

pub fn run(db: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(db)?;
    let removed = store.cleanup_duplicates()?;
    println!("Removed {removed} duplicate events");
    Ok(())
}
