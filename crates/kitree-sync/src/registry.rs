//! Idempotent upkeep of the project's `sym-lib-table` and `fp-lib-table`.

use std::path::Path;

use kitree_sexpr::kicad::{DocumentError, LibraryEntry, LibraryTable, LibraryTableKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOutcome {
    /// The table did not exist and was created with this entry.
    Created,
    /// The entry was appended to an existing table.
    Appended,
    /// An entry with this name was already registered; nothing was written.
    AlreadyPresent,
}

/// Make sure the table at `path` registers library `name` exactly once.
pub fn ensure_library_entry(
    path: &Path,
    kind: LibraryTableKind,
    name: &str,
    uri: &str,
) -> Result<RegistryOutcome, DocumentError> {
    let existed = path.exists();
    let mut table = LibraryTable::load_or_new(path, kind)?;
    if table.contains(name) {
        log::debug!("{} already registers {name}", path.display());
        return Ok(RegistryOutcome::AlreadyPresent);
    }

    let mut entry = LibraryEntry::kicad(name, uri);
    entry.descr = "Generated by kitree".to_string();
    table.push(entry);
    table.write(path)?;
    log::info!("Registered {name} in {}", path.display());

    Ok(if existed {
        RegistryOutcome::Appended
    } else {
        RegistryOutcome::Created
    })
}
