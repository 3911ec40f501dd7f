//! Whole-file helpers: envelope + container in one call.
//!
//! ```no_run
//! use twpar::file::{read_par_file, write_par_file};
//! use twpar::envelope::EnvelopeOptions;
//!
//! let mut par = read_par_file("TwoWorlds.par")?;
//! par.lists[0].entries[0].name = "Renamed".into();
//! write_par_file("TwoWorlds_edited.par", &par, &EnvelopeOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::Path;

use crate::envelope::{self, EnvelopeError, EnvelopeOptions};
use crate::model::ParFile;
use crate::record;

/// Decode on-disk bytes, wrapped or bare.
pub fn load(raw: &[u8]) -> Result<ParFile, EnvelopeError> {
    let unwrapped = envelope::unwrap(raw)?;
    let mut par = record::decode(&unwrapped.container)?;
    par.envelope_header = unwrapped.header;
    par.was_wrapped = unwrapped.wrapped;
    Ok(par)
}

/// Encode to on-disk bytes, re-wrapping only if the file was wrapped when
/// it was read.
pub fn save(par: &ParFile, opts: &EnvelopeOptions) -> Result<Vec<u8>, EnvelopeError> {
    let container = record::encode(par)?;
    if par.was_wrapped {
        envelope::wrap(&container, par.envelope_header.as_deref(), opts)
    } else {
        Ok(container)
    }
}

pub fn read_par_file<P: AsRef<Path>>(path: P) -> Result<ParFile, EnvelopeError> {
    load(&fs::read(path)?)
}

pub fn write_par_file<P: AsRef<Path>>(path: P, par: &ParFile, opts: &EnvelopeOptions) -> Result<(), EnvelopeError> {
    let bytes = save(par, opts)?;
    fs::write(path, bytes)?;
    Ok(())
}
