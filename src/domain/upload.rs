// src/domain/upload.rs
use unicode_normalization::UnicodeNormalization;

use super::errors::{DomainError, DomainResult};

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub const NO_FILE_MESSAGE: &str = "No file selected";
pub const INVALID_TYPE_MESSAGE: &str = "Invalid file type. Please upload a JPG, JPEG, or PNG image.";

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Reduce un nombre de archivo del cliente a algo seguro para el disco.
///
/// Descompone a NFKD y descarta lo que no sea ASCII (`ñ` pasa a `n`), cambia
/// `/` y los blancos por `_`, se queda con `[A-Za-z0-9_.-]` y recorta `.`/`_`
/// en ambos extremos. Es el mismo resultado que el `secure_filename` de Werkzeug.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename.nfkd().filter(char::is_ascii).collect();
    let joined = ascii
        .replace('/', " ")
        .split(is_py_whitespace)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    cleaned.trim_matches(['.', '_']).to_string()
}

// `str.split()` de Python también corta en los separadores de información 0x1c-0x1f.
fn is_py_whitespace(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

/// Valida y normaliza el nombre de una subida.
pub fn accept_upload_name(filename: &str) -> DomainResult<String> {
    if filename.trim().is_empty() {
        return Err(DomainError::InvalidInput(NO_FILE_MESSAGE.into()));
    }
    if !allowed_file(filename) {
        return Err(DomainError::InvalidInput(INVALID_TYPE_MESSAGE.into()));
    }
    let safe = secure_filename(filename);
    if !allowed_file(&safe) || safe.rsplit_once('.').is_some_and(|(stem, _)| stem.is_empty()) {
        return Err(DomainError::InvalidInput(INVALID_TYPE_MESSAGE.into()));
    }
    Ok(safe)
}

/// Nombre de la superposición de máscara asociada a una subida: `<stem>_mask.png`.
pub fn mask_name_for(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    format!("{stem}_mask.png")
}
